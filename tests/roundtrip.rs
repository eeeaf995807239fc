mod common;

use common::{MockLibrary, gradient};
use zenfreeimage::*;

#[test]
fn write_then_read_keeps_pixels_and_text_metadata() {
    let formats = Formats::discover(MockLibrary::png_jpg());
    let meta = Metadata::new()
        .with("COMMENTS", "Comment", "made in a test")
        .with("IPTC", "Keywords", "gradient");
    let image = Image::new(gradient(5, 4)).with_meta(meta);

    let mut request = Request::for_write("out.png");
    let writer = formats.find_writer(&request).unwrap().writer();
    writer.write_pixels(&image, &mut request, Unstoppable).unwrap();

    let request = Request::from_bytes("out.png", request.take_output().unwrap());
    let decoded = formats
        .find_reader(&request)
        .unwrap()
        .reader()
        .read_pixels(&request, Unstoppable)
        .unwrap();
    assert_eq!(decoded.width(), 5);
    assert_eq!(decoded.height(), 4);
    assert_eq!(decoded.pixels, image.pixels);
    assert_eq!(
        decoded.meta.get("COMMENTS", "Comment").and_then(MetaValue::as_text),
        Some("made in a test")
    );
    assert_eq!(decoded.meta.len(), 2);
}

#[test]
fn read_info_returns_metadata_only() {
    let formats = Formats::discover(MockLibrary::png_jpg());
    let png = formats.by_name("PNG").unwrap();
    let image = Image::new(gradient(2, 2)).with_meta(Metadata::new().with("XMP", "XMLPacket", "<x/>"));
    let bytes = png.writer().encode("a.png", &image, &Unstoppable).unwrap();

    let request = Request::from_bytes("a.png", bytes);
    let meta = png.reader().read_info(&request, Unstoppable).unwrap();
    assert_eq!(meta.get("XMP", "XMLPacket").and_then(MetaValue::as_text), Some("<x/>"));
}

#[test]
fn decoded_image_reencodes_in_another_format() {
    let formats = Formats::discover(MockLibrary::png_jpg());
    let png = formats.by_name("PNG").unwrap();
    let jpg = formats.by_name("JPG").unwrap();

    let source = Image::new(gradient(3, 3)).with_meta(Metadata::new().with("COMMENTS", "Comment", "x"));
    let bytes = png.writer().encode("in.png", &source, &Unstoppable).unwrap();
    let decoded = png
        .reader()
        .read_pixels(&Request::from_bytes("in.png", bytes), Unstoppable)
        .unwrap();

    let mut out = Request::for_write("out.jpg");
    jpg.writer()
        .write_pixels(&Image::from(decoded), &mut out, Unstoppable)
        .unwrap();
    let bytes = out.take_output().unwrap();
    assert!(bytes.starts_with(b"\xFF\xD8\xFF"));

    // content wins over the misleading name
    let request = Request::from_bytes("in.png", bytes);
    let reread = formats.find_reader(&request).unwrap();
    assert_eq!(reread.name(), "JPG");
    let image = reread.reader().read_pixels(&request, Unstoppable).unwrap();
    assert_eq!(image.pixels, source.pixels);
    assert_eq!(image.meta, source.meta.unwrap());
}

#[test]
fn every_layout_survives_the_session() {
    let formats = Formats::discover(MockLibrary::png_jpg());
    let png = formats.by_name("PNG").unwrap();
    let layouts = [
        PixelLayout::Gray8,
        PixelLayout::Gray16,
        PixelLayout::GrayF32,
        PixelLayout::Rgb8,
        PixelLayout::Rgba8,
        PixelLayout::Rgb16,
        PixelLayout::Rgba16,
        PixelLayout::RgbF32,
        PixelLayout::RgbaF32,
    ];
    for layout in layouts {
        let len = PixelBuffer::byte_len(2, 3, layout).unwrap();
        let bytes: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
        let pixels = PixelBuffer::new(bytes, 2, 3, layout).unwrap();
        let encoded = png
            .writer()
            .encode("l.png", &Image::new(pixels.clone()), &Unstoppable)
            .unwrap();
        let decoded = png
            .reader()
            .read_pixels(&Request::from_bytes("l.png", encoded), Unstoppable)
            .unwrap();
        assert_eq!(decoded.pixels, pixels, "{layout:?}");
    }
}

#[test]
fn output_goes_through_the_filesystem() {
    let formats = Formats::discover(MockLibrary::png_jpg());
    let dir = std::env::temp_dir().join(format!("zenfreeimage-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("disk.png");

    let mut request = Request::for_write(path.to_string_lossy());
    assert!(matches!(
        request.write_output_to(&path),
        Err(CodecError::NoOutput)
    ));
    formats
        .find_writer(&request)
        .unwrap()
        .writer()
        .write_pixels(&Image::new(gradient(4, 1)), &mut request, Unstoppable)
        .unwrap();
    request.write_output_to(&path).unwrap();

    let request = Request::from_path(&path).unwrap();
    let decoded = formats
        .find_reader(&request)
        .unwrap()
        .reader()
        .read_pixels(&request, Unstoppable)
        .unwrap();
    assert_eq!(decoded.pixels, gradient(4, 1));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_file_is_an_io_error() {
    let result = Request::from_path("/nonexistent/zenfreeimage/none.png");
    assert!(matches!(result, Err(CodecError::Io(_))));
}

#[cfg(feature = "imgref")]
#[test]
fn decoded_pixels_as_imgref() {
    use rgb::RGB8;

    let formats = Formats::discover(MockLibrary::png_jpg());
    let png = formats.by_name("PNG").unwrap();
    let bytes = png
        .writer()
        .encode("t.png", &Image::new(gradient(3, 2)), &Unstoppable)
        .unwrap();
    let decoded = png
        .reader()
        .read_pixels(&Request::from_bytes("t.png", bytes), Unstoppable)
        .unwrap();

    let img = decoded.pixels.as_imgref::<RGB8>().unwrap();
    assert_eq!((img.width(), img.height()), (3, 2));
    assert_eq!(img.buf()[4], RGB8::new(40, 60, 34));
    assert!(decoded.pixels.as_imgref::<rgb::RGBA8>().is_err());
}

/// Exercises the real library when it is installed; skipped otherwise.
#[cfg(feature = "freeimage")]
mod live {
    use super::*;
    use std::sync::Arc;
    use zenfreeimage::freeimage::FreeImage;

    fn formats() -> Option<Formats> {
        match FreeImage::load() {
            Ok(lib) => Some(Formats::discover(Arc::new(lib))),
            Err(e) => {
                eprintln!("skipping: {e}");
                None
            }
        }
    }

    #[test]
    fn png_rgb8_roundtrip() {
        let Some(formats) = formats() else { return };
        let png = formats.by_name("PNG").expect("FreeImage ships a PNG plugin");
        assert!(png.description().starts_with(DESCRIPTION_PREFIX));
        assert!(png.extensions().iter().any(|e| e == "png"));

        let source = gradient(7, 5);
        let mut request = Request::for_write("live.png");
        assert!(png.can_save(&request));
        png.writer()
            .write_pixels(&Image::new(source.clone()), &mut request, Unstoppable)
            .unwrap();
        let bytes = request.take_output().unwrap();
        assert!(bytes.starts_with(b"\x89PNG"));

        // name deliberately wrong: content sniffing must find PNG
        let request = Request::from_bytes("live.bin", bytes);
        let reader = formats.find_reader(&request).unwrap();
        assert_eq!(reader.name(), "PNG");
        let decoded = reader.reader().read_pixels(&request, Unstoppable).unwrap();
        assert_eq!(decoded.pixels, source);
    }

    #[test]
    fn png_gray8_roundtrip() {
        let Some(formats) = formats() else { return };
        let Some(png) = formats.by_name("PNG") else { return };

        let bytes: Vec<u8> = (0..24).map(|i| i * 10).collect();
        let source = PixelBuffer::new(bytes, 6, 4, PixelLayout::Gray8).unwrap();
        let encoded = png
            .writer()
            .encode("g.png", &Image::new(source.clone()), &Unstoppable)
            .unwrap();
        let decoded = png
            .reader()
            .read_pixels(&Request::from_bytes("g.png", encoded), Unstoppable)
            .unwrap();
        assert_eq!(decoded.pixels, source);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let Some(formats) = formats() else { return };
        let Some(png) = formats.by_name("PNG") else { return };
        let request = Request::from_bytes("bad.png", b"\x89PNG\r\n\x1a\nnot really".to_vec());
        let result = png.reader().read_pixels(&request, Unstoppable);
        assert!(matches!(result, Err(CodecError::Decode { .. })), "{result:?}");
    }

    #[test]
    fn released_handle_is_unknown() {
        let Ok(lib) = FreeImage::load() else { return };
        let Some(png) = lib.resolve_format(
            &ResolveHint {
                name: "x.png",
                content: None,
            },
            Mode::Write,
        ) else {
            return;
        };
        let handle = lib.open_bitmap("x.png", png, Flags::default()).unwrap();
        lib.close(handle);
        assert!(matches!(
            lib.save(handle),
            Err(CodecError::UnknownHandle(raw)) if raw == handle.raw()
        ));
    }
}
