use alloc::vec::Vec;
use enough::Stop;

use crate::error::CodecError;
use crate::format::FormatDescriptor;
use crate::library::Flags;
use crate::limits::Limits;
use crate::metadata::Metadata;
use crate::pixel::PixelBuffer;
use crate::request::Request;
use crate::session::BitmapSession;

/// Pixels to encode, with optional metadata to attach.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub pixels: PixelBuffer,
    pub meta: Option<Metadata>,
}

impl Image {
    pub fn new(pixels: PixelBuffer) -> Self {
        Self { pixels, meta: None }
    }

    pub fn with_meta(mut self, meta: Metadata) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl From<PixelBuffer> for Image {
    fn from(pixels: PixelBuffer) -> Self {
        Self::new(pixels)
    }
}

impl From<crate::DecodedImage> for Image {
    fn from(decoded: crate::DecodedImage) -> Self {
        Self {
            pixels: decoded.pixels,
            meta: Some(decoded.meta),
        }
    }
}

/// Encodes images with one native format.
#[derive(Clone, Debug)]
pub struct Writer<'a> {
    descriptor: &'a FormatDescriptor,
    flags: Flags,
    limits: Option<&'a Limits>,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(descriptor: &'a FormatDescriptor) -> Self {
        Self {
            descriptor,
            flags: Flags::default(),
            limits: None,
        }
    }

    /// Native save flags, forwarded verbatim.
    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn descriptor(&self) -> &'a FormatDescriptor {
        self.descriptor
    }

    /// Encode `image` and store the bytes on `request`.
    pub fn write_pixels(
        &self,
        image: &Image,
        request: &mut Request,
        stop: impl Stop,
    ) -> Result<(), CodecError> {
        let bytes = self.encode(request.name(), image, &stop)?;
        request.set_bytes(bytes);
        Ok(())
    }

    /// Encode `image`, using `name` only as a hint for the native library.
    pub fn encode(&self, name: &str, image: &Image, stop: &dyn Stop) -> Result<Vec<u8>, CodecError> {
        let pixels = &image.pixels;
        if let Some(limits) = self.limits {
            limits.check_bitmap(pixels.width(), pixels.height(), pixels.layout())?;
        }
        stop.check()?;
        let mut session = BitmapSession::open(
            self.descriptor.library(),
            name,
            self.descriptor.format_id(),
            self.flags,
        )?;
        session.allocate(pixels)?;
        session.write_image_data(pixels)?;
        session.write_meta_data(image.meta.as_ref())?;
        stop.check()?;
        let bytes = session.save_to_bytes()?;
        session.close();
        Ok(bytes)
    }

    /// Writing metadata without pixels is not supported.
    pub fn write_info(&self, _request: &mut Request, _meta: &Metadata) -> Result<(), CodecError> {
        Err(CodecError::Unsupported(alloc::format!(
            "{} cannot save metadata without image data",
            self.descriptor.name()
        )))
    }
}
