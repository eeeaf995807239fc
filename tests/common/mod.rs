//! In-memory native codec library for tests.
//!
//! Encodes bitmaps as `magic | width | height | layout | pixels | metadata`,
//! counts every native call, and can be told to fail decode or encode.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use zenfreeimage::*;

const LAYOUTS: [PixelLayout; 9] = [
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

#[derive(Clone, Debug)]
pub struct MockFormat {
    pub name: &'static str,
    pub description: &'static str,
    pub extensions: &'static str,
    pub magic: &'static [u8],
    pub enabled: bool,
    pub readable: bool,
    pub writable: bool,
}

impl MockFormat {
    pub fn new(name: &'static str, extensions: &'static str, magic: &'static [u8]) -> Self {
        Self {
            name,
            description: name,
            extensions,
            magic,
            enabled: true,
            readable: true,
            writable: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }
}

pub fn png() -> MockFormat {
    MockFormat {
        description: "Portable Network Graphics",
        ..MockFormat::new("PNG", "png", b"\x89PNG")
    }
}

pub fn jpg() -> MockFormat {
    MockFormat {
        description: "JPEG - JFIF Compliant",
        ..MockFormat::new("JPG", "jpg,jif,jpeg,jpe", b"\xFF\xD8\xFF")
    }
}

#[derive(Default)]
struct MockBitmap {
    format: usize,
    pixels: Option<PixelBuffer>,
    meta: Metadata,
}

#[derive(Default)]
pub struct MockLibrary {
    formats: Vec<MockFormat>,
    loaded: bool,
    bitmaps: Mutex<HashMap<u64, MockBitmap>>,
    next: AtomicU64,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub stale_closes: AtomicUsize,
    pub resolves: AtomicUsize,
    pub bitmap_calls: AtomicUsize,
    pub fail_decode: AtomicBool,
    pub fail_encode: AtomicBool,
}

impl MockLibrary {
    pub fn new(formats: Vec<MockFormat>) -> Arc<Self> {
        Arc::new(Self {
            formats,
            loaded: true,
            ..Default::default()
        })
    }

    /// A library whose shared object could not be loaded.
    pub fn unloaded(formats: Vec<MockFormat>) -> Arc<Self> {
        Arc::new(Self {
            formats,
            loaded: false,
            ..Default::default()
        })
    }

    pub fn png_jpg() -> Arc<Self> {
        Self::new(vec![png(), jpg()])
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn resolves(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }

    pub fn open_bitmaps(&self) -> usize {
        self.bitmaps.lock().len()
    }

    pub fn as_dyn(self: &Arc<Self>) -> Arc<dyn NativeCodecLibrary> {
        self.clone()
    }

    fn extension(name: &str) -> Option<String> {
        let (_, ext) = name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }

    fn with_bitmap<T>(
        &self,
        handle: BitmapHandle,
        f: impl FnOnce(&mut MockBitmap, &MockFormat) -> Result<T, CodecError>,
    ) -> Result<T, CodecError> {
        self.bitmap_calls.fetch_add(1, Ordering::SeqCst);
        let mut bitmaps = self.bitmaps.lock();
        let bitmap = bitmaps
            .get_mut(&handle.raw())
            .ok_or(CodecError::UnknownHandle(handle.raw()))?;
        let format = &self.formats[bitmap.format];
        f(bitmap, format)
    }
}

impl NativeCodecLibrary for MockLibrary {
    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn format_count(&self) -> usize {
        self.formats.len()
    }

    fn is_enabled(&self, index: usize) -> bool {
        self.formats.get(index).is_some_and(|f| f.enabled)
    }

    fn name_of(&self, index: usize) -> Option<Vec<u8>> {
        self.formats.get(index).map(|f| f.name.as_bytes().to_vec())
    }

    fn description_of(&self, index: usize) -> Option<Vec<u8>> {
        self.formats
            .get(index)
            .map(|f| f.description.as_bytes().to_vec())
    }

    fn extensions_of(&self, index: usize) -> Option<Vec<u8>> {
        self.formats
            .get(index)
            .map(|f| f.extensions.as_bytes().to_vec())
    }

    fn resolve_format(&self, hint: &ResolveHint<'_>, mode: Mode) -> Option<FormatId> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        let allowed = |f: &MockFormat| {
            f.enabled
                && match mode {
                    Mode::Read => f.readable,
                    Mode::Write => f.writable,
                }
        };
        if let Some(content) = hint.content {
            if let Some(i) = self
                .formats
                .iter()
                .position(|f| allowed(f) && content.starts_with(f.magic))
            {
                return Some(FormatId::from_index(i));
            }
        }
        let ext = Self::extension(hint.name)?;
        self.formats
            .iter()
            .position(|f| allowed(f) && f.extensions.split(',').any(|e| e == ext))
            .map(FormatId::from_index)
    }

    fn open_bitmap(
        &self,
        _hint: &str,
        format: FormatId,
        _flags: Flags,
    ) -> Result<BitmapHandle, CodecError> {
        let index = usize::try_from(format.get())
            .ok()
            .filter(|&i| i < self.formats.len())
            .ok_or_else(|| CodecError::Unsupported(format!("no format {format}")))?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        let raw = self.next.fetch_add(1, Ordering::SeqCst);
        self.bitmaps.lock().insert(
            raw,
            MockBitmap {
                format: index,
                ..Default::default()
            },
        );
        Ok(BitmapHandle::new(raw))
    }

    fn load(&self, handle: BitmapHandle, data: &[u8]) -> Result<(), CodecError> {
        let fail = self.fail_decode.load(Ordering::SeqCst);
        self.with_bitmap(handle, |bitmap, format| {
            if fail {
                return Err(CodecError::decode(format.name, "injected failure"));
            }
            let (pixels, meta) = parse(format, data)
                .ok_or_else(|| CodecError::decode(format.name, "malformed data"))?;
            bitmap.pixels = Some(pixels);
            bitmap.meta = meta;
            Ok(())
        })
    }

    fn allocate(
        &self,
        handle: BitmapHandle,
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<(), CodecError> {
        let fail = self.fail_encode.load(Ordering::SeqCst);
        self.with_bitmap(handle, |bitmap, format| {
            if fail {
                return Err(CodecError::encode(format.name, "injected failure"));
            }
            bitmap.pixels = Some(PixelBuffer::zeroed(width, height, layout)?);
            Ok(())
        })
    }

    fn save(&self, handle: BitmapHandle) -> Result<Vec<u8>, CodecError> {
        self.with_bitmap(handle, |bitmap, format| {
            let pixels = bitmap
                .pixels
                .as_ref()
                .ok_or_else(|| CodecError::encode(format.name, "empty bitmap"))?;
            Ok(serialize(format, pixels, &bitmap.meta))
        })
    }

    fn describe(&self, handle: BitmapHandle) -> Result<BitmapInfo, CodecError> {
        self.with_bitmap(handle, |bitmap, format| {
            let pixels = bitmap
                .pixels
                .as_ref()
                .ok_or_else(|| CodecError::decode(format.name, "empty bitmap"))?;
            Ok(BitmapInfo {
                width: pixels.width(),
                height: pixels.height(),
                layout: pixels.layout(),
            })
        })
    }

    fn read_pixels(&self, handle: BitmapHandle) -> Result<PixelBuffer, CodecError> {
        self.with_bitmap(handle, |bitmap, format| {
            bitmap
                .pixels
                .clone()
                .ok_or_else(|| CodecError::decode(format.name, "empty bitmap"))
        })
    }

    fn read_meta(&self, handle: BitmapHandle) -> Result<Metadata, CodecError> {
        self.with_bitmap(handle, |bitmap, _| Ok(bitmap.meta.clone()))
    }

    fn write_pixels(&self, handle: BitmapHandle, pixels: &PixelBuffer) -> Result<(), CodecError> {
        let fail = self.fail_encode.load(Ordering::SeqCst);
        self.with_bitmap(handle, |bitmap, format| {
            if fail {
                return Err(CodecError::encode(format.name, "injected failure"));
            }
            let target = bitmap
                .pixels
                .as_mut()
                .ok_or_else(|| CodecError::encode(format.name, "not allocated"))?;
            if target.layout() != pixels.layout() {
                return Err(CodecError::LayoutMismatch {
                    expected: target.layout(),
                    actual: pixels.layout(),
                });
            }
            target.pixels_mut().copy_from_slice(pixels.pixels());
            Ok(())
        })
    }

    fn write_meta(&self, handle: BitmapHandle, meta: &Metadata) -> Result<(), CodecError> {
        self.with_bitmap(handle, |bitmap, _| {
            bitmap.meta.extend(meta.clone());
            Ok(())
        })
    }

    fn close(&self, handle: BitmapHandle) {
        if self.bitmaps.lock().remove(&handle.raw()).is_some() {
            self.closes.fetch_add(1, Ordering::SeqCst);
        } else {
            self.stale_closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn serialize(format: &MockFormat, pixels: &PixelBuffer, meta: &Metadata) -> Vec<u8> {
    let mut out = format.magic.to_vec();
    out.extend_from_slice(&pixels.width().to_le_bytes());
    out.extend_from_slice(&pixels.height().to_le_bytes());
    let layout = LAYOUTS.iter().position(|&l| l == pixels.layout()).unwrap();
    out.push(layout as u8);
    out.extend_from_slice(pixels.pixels());
    let texts: Vec<_> = meta
        .iter()
        .filter_map(|(model, key, value)| Some((model, key, value.as_text()?)))
        .collect();
    out.extend_from_slice(&(texts.len() as u32).to_le_bytes());
    for (model, key, text) in texts {
        for s in [model, key, text] {
            out.extend_from_slice(&(s.len() as u32).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
    }
    out
}

fn parse(format: &MockFormat, data: &[u8]) -> Option<(PixelBuffer, Metadata)> {
    let mut rest = data.strip_prefix(format.magic)?;
    let width = take_u32(&mut rest)?;
    let height = take_u32(&mut rest)?;
    let layout = *LAYOUTS.get(*rest.first()? as usize)?;
    rest = &rest[1..];
    let len = PixelBuffer::byte_len(width, height, layout).ok()?;
    let pixels = PixelBuffer::new(take(&mut rest, len)?.to_vec(), width, height, layout).ok()?;
    let mut meta = Metadata::new();
    for _ in 0..take_u32(&mut rest)? {
        let mut field = || {
            let n = take_u32(&mut rest)? as usize;
            String::from_utf8(take(&mut rest, n)?.to_vec()).ok()
        };
        let (model, key, text) = (field()?, field()?, field()?);
        meta.insert(model, key, text);
    }
    Some((pixels, meta))
}

fn take<'a>(rest: &mut &'a [u8], n: usize) -> Option<&'a [u8]> {
    if rest.len() < n {
        return None;
    }
    let (head, tail) = rest.split_at(n);
    *rest = tail;
    Some(head)
}

fn take_u32(rest: &mut &[u8]) -> Option<u32> {
    take(rest, 4).map(|b| u32::from_le_bytes(b.try_into().unwrap()))
}

/// A small RGB test pattern.
pub fn gradient(w: u32, h: u32) -> PixelBuffer {
    let mut pixels = Vec::with_capacity((w * h * 3) as usize);
    for y in 0..h {
        for x in 0..w {
            pixels.extend_from_slice(&[(x * 40) as u8, (y * 60) as u8, ((x + y) * 17) as u8]);
        }
    }
    PixelBuffer::new(pixels, w, h, PixelLayout::Rgb8).unwrap()
}
