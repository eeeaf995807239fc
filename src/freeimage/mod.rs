//! FreeImage backend, loaded at runtime.
//!
//! [`FreeImage`] implements [`NativeCodecLibrary`] over the FreeImage C API.
//! The shared library is located with `libloading`; a missing library is
//! reported as [`CodecError::LibraryUnavailable`] and never panics.
//!
//! Each [`BitmapHandle`] maps to a slot holding the bound format, the load or
//! save flags, and (once populated) the `FIBITMAP`. Slots are only
//! bookkeeping: the owning session is the only user of its bitmap.

mod convert;
mod ffi;
mod meta;

pub use ffi::LIBRARY_ENV;

use alloc::string::String;
use alloc::vec::Vec;
use core::ffi::{c_int, c_void};
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::HashMap;
use std::ffi::CString;
use std::path::Path;

use parking_lot::Mutex;

use self::convert::NativeShape;
use self::ffi::{Api, FiBitmap, FiMemory, FiMetadata, FiTag};
use crate::error::CodecError;
use crate::library::{
    BitmapHandle, BitmapInfo, Flags, FormatId, Mode, NativeCodecLibrary, ResolveHint,
};
use crate::metadata::Metadata;
use crate::pixel::{PixelBuffer, PixelLayout};

/// An owned `FIBITMAP*`.
struct Dib(NonNull<FiBitmap>);

// SAFETY: a FIBITMAP has no thread affinity; the owning session serializes use.
unsafe impl Send for Dib {}

struct Slot {
    format: c_int,
    flags: c_int,
    dib: Option<Dib>,
}

/// The FreeImage native codec library.
pub struct FreeImage {
    api: Api,
    slots: Mutex<HashMap<u64, Slot>>,
    next_handle: AtomicU64,
}

impl FreeImage {
    /// Load from `$FREEIMAGE_LIBRARY`, then the platform's default library names.
    pub fn load() -> Result<Self, CodecError> {
        Ok(Self::with_api(Api::load()?))
    }

    /// Load from an explicit path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        Ok(Self::with_api(Api::load_from(path.as_ref())?))
    }

    fn with_api(api: Api) -> Self {
        Self {
            api,
            slots: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// FreeImage's version string.
    pub fn version(&self) -> String {
        self.api.version()
    }

    fn slot_info(&self, handle: BitmapHandle) -> Result<(c_int, c_int), CodecError> {
        let slots = self.slots.lock();
        let slot = slots.get(&handle.raw()).ok_or_else(|| stale(handle))?;
        Ok((slot.format, slot.flags))
    }

    fn dib(&self, handle: BitmapHandle) -> Result<*mut FiBitmap, CodecError> {
        let slots = self.slots.lock();
        let slot = slots.get(&handle.raw()).ok_or_else(|| stale(handle))?;
        slot.dib
            .as_ref()
            .map(|d| d.0.as_ptr())
            .ok_or_else(|| CodecError::decode(&self.name(slot.format), "bitmap not populated"))
    }

    fn install(&self, handle: BitmapHandle, dib: NonNull<FiBitmap>) -> Result<(), CodecError> {
        let previous = {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.get_mut(&handle.raw()) else {
                // SAFETY: freshly created, not shared.
                unsafe { (self.api.unload)(dib.as_ptr()) };
                return Err(stale(handle));
            };
            slot.dib.replace(Dib(dib))
        };
        if let Some(previous) = previous {
            // SAFETY: the slot no longer references it.
            unsafe { (self.api.unload)(previous.0.as_ptr()) };
        }
        Ok(())
    }

    fn name(&self, fif: c_int) -> String {
        // SAFETY: static string owned by the library, or null.
        unsafe { ffi::c_str((self.api.get_format_from_fif)(fif)) }
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_else(|| alloc::format!("format {fif}"))
    }

    fn fif_in_range(&self, fif: c_int) -> bool {
        // SAFETY: no arguments.
        fif >= 0 && fif < unsafe { (self.api.get_fif_count)() }
    }

    fn static_str(&self, ptr: *const core::ffi::c_char) -> Option<Vec<u8>> {
        // SAFETY: table strings are static for the library's lifetime.
        unsafe { ffi::c_str(ptr) }.map(<[u8]>::to_vec)
    }

    fn shape_of(&self, dib: *mut FiBitmap) -> NativeShape {
        // SAFETY: `dib` is a live bitmap owned by the calling session.
        unsafe {
            convert::classify(
                (self.api.get_image_type)(dib),
                (self.api.get_bpp)(dib),
                (self.api.get_color_type)(dib),
            )
        }
    }

    fn dimensions(&self, dib: *mut FiBitmap) -> (u32, u32) {
        // SAFETY: `dib` is a live bitmap.
        unsafe { ((self.api.get_width)(dib), (self.api.get_height)(dib)) }
    }

    fn copy_out(&self, dib: *mut FiBitmap, layout: PixelLayout) -> Result<PixelBuffer, CodecError> {
        let (width, height) = self.dimensions(dib);
        let mut out = PixelBuffer::zeroed(width, height, layout)?;
        let stride = out.stride();
        for y in 0..height {
            // SAFETY: scanlines are at least `stride` bytes for this layout.
            let scanline = unsafe {
                let ptr = (self.api.get_scan_line)(dib, convert::scanline_index(y, height));
                if ptr.is_null() {
                    return Err(CodecError::decode("FreeImage", "missing scanline"));
                }
                core::slice::from_raw_parts(ptr, stride)
            };
            convert::scanline_to_row(scanline, out.row_mut(y), layout);
        }
        Ok(out)
    }

    fn read_tags(&self, dib: *mut FiBitmap, model: c_int, name: &str, meta: &mut Metadata) {
        let mut tag: *mut FiTag = ptr::null_mut();
        // SAFETY: `dib` is live; `tag` receives a library-owned tag.
        let search = unsafe { (self.api.find_first_metadata)(model, dib, &mut tag) };
        let Some(search) = NonNull::new(search) else {
            return;
        };
        let _close = MetadataSearch {
            api: &self.api,
            search,
        };
        loop {
            if let Some((key, value)) = self.read_tag(tag) {
                meta.insert(name, key, value);
            }
            // SAFETY: `search` stays open until `_close` drops.
            if unsafe { (self.api.find_next_metadata)(search.as_ptr(), &mut tag) } == 0 {
                break;
            }
        }
    }

    fn read_tag(&self, tag: *mut FiTag) -> Option<(String, crate::MetaValue)> {
        if tag.is_null() {
            return None;
        }
        // SAFETY: `tag` is owned by the open metadata search; its value
        // buffer holds `length` bytes.
        unsafe {
            let key = ffi::c_str((self.api.get_tag_key)(tag))?;
            let key = String::from_utf8_lossy(key).into_owned();
            let type_id = (self.api.get_tag_type)(tag) as u16;
            let count = (self.api.get_tag_count)(tag);
            let length = (self.api.get_tag_length)(tag) as usize;
            let value = (self.api.get_tag_value)(tag) as *const u8;
            let bytes = if value.is_null() || length == 0 {
                &[][..]
            } else {
                core::slice::from_raw_parts(value, length)
            };
            Some((key, meta::decode_value(type_id, count, bytes)))
        }
    }

    fn write_tag(
        &self,
        dib: *mut FiBitmap,
        model: c_int,
        key: &str,
        value: &crate::MetaValue,
    ) -> bool {
        let Ok(c_key) = CString::new(key) else {
            return false;
        };
        let (type_id, count, bytes) = meta::encode_value(value);
        // SAFETY: the tag is created and deleted here; FreeImage copies
        // key and value on set.
        unsafe {
            let Some(tag) = NonNull::new((self.api.create_tag)()) else {
                return false;
            };
            let _delete = TagGuard { api: &self.api, tag };
            let tag = tag.as_ptr();
            (self.api.set_tag_key)(tag, c_key.as_ptr()) != 0
                && (self.api.set_tag_type)(tag, c_int::from(type_id)) != 0
                && (self.api.set_tag_count)(tag, count) != 0
                && (self.api.set_tag_length)(tag, bytes.len() as u32) != 0
                && (self.api.set_tag_value)(tag, bytes.as_ptr() as *const c_void) != 0
                && (self.api.set_metadata)(model, dib, c_key.as_ptr(), tag) != 0
        }
    }
}

impl NativeCodecLibrary for FreeImage {
    fn format_count(&self) -> usize {
        // SAFETY: no arguments.
        let count = unsafe { (self.api.get_fif_count)() };
        count.max(0) as usize
    }

    fn is_enabled(&self, index: usize) -> bool {
        // SAFETY: out-of-range slots report -1.
        unsafe { (self.api.is_plugin_enabled)(index as c_int) == 1 }
    }

    fn name_of(&self, index: usize) -> Option<Vec<u8>> {
        // SAFETY: out-of-range slots return null.
        self.static_str(unsafe { (self.api.get_format_from_fif)(index as c_int) })
    }

    fn description_of(&self, index: usize) -> Option<Vec<u8>> {
        // SAFETY: out-of-range slots return null.
        self.static_str(unsafe { (self.api.get_fif_description)(index as c_int) })
    }

    fn extensions_of(&self, index: usize) -> Option<Vec<u8>> {
        // SAFETY: out-of-range slots return null.
        self.static_str(unsafe { (self.api.get_fif_extension_list)(index as c_int) })
    }

    fn resolve_format(&self, hint: &ResolveHint<'_>, mode: Mode) -> Option<FormatId> {
        let name = CString::new(hint.name).ok();
        let mut fif = ffi::FIF_UNKNOWN;
        if mode == Mode::Read {
            if let Some(content) = hint.content {
                if let Some(stream) = MemoryStream::borrowed(&self.api, content) {
                    // SAFETY: the stream wraps `content`, which outlives it.
                    fif = unsafe { (self.api.get_file_type_from_memory)(stream.ptr(), 0) };
                }
            } else if let Some(name) = &name {
                // SAFETY: NUL-terminated path; FreeImage only opens it for reading.
                fif = unsafe { (self.api.get_file_type)(name.as_ptr(), 0) };
            }
        }
        if fif == ffi::FIF_UNKNOWN {
            if let Some(name) = &name {
                // SAFETY: NUL-terminated name.
                fif = unsafe { (self.api.get_fif_from_filename)(name.as_ptr()) };
            }
        }
        if fif == ffi::FIF_UNKNOWN {
            return None;
        }
        // SAFETY: `fif` is a valid format id.
        let supported = unsafe {
            match mode {
                Mode::Read => (self.api.fif_supports_reading)(fif),
                Mode::Write => (self.api.fif_supports_writing)(fif),
            }
        };
        (supported != 0).then(|| FormatId::new(fif))
    }

    fn open_bitmap(
        &self,
        _hint: &str,
        format: FormatId,
        flags: Flags,
    ) -> Result<BitmapHandle, CodecError> {
        if !self.fif_in_range(format.get()) {
            return Err(CodecError::Unsupported(alloc::format!(
                "FreeImage has no format {format}"
            )));
        }
        let handle = BitmapHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.slots.lock().insert(
            handle.raw(),
            Slot {
                format: format.get(),
                flags: flags.0,
                dib: None,
            },
        );
        Ok(handle)
    }

    fn load(&self, handle: BitmapHandle, data: &[u8]) -> Result<(), CodecError> {
        let (fif, flags) = self.slot_info(handle)?;
        let name = self.name(fif);
        let stream = MemoryStream::borrowed(&self.api, data)
            .ok_or_else(|| CodecError::decode(&name, "cannot wrap input bytes"))?;
        ffi::clear_message();
        // SAFETY: the stream wraps `data`, which outlives the call.
        let dib = unsafe { (self.api.load_from_memory)(fif, stream.ptr(), flags) };
        drop(stream);
        let dib = NonNull::new(dib)
            .ok_or_else(|| CodecError::decode(&name, ffi::take_message("could not load bitmap")))?;
        self.install(handle, dib)
    }

    fn allocate(
        &self,
        handle: BitmapHandle,
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<(), CodecError> {
        let (fif, _) = self.slot_info(handle)?;
        let name = self.name(fif);
        let (image_type, bpp) = convert::native_type(layout);
        // SAFETY: `fif` is in range (checked at open).
        let supported = unsafe {
            if image_type == ffi::FIT_BITMAP {
                (self.api.fif_supports_export_bpp)(fif, bpp)
            } else {
                (self.api.fif_supports_export_type)(fif, image_type)
            }
        };
        if supported == 0 {
            return Err(CodecError::encode(
                &name,
                alloc::format!("cannot store {layout:?} pixels"),
            ));
        }
        let (w, h) = (
            c_int::try_from(width).map_err(|_| CodecError::DimensionsTooLarge { width, height })?,
            c_int::try_from(height).map_err(|_| CodecError::DimensionsTooLarge { width, height })?,
        );
        let (r, g, b) = if image_type == ffi::FIT_BITMAP && bpp >= 24 {
            ffi::RGB_MASKS
        } else {
            (0, 0, 0)
        };
        ffi::clear_message();
        // SAFETY: plain allocation call.
        let dib = unsafe { (self.api.allocate_t)(image_type, w, h, bpp, r, g, b) };
        let dib = NonNull::new(dib)
            .ok_or_else(|| CodecError::encode(&name, ffi::take_message("allocation failed")))?;
        if layout == PixelLayout::Gray8 {
            // SAFETY: 8-bit bitmaps carry a 256-entry palette.
            unsafe {
                let palette = (self.api.get_palette)(dib.as_ptr());
                if !palette.is_null() {
                    for (i, entry) in core::slice::from_raw_parts_mut(palette, 256)
                        .iter_mut()
                        .enumerate()
                    {
                        let v = i as u8;
                        *entry = ffi::RgbQuad {
                            blue: v,
                            green: v,
                            red: v,
                            reserved: 0,
                        };
                    }
                }
            }
        }
        self.install(handle, dib)
    }

    fn save(&self, handle: BitmapHandle) -> Result<Vec<u8>, CodecError> {
        let (fif, flags) = self.slot_info(handle)?;
        let dib = self.dib(handle)?;
        let name = self.name(fif);
        let stream = MemoryStream::owned(&self.api)
            .ok_or_else(|| CodecError::encode(&name, "cannot open output stream"))?;
        ffi::clear_message();
        // SAFETY: `dib` and `stream` are live for the call.
        let ok = unsafe { (self.api.save_to_memory)(fif, dib, stream.ptr(), flags) };
        if ok == 0 {
            return Err(CodecError::encode(&name, ffi::take_message("could not save bitmap")));
        }
        stream
            .to_vec()
            .ok_or_else(|| CodecError::encode(&name, "could not read output stream"))
    }

    fn describe(&self, handle: BitmapHandle) -> Result<BitmapInfo, CodecError> {
        let dib = self.dib(handle)?;
        let (width, height) = self.dimensions(dib);
        let layout = match self.shape_of(dib) {
            NativeShape::Direct(layout) => layout,
            NativeShape::Convert32 => PixelLayout::Rgba8,
            NativeShape::Unsupported => {
                let (fif, _) = self.slot_info(handle)?;
                return Err(CodecError::decode(&self.name(fif), "unsupported bitmap type"));
            }
        };
        Ok(BitmapInfo {
            width,
            height,
            layout,
        })
    }

    fn read_pixels(&self, handle: BitmapHandle) -> Result<PixelBuffer, CodecError> {
        let dib = self.dib(handle)?;
        match self.shape_of(dib) {
            NativeShape::Direct(layout) => self.copy_out(dib, layout),
            NativeShape::Convert32 => {
                // SAFETY: returns a new bitmap, unloaded below.
                let converted = unsafe { (self.api.convert_to_32_bits)(dib) };
                let converted = NonNull::new(converted)
                    .ok_or_else(|| CodecError::decode("FreeImage", "32-bit conversion failed"))?;
                let result = self.copy_out(converted.as_ptr(), PixelLayout::Rgba8);
                // SAFETY: `converted` is ours alone.
                unsafe { (self.api.unload)(converted.as_ptr()) };
                result
            }
            NativeShape::Unsupported => {
                let (fif, _) = self.slot_info(handle)?;
                Err(CodecError::decode(&self.name(fif), "unsupported bitmap type"))
            }
        }
    }

    fn read_meta(&self, handle: BitmapHandle) -> Result<Metadata, CodecError> {
        let dib = self.dib(handle)?;
        let mut meta = Metadata::new();
        for &(model, name) in ffi::METADATA_MODELS {
            self.read_tags(dib, model, name, &mut meta);
        }
        Ok(meta)
    }

    fn write_pixels(&self, handle: BitmapHandle, pixels: &PixelBuffer) -> Result<(), CodecError> {
        let dib = self.dib(handle)?;
        let info = self.describe(handle)?;
        if (info.width, info.height) != (pixels.width(), pixels.height()) {
            return Err(CodecError::DimensionMismatch {
                width: pixels.width(),
                height: pixels.height(),
                bitmap_width: info.width,
                bitmap_height: info.height,
            });
        }
        if info.layout != pixels.layout() {
            return Err(CodecError::LayoutMismatch {
                expected: info.layout,
                actual: pixels.layout(),
            });
        }
        let stride = pixels.stride();
        for y in 0..pixels.height() {
            // SAFETY: scanlines are at least `stride` bytes for this layout.
            let scanline = unsafe {
                let ptr = (self.api.get_scan_line)(dib, convert::scanline_index(y, pixels.height()));
                if ptr.is_null() {
                    return Err(CodecError::encode("FreeImage", "missing scanline"));
                }
                core::slice::from_raw_parts_mut(ptr, stride)
            };
            convert::row_to_scanline(pixels.row(y), scanline, pixels.layout());
        }
        Ok(())
    }

    fn write_meta(&self, handle: BitmapHandle, meta: &Metadata) -> Result<(), CodecError> {
        let dib = self.dib(handle)?;
        for (model_name, key, value) in meta.iter() {
            let Some(model) = meta::model_id(model_name) else {
                log::warn!("unknown metadata model {model_name:?}, skipping {key:?}");
                continue;
            };
            if !self.write_tag(dib, model, key, value) {
                log::warn!("FreeImage rejected metadata {model_name}/{key}");
            }
        }
        Ok(())
    }

    fn close(&self, handle: BitmapHandle) {
        let slot = self.slots.lock().remove(&handle.raw());
        if let Some(Slot { dib: Some(dib), .. }) = slot {
            // SAFETY: removed from the table, so nothing else references it.
            unsafe { (self.api.unload)(dib.0.as_ptr()) };
        }
    }
}

impl Drop for FreeImage {
    fn drop(&mut self) {
        for (_, slot) in self.slots.get_mut().drain() {
            if let Some(dib) = slot.dib {
                // SAFETY: sessions borrow the library, so none are alive here.
                unsafe { (self.api.unload)(dib.0.as_ptr()) };
            }
        }
    }
}

fn stale(handle: BitmapHandle) -> CodecError {
    CodecError::UnknownHandle(handle.raw())
}

/// A `FIMEMORY` stream, closed on drop.
struct MemoryStream<'a> {
    api: &'a Api,
    stream: NonNull<FiMemory>,
}

impl<'a> MemoryStream<'a> {
    /// Read-only view over `data`.
    fn borrowed(api: &'a Api, data: &'a [u8]) -> Option<Self> {
        let len = u32::try_from(data.len()).ok()?;
        // SAFETY: FreeImage only reads from a stream opened over caller memory.
        let stream = unsafe { (api.open_memory)(data.as_ptr() as *mut u8, len) };
        NonNull::new(stream).map(|stream| Self { api, stream })
    }

    /// Growable stream owned by FreeImage.
    fn owned(api: &'a Api) -> Option<Self> {
        // SAFETY: null/0 asks FreeImage to manage the buffer.
        let stream = unsafe { (api.open_memory)(ptr::null_mut(), 0) };
        NonNull::new(stream).map(|stream| Self { api, stream })
    }

    fn ptr(&self) -> *mut FiMemory {
        self.stream.as_ptr()
    }

    fn to_vec(&self) -> Option<Vec<u8>> {
        let mut data: *mut u8 = ptr::null_mut();
        let mut len: u32 = 0;
        // SAFETY: the acquired buffer stays valid until the stream closes.
        unsafe {
            if (self.api.acquire_memory)(self.ptr(), &mut data, &mut len) == 0 {
                return None;
            }
            if data.is_null() {
                return Some(Vec::new());
            }
            Some(core::slice::from_raw_parts(data, len as usize).to_vec())
        }
    }
}

impl Drop for MemoryStream<'_> {
    fn drop(&mut self) {
        // SAFETY: opened by this guard, closed once.
        unsafe { (self.api.close_memory)(self.stream.as_ptr()) }
    }
}

struct MetadataSearch<'a> {
    api: &'a Api,
    search: NonNull<FiMetadata>,
}

impl Drop for MetadataSearch<'_> {
    fn drop(&mut self) {
        // SAFETY: opened by FindFirstMetadata, closed once.
        unsafe { (self.api.find_close_metadata)(self.search.as_ptr()) }
    }
}

struct TagGuard<'a> {
    api: &'a Api,
    tag: NonNull<FiTag>,
}

impl Drop for TagGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: created by CreateTag, deleted once.
        unsafe { (self.api.delete_tag)(self.tag.as_ptr()) }
    }
}
