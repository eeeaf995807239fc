//! The native codec library capability.
//!
//! [`NativeCodecLibrary`] is the whole surface this crate needs from a
//! handle-based codec library. The FreeImage backend implements it over
//! FFI; anything else with the same capability set (including an in-memory
//! double in tests) is substitutable.

use alloc::vec::Vec;
use core::fmt;

use crate::error::CodecError;
use crate::metadata::Metadata;
use crate::pixel::{PixelBuffer, PixelLayout};

/// Native identifier of one supported file format.
///
/// For table-driven libraries this is the slot index in the format table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormatId(i32);

impl FormatId {
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i32 {
        self.0
    }

    /// Format id for a format-table slot.
    pub fn from_index(index: usize) -> Self {
        Self(index as i32)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Open mode used for format resolution.
///
/// A library may read a format it cannot write, so resolution is per mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Read,
    Write,
}

/// Load/save flags forwarded unchanged to the native library.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Flags(pub i32);

/// Opaque native bitmap handle, valid between `open_bitmap` and `close`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitmapHandle(u64);

impl BitmapHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Input to format resolution: a name (extension hint) and optional content
/// to sniff.
#[derive(Clone, Copy, Debug)]
pub struct ResolveHint<'a> {
    pub name: &'a str,
    pub content: Option<&'a [u8]>,
}

/// Shape of a populated native bitmap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitmapInfo {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
}

/// Capability set of a native codec library.
///
/// Table queries are indexed by format-table slot (`0..format_count()`).
/// Bitmap calls take a handle obtained from [`open_bitmap`](Self::open_bitmap);
/// callers release each handle exactly once with [`close`](Self::close).
/// [`crate::BitmapSession`] enforces that discipline.
pub trait NativeCodecLibrary: Send + Sync {
    /// Whether the library is loaded and callable.
    fn is_loaded(&self) -> bool {
        true
    }

    /// Number of slots in the format table.
    fn format_count(&self) -> usize;

    /// Whether the plugin in `index` is enabled.
    fn is_enabled(&self, index: usize) -> bool;

    /// Short format name, as raw ASCII bytes.
    fn name_of(&self, index: usize) -> Option<Vec<u8>>;

    /// Human readable description, as raw ASCII bytes.
    fn description_of(&self, index: usize) -> Option<Vec<u8>>;

    /// Comma separated extension list, as raw ASCII bytes.
    fn extensions_of(&self, index: usize) -> Option<Vec<u8>>;

    /// Resolve the format able to service `hint` in `mode`, if any.
    fn resolve_format(&self, hint: &ResolveHint<'_>, mode: Mode) -> Option<FormatId>;

    /// Acquire a bitmap handle bound to `format`.
    fn open_bitmap(
        &self,
        hint: &str,
        format: FormatId,
        flags: Flags,
    ) -> Result<BitmapHandle, CodecError>;

    /// Decode `data` into the bitmap.
    fn load(&self, handle: BitmapHandle, data: &[u8]) -> Result<(), CodecError>;

    /// Allocate an empty bitmap of the given shape for encoding.
    fn allocate(
        &self,
        handle: BitmapHandle,
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<(), CodecError>;

    /// Encode the bitmap to the bound format.
    fn save(&self, handle: BitmapHandle) -> Result<Vec<u8>, CodecError>;

    /// Shape of the populated bitmap, without copying pixels.
    fn describe(&self, handle: BitmapHandle) -> Result<BitmapInfo, CodecError>;

    fn read_pixels(&self, handle: BitmapHandle) -> Result<PixelBuffer, CodecError>;

    fn read_meta(&self, handle: BitmapHandle) -> Result<Metadata, CodecError>;

    fn write_pixels(&self, handle: BitmapHandle, pixels: &PixelBuffer) -> Result<(), CodecError>;

    fn write_meta(&self, handle: BitmapHandle, meta: &Metadata) -> Result<(), CodecError>;

    /// Release the handle and everything it owns.
    fn close(&self, handle: BitmapHandle);
}
