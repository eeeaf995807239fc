//! # zenfreeimage
//!
//! Format negotiation and bitmap lifecycle over a native, handle-based codec
//! library (FreeImage by default).
//!
//! ## How it fits together
//!
//! - [`discover`] enumerates the native format table once, skipping disabled
//!   plugins, and yields one [`CapabilityEntry`] per enabled codec.
//! - [`build_descriptors`] turns each entry into a [`FormatDescriptor`] and
//!   registers it with a [`FormatRegistry`].
//! - [`FormatDescriptor::can_read`] / [`FormatDescriptor::can_save`] claim a
//!   [`Request`] only when the native resolver picks exactly that format. The
//!   resolution is memoized on the request, so asking every descriptor costs
//!   one native probe per mode.
//! - [`Reader`] and [`Writer`] drive a [`BitmapSession`], which owns one
//!   native bitmap handle and releases it on every exit path.
//!
//! If the native library cannot be loaded, the format family is simply
//! empty: [`registry()`] returns no descriptors and nothing panics.
//!
//! ## Non-Goals
//!
//! - Codec implementations (all decoding/encoding is native)
//! - Streaming or partial decode of multi-frame containers
//! - Metadata-only writes
//!
//! ## Usage
//!
//! ```no_run
//! use zenfreeimage::{Request, Unstoppable};
//!
//! let request = Request::from_path("photo.jpg")?;
//! if let Some(format) = zenfreeimage::registry().find_reader(&request) {
//!     let image = format.reader().read_pixels(&request, Unstoppable)?;
//!     println!("{}x{} {:?}", image.width(), image.height(), image.pixels.layout());
//! }
//! # Ok::<(), zenfreeimage::CodecError>(())
//! ```

#![deny(unsafe_code)]

extern crate alloc;

mod capability;
mod decode;
mod encode;
mod error;
mod format;
mod library;
mod limits;
mod metadata;
mod pixel;
mod request;
mod session;

#[cfg(feature = "freeimage")]
#[allow(unsafe_code)]
pub mod freeimage;

use alloc::sync::Arc;
use std::sync::OnceLock;

// Re-exports
pub use capability::{CapabilityEntry, discover};
pub use decode::{DecodedImage, Reader};
pub use encode::{Image, Writer};
pub use enough::{Stop, Unstoppable};
pub use error::CodecError;
pub use format::{DESCRIPTION_PREFIX, FormatDescriptor, FormatRegistry, Formats, build_descriptors};
pub use library::{
    BitmapHandle, BitmapInfo, Flags, FormatId, Mode, NativeCodecLibrary, ResolveHint,
};
pub use limits::Limits;
pub use metadata::{MetaValue, Metadata};
#[cfg(feature = "rgb")]
pub use pixel::TypedPixel;
pub use pixel::{PixelBuffer, PixelLayout};
pub use request::{Expect, Request};
pub use session::{BitmapSession, SessionState};

static REGISTRY: OnceLock<Formats> = OnceLock::new();

/// The process-wide native formats, discovered on first use.
///
/// With the `freeimage` feature this loads FreeImage; if it cannot be loaded
/// (or the feature is off) the registry is empty.
pub fn registry() -> &'static Formats {
    REGISTRY.get_or_init(default_formats)
}

/// Initialize the process-wide registry from `library`.
///
/// Only the first initialization takes effect; later calls (including an
/// earlier implicit [`registry()`]) leave the registry unchanged.
pub fn init_with(library: Arc<dyn NativeCodecLibrary>) -> &'static Formats {
    let mut library = Some(library);
    let formats = REGISTRY.get_or_init(|| match library.take() {
        Some(library) => Formats::discover(library),
        None => Formats::default(),
    });
    if library.is_some() {
        log::debug!("native format registry already initialized; ignoring init_with");
    }
    formats
}

#[cfg(feature = "freeimage")]
fn default_formats() -> Formats {
    match freeimage::FreeImage::load() {
        Ok(library) => Formats::discover(Arc::new(library)),
        Err(e) => {
            log::warn!("FreeImage formats unavailable: {e}");
            Formats::default()
        }
    }
}

#[cfg(not(feature = "freeimage"))]
fn default_formats() -> Formats {
    log::debug!("built without a native backend; no native formats");
    Formats::default()
}
