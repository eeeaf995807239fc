//! Scoped ownership of one native bitmap handle.
//!
//! A [`BitmapSession`] acquires its handle in [`BitmapSession::open`] and
//! releases it exactly once: in [`BitmapSession::close`], or in `Drop` when
//! the session goes out of scope on an error path.

use alloc::vec::Vec;
use core::marker::PhantomData;

use crate::error::CodecError;
use crate::library::{BitmapHandle, BitmapInfo, Flags, FormatId, NativeCodecLibrary};
use crate::metadata::Metadata;
use crate::pixel::PixelBuffer;

/// Lifecycle state of a [`BitmapSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No handle held.
    Closed,
    /// Handle acquired, bitmap empty.
    Open,
    /// Bitmap decoded from bytes or allocated for encoding.
    Populated,
    /// Pixels or metadata have been copied out at least once.
    Extracted,
}

/// One native bitmap handle, scoped to a single read or write.
///
/// Not `Send`: native handles are not assumed to be thread-safe.
pub struct BitmapSession<'lib> {
    library: &'lib dyn NativeCodecLibrary,
    handle: Option<BitmapHandle>,
    state: SessionState,
    format: FormatId,
    _not_send: PhantomData<*const ()>,
}

impl<'lib> BitmapSession<'lib> {
    /// Acquire a bitmap handle bound to `format`. Closed → Open.
    pub fn open(
        library: &'lib dyn NativeCodecLibrary,
        hint: &str,
        format: FormatId,
        flags: Flags,
    ) -> Result<Self, CodecError> {
        if !library.is_loaded() {
            return Err(CodecError::LibraryUnavailable(
                "cannot open a bitmap without a loaded library".into(),
            ));
        }
        let handle = library.open_bitmap(hint, format, flags)?;
        log::trace!("bitmap {handle:?} opened for format {format} ({hint})");
        Ok(Self {
            library,
            handle: Some(handle),
            state: SessionState::Open,
            format,
            _not_send: PhantomData,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn format(&self) -> FormatId {
        self.format
    }

    /// Decode an encoded buffer into the bitmap. Open → Populated.
    pub fn load_from_bytes(&mut self, data: &[u8]) -> Result<(), CodecError> {
        let handle = self.expect_state(SessionState::Open)?;
        self.library.load(handle, data)?;
        self.state = SessionState::Populated;
        Ok(())
    }

    /// Allocate a native bitmap matching `image`'s shape. Open → Populated.
    pub fn allocate(&mut self, image: &PixelBuffer) -> Result<(), CodecError> {
        let handle = self.expect_state(SessionState::Open)?;
        self.library
            .allocate(handle, image.width(), image.height(), image.layout())?;
        self.state = SessionState::Populated;
        Ok(())
    }

    /// Shape of the populated bitmap.
    pub fn info(&self) -> Result<BitmapInfo, CodecError> {
        let handle = self.expect_populated()?;
        self.library.describe(handle)
    }

    /// Copy decoded pixels out. Repeatable.
    pub fn read_image_data(&mut self) -> Result<PixelBuffer, CodecError> {
        let handle = self.expect_populated()?;
        let pixels = self.library.read_pixels(handle)?;
        self.state = SessionState::Extracted;
        Ok(pixels)
    }

    /// Copy metadata out. Repeatable.
    pub fn read_meta_data(&mut self) -> Result<Metadata, CodecError> {
        let handle = self.expect_populated()?;
        let meta = self.library.read_meta(handle)?;
        self.state = SessionState::Extracted;
        Ok(meta)
    }

    /// Copy pixels into an allocated bitmap of the same shape.
    pub fn write_image_data(&mut self, image: &PixelBuffer) -> Result<(), CodecError> {
        let handle = self.expect_state(SessionState::Populated)?;
        let info = self.library.describe(handle)?;
        if (info.width, info.height) != (image.width(), image.height()) {
            return Err(CodecError::DimensionMismatch {
                width: image.width(),
                height: image.height(),
                bitmap_width: info.width,
                bitmap_height: info.height,
            });
        }
        if info.layout != image.layout() {
            return Err(CodecError::LayoutMismatch {
                expected: info.layout,
                actual: image.layout(),
            });
        }
        self.library.write_pixels(handle, image)
    }

    /// Attach metadata. `None` or empty metadata is skipped.
    pub fn write_meta_data(&mut self, meta: Option<&Metadata>) -> Result<(), CodecError> {
        let handle = self.expect_state(SessionState::Populated)?;
        match meta {
            Some(meta) if !meta.is_empty() => self.library.write_meta(handle, meta),
            _ => Ok(()),
        }
    }

    /// Encode the populated bitmap.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let handle = self.expect_state(SessionState::Populated)?;
        self.library.save(handle)
    }

    /// Release the handle. Any state → Closed.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.library.close(handle);
            log::trace!("bitmap {handle:?} closed");
        }
        self.state = SessionState::Closed;
    }

    fn expect_state(&self, expected: SessionState) -> Result<BitmapHandle, CodecError> {
        match self.handle {
            Some(handle) if self.state == expected => Ok(handle),
            _ => Err(CodecError::InvalidState {
                expected,
                actual: self.state,
            }),
        }
    }

    fn expect_populated(&self) -> Result<BitmapHandle, CodecError> {
        match (self.handle, self.state) {
            (Some(handle), SessionState::Populated | SessionState::Extracted) => Ok(handle),
            _ => Err(CodecError::InvalidState {
                expected: SessionState::Populated,
                actual: self.state,
            }),
        }
    }
}

impl Drop for BitmapSession<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
