use crate::error::CodecError;
use crate::pixel::PixelLayout;

/// Resource limits applied around native bitmap sessions.
///
/// Checked after a bitmap is loaded (before its pixels are copied out) and
/// before a bitmap is allocated for encoding. All fields default to `None`
/// (no limit).
#[derive(Clone, Debug, Default)]
pub struct Limits {
    pub max_width: Option<u64>,
    pub max_height: Option<u64>,
    /// Maximum pixel count (width * height).
    pub max_pixels: Option<u64>,
    /// Maximum memory bytes for a pixel buffer.
    pub max_memory_bytes: Option<u64>,
}

impl Limits {
    /// Check dimensions against limits. Returns Ok(()) or LimitExceeded error.
    pub(crate) fn check(&self, width: u32, height: u32) -> Result<(), CodecError> {
        if let Some(max_w) = self.max_width {
            if u64::from(width) > max_w {
                return Err(CodecError::LimitExceeded(alloc::format!(
                    "width {width} exceeds limit {max_w}"
                )));
            }
        }
        if let Some(max_h) = self.max_height {
            if u64::from(height) > max_h {
                return Err(CodecError::LimitExceeded(alloc::format!(
                    "height {height} exceeds limit {max_h}"
                )));
            }
        }
        if let Some(max_px) = self.max_pixels {
            let pixels = u64::from(width) * u64::from(height);
            if pixels > max_px {
                return Err(CodecError::LimitExceeded(alloc::format!(
                    "pixel count {pixels} exceeds limit {max_px}"
                )));
            }
        }
        Ok(())
    }

    /// Check that an allocation size is within memory limits.
    pub(crate) fn check_memory(&self, bytes: u64) -> Result<(), CodecError> {
        if let Some(max_mem) = self.max_memory_bytes {
            if bytes > max_mem {
                return Err(CodecError::LimitExceeded(alloc::format!(
                    "allocation {bytes} bytes exceeds memory limit {max_mem}"
                )));
            }
        }
        Ok(())
    }

    /// Dimension and memory checks for a bitmap of the given shape.
    pub(crate) fn check_bitmap(
        &self,
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<(), CodecError> {
        self.check(width, height)?;
        let bytes = (u64::from(width) * u64::from(height))
            .saturating_mul(layout.bytes_per_pixel() as u64);
        self.check_memory(bytes)
    }
}
