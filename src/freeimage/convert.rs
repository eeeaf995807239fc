//! Row conversion between FreeImage scanlines and [`PixelBuffer`] rows.
//!
//! FreeImage stores rows bottom-up; 24/32-bit standard bitmaps are BGR(A)
//! on little-endian hosts. Typed bitmaps (RGB16, RGBF, ...) are always RGB.

use core::ffi::c_int;

use super::ffi;
use crate::pixel::PixelLayout;

/// Native image type and bit depth for a layout.
pub(crate) fn native_type(layout: PixelLayout) -> (c_int, c_int) {
    match layout {
        PixelLayout::Gray8 => (ffi::FIT_BITMAP, 8),
        PixelLayout::Rgb8 => (ffi::FIT_BITMAP, 24),
        PixelLayout::Rgba8 => (ffi::FIT_BITMAP, 32),
        PixelLayout::Gray16 => (ffi::FIT_UINT16, 16),
        PixelLayout::Rgb16 => (ffi::FIT_RGB16, 48),
        PixelLayout::Rgba16 => (ffi::FIT_RGBA16, 64),
        PixelLayout::GrayF32 => (ffi::FIT_FLOAT, 32),
        PixelLayout::RgbF32 => (ffi::FIT_RGBF, 96),
        PixelLayout::RgbaF32 => (ffi::FIT_RGBAF, 128),
    }
}

/// How a native bitmap maps to a layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NativeShape {
    /// Rows can be copied (and swizzled) directly.
    Direct(PixelLayout),
    /// Must be converted to 32-bit RGBA first (palettes, 1/4/16-bit).
    Convert32,
    Unsupported,
}

pub(crate) fn classify(image_type: c_int, bpp: u32, color_type: c_int) -> NativeShape {
    match (image_type, bpp) {
        (ffi::FIT_BITMAP, 8) if color_type == ffi::FIC_MINISBLACK => {
            NativeShape::Direct(PixelLayout::Gray8)
        }
        (ffi::FIT_BITMAP, 24) => NativeShape::Direct(PixelLayout::Rgb8),
        (ffi::FIT_BITMAP, 32) => NativeShape::Direct(PixelLayout::Rgba8),
        (ffi::FIT_BITMAP, _) => NativeShape::Convert32,
        (ffi::FIT_UINT16, _) => NativeShape::Direct(PixelLayout::Gray16),
        (ffi::FIT_FLOAT, _) => NativeShape::Direct(PixelLayout::GrayF32),
        (ffi::FIT_RGB16, _) => NativeShape::Direct(PixelLayout::Rgb16),
        (ffi::FIT_RGBA16, _) => NativeShape::Direct(PixelLayout::Rgba16),
        (ffi::FIT_RGBF, _) => NativeShape::Direct(PixelLayout::RgbF32),
        (ffi::FIT_RGBAF, _) => NativeShape::Direct(PixelLayout::RgbaF32),
        _ => NativeShape::Unsupported,
    }
}

/// Whether standard 8-bit color bitmaps need red/blue swapped on this host.
const fn swaps_red_blue(layout: PixelLayout) -> bool {
    cfg!(target_endian = "little") && matches!(layout, PixelLayout::Rgb8 | PixelLayout::Rgba8)
}

/// Copy one native scanline into a top-down RGB(A) row.
pub(crate) fn scanline_to_row(src: &[u8], dst: &mut [u8], layout: PixelLayout) {
    dst.copy_from_slice(&src[..dst.len()]);
    if swaps_red_blue(layout) {
        swap_red_blue(dst, layout.bytes_per_pixel());
    }
}

/// Copy one RGB(A) row into a native scanline.
pub(crate) fn row_to_scanline(src: &[u8], dst: &mut [u8], layout: PixelLayout) {
    let dst = &mut dst[..src.len()];
    dst.copy_from_slice(src);
    if swaps_red_blue(layout) {
        swap_red_blue(dst, layout.bytes_per_pixel());
    }
}

fn swap_red_blue(row: &mut [u8], bpp: usize) {
    for px in row.chunks_exact_mut(bpp) {
        px.swap(0, 2);
    }
}

/// Native scanline index holding top-down row `y`.
pub(crate) fn scanline_index(y: u32, height: u32) -> c_int {
    (height - 1 - y) as c_int
}
