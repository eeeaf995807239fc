use alloc::vec::Vec;

#[cfg(feature = "rgb")]
use rgb::AsPixels as _;

use crate::error::CodecError;

/// Pixel memory layout, top-down rows, channels in RGB(A) order.
///
/// Multi-byte samples are native endian.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    /// Single channel, 8-bit grayscale.
    Gray8,
    /// Single channel, 16-bit grayscale.
    Gray16,
    /// Single channel, 32-bit float grayscale.
    GrayF32,
    /// 3 channels, 8-bit RGB.
    Rgb8,
    /// 4 channels, 8-bit RGBA.
    Rgba8,
    /// 3 channels, 16-bit RGB.
    Rgb16,
    /// 4 channels, 16-bit RGBA.
    Rgba16,
    /// 3 channels, 32-bit float RGB.
    RgbF32,
    /// 4 channels, 32-bit float RGBA.
    RgbaF32,
}

impl PixelLayout {
    /// Bytes per pixel for this layout.
    pub fn bytes_per_pixel(&self) -> usize {
        self.channels() * self.bytes_per_channel()
    }

    /// Bytes per channel sample.
    pub fn bytes_per_channel(&self) -> usize {
        match self {
            Self::Gray8 | Self::Rgb8 | Self::Rgba8 => 1,
            Self::Gray16 | Self::Rgb16 | Self::Rgba16 => 2,
            Self::GrayF32 | Self::RgbF32 | Self::RgbaF32 => 4,
        }
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        match self {
            Self::Gray8 | Self::Gray16 | Self::GrayF32 => 1,
            Self::Rgb8 | Self::Rgb16 | Self::RgbF32 => 3,
            Self::Rgba8 | Self::Rgba16 | Self::RgbaF32 => 4,
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.channels() == 4
    }
}

/// An owned, tightly packed pixel buffer.
///
/// The shape is fixed at construction, so the byte length always matches
/// `width * height * layout.bytes_per_pixel()`.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    layout: PixelLayout,
}

impl PixelBuffer {
    /// Wrap `pixels`, which must hold exactly `width * height` pixels of `layout`.
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<Self, CodecError> {
        let needed = Self::byte_len(width, height, layout)?;
        if pixels.len() != needed {
            return Err(CodecError::BufferTooSmall {
                needed,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            pixels,
            width,
            height,
            layout,
        })
    }

    /// A zero-filled buffer.
    pub fn zeroed(width: u32, height: u32, layout: PixelLayout) -> Result<Self, CodecError> {
        let len = Self::byte_len(width, height, layout)?;
        Ok(Self {
            pixels: alloc::vec![0; len],
            width,
            height,
            layout,
        })
    }

    /// Required byte length for the given shape, with overflow checking.
    pub fn byte_len(width: u32, height: u32, layout: PixelLayout) -> Result<usize, CodecError> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|wh| wh.checked_mul(layout.bytes_per_pixel()))
            .ok_or(CodecError::DimensionsTooLarge { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Access the pixel data.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.pixels
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.layout.bytes_per_pixel()
    }

    /// One row of pixel bytes, `y` counted from the top.
    ///
    /// Panics if `y >= height()`.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        &self.pixels[y as usize * stride..][..stride]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.stride();
        &mut self.pixels[y as usize * stride..][..stride]
    }

    /// Reinterpret pixel data as typed pixel slice.
    ///
    /// Returns [`CodecError::LayoutMismatch`] if the pixel layout doesn't match `P`.
    #[cfg(feature = "rgb")]
    pub fn as_pixels<P: TypedPixel>(&self) -> Result<&[P], CodecError>
    where
        [u8]: rgb::AsPixels<P>,
    {
        if self.layout != P::layout() {
            return Err(CodecError::LayoutMismatch {
                expected: P::layout(),
                actual: self.layout,
            });
        }
        Ok(self.pixels().as_pixels())
    }

    /// Zero-copy view as an [`imgref::ImgRef`] of typed pixels.
    #[cfg(feature = "imgref")]
    pub fn as_imgref<P: TypedPixel>(&self) -> Result<imgref::ImgRef<'_, P>, CodecError>
    where
        [u8]: rgb::AsPixels<P>,
    {
        let pixels: &[P] = self.as_pixels()?;
        Ok(imgref::ImgRef::new(
            pixels,
            self.width as usize,
            self.height as usize,
        ))
    }

    /// Convert to an [`imgref::ImgVec`] of typed pixels.
    #[cfg(feature = "imgref")]
    pub fn to_imgvec<P: TypedPixel>(&self) -> Result<imgref::ImgVec<P>, CodecError>
    where
        [u8]: rgb::AsPixels<P>,
    {
        let pixels: &[P] = self.as_pixels()?;
        Ok(imgref::ImgVec::new(
            pixels.to_vec(),
            self.width as usize,
            self.height as usize,
        ))
    }
}

/// Typed pixels with a known [`PixelLayout`].
#[cfg(feature = "rgb")]
pub trait TypedPixel: Copy {
    fn layout() -> PixelLayout;
}

#[cfg(feature = "rgb")]
impl TypedPixel for rgb::Gray<u8> {
    fn layout() -> PixelLayout {
        PixelLayout::Gray8
    }
}

#[cfg(feature = "rgb")]
impl TypedPixel for rgb::RGB8 {
    fn layout() -> PixelLayout {
        PixelLayout::Rgb8
    }
}

#[cfg(feature = "rgb")]
impl TypedPixel for rgb::RGBA8 {
    fn layout() -> PixelLayout {
        PixelLayout::Rgba8
    }
}

#[cfg(feature = "rgb")]
impl TypedPixel for rgb::RGBA16 {
    fn layout() -> PixelLayout {
        PixelLayout::Rgba16
    }
}
