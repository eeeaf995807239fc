use enough::Stop;

use crate::error::CodecError;
use crate::format::FormatDescriptor;
use crate::library::Flags;
use crate::limits::Limits;
use crate::metadata::Metadata;
use crate::pixel::PixelBuffer;
use crate::request::Request;
use crate::session::BitmapSession;

/// Decoded pixels plus the metadata found alongside them.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedImage {
    pub pixels: PixelBuffer,
    pub meta: Metadata,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Decodes requests with one native format.
///
/// Every call opens its own [`BitmapSession`], which is closed before the
/// call returns on every path.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    descriptor: &'a FormatDescriptor,
    flags: Flags,
    limits: Option<&'a Limits>,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(descriptor: &'a FormatDescriptor) -> Self {
        Self {
            descriptor,
            flags: Flags::default(),
            limits: None,
        }
    }

    /// Native load flags, forwarded verbatim.
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

    /// Decode the request's bytes to pixels and metadata.
    pub fn read_pixels(
        &self,
        request: &Request,
        stop: impl Stop,
    ) -> Result<DecodedImage, CodecError> {
        let mut session = self.load(request, &stop)?;
        let pixels = session.read_image_data()?;
        let meta = session.read_meta_data()?;
        session.close();
        Ok(DecodedImage { pixels, meta })
    }

    /// Read only the metadata.
    ///
    /// Still performs a full decode; loading header-only is a possible
    /// optimization the native call path does not use yet.
    pub fn read_info(&self, request: &Request, stop: impl Stop) -> Result<Metadata, CodecError> {
        let mut session = self.load(request, &stop)?;
        let meta = session.read_meta_data()?;
        session.close();
        Ok(meta)
    }

    fn load(&self, request: &Request, stop: &dyn Stop) -> Result<BitmapSession<'a>, CodecError> {
        let data = request.get_bytes()?;
        stop.check()?;
        let mut session = BitmapSession::open(
            self.descriptor.library(),
            request.name(),
            self.descriptor.format_id(),
            self.flags,
        )?;
        session.load_from_bytes(data)?;
        if let Some(limits) = self.limits {
            let info = session.info()?;
            limits.check_bitmap(info.width, info.height, info.layout)?;
        }
        stop.check()?;
        Ok(session)
    }
}
