//! The per-operation request object.

use alloc::string::String;
use alloc::vec::Vec;
use core::cell::OnceCell;
use std::path::Path;

use crate::error::CodecError;
use crate::library::{FormatId, Mode, ResolveHint};

/// What kind of data the caller expects a request to produce or consume.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Expect {
    /// A single 2D image.
    Image,
    /// A sequence of 2D images.
    MultiImage,
    /// A single volume.
    Volume,
    /// A sequence of volumes.
    MultiVolume,
    /// Something that is not image data at all.
    NonImage,
}

/// One read or write operation.
///
/// Carries the target name (for extension hints), the declared expectation,
/// the encoded input and output bytes, and a per-mode memo of the resolved
/// native format so that every descriptor asked about this request shares a
/// single native resolution.
#[derive(Debug)]
pub struct Request {
    name: String,
    expect: Option<Expect>,
    input: Option<Vec<u8>>,
    output: Option<Vec<u8>>,
    resolved_read: OnceCell<Option<FormatId>>,
    resolved_write: OnceCell<Option<FormatId>>,
}

impl Request {
    fn new(name: impl Into<String>, input: Option<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            expect: None,
            input,
            output: None,
            resolved_read: OnceCell::new(),
            resolved_write: OnceCell::new(),
        }
    }

    /// A read request over in-memory bytes. `name` supplies the extension hint.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, Some(bytes))
    }

    /// A read request over a file, read eagerly.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Ok(Self::new(path.to_string_lossy(), Some(bytes)))
    }

    /// A write request targeting `name`. Encoded output is stored on the request.
    pub fn for_write(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    pub fn with_expect(mut self, expect: Expect) -> Self {
        self.expect = Some(expect);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expect(&self) -> Option<Expect> {
        self.expect
    }

    /// Whether the declared expectation admits plain or multi-frame images.
    pub fn expects_images(&self) -> bool {
        matches!(self.expect, None | Some(Expect::Image) | Some(Expect::MultiImage))
    }

    /// Encoded input bytes.
    pub fn get_bytes(&self) -> Result<&[u8], CodecError> {
        self.input.as_deref().ok_or(CodecError::NoInput)
    }

    /// Store encoded output bytes.
    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.output = Some(bytes);
    }

    pub fn output(&self) -> Option<&[u8]> {
        self.output.as_deref()
    }

    pub fn take_output(&mut self) -> Option<Vec<u8>> {
        self.output.take()
    }

    /// Write the encoded output to `path`.
    pub fn write_output_to(&self, path: impl AsRef<Path>) -> Result<(), CodecError> {
        let bytes = self.output.as_deref().ok_or(CodecError::NoOutput)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// The memoized resolution for `mode`, if one has happened.
    pub fn resolved(&self, mode: Mode) -> Option<Option<FormatId>> {
        self.slot(mode).get().copied()
    }

    /// Resolve once per mode; later calls reuse the first answer.
    pub(crate) fn resolve_with(
        &self,
        mode: Mode,
        resolve: impl FnOnce(&ResolveHint<'_>) -> Option<FormatId>,
    ) -> Option<FormatId> {
        *self.slot(mode).get_or_init(|| {
            let hint = ResolveHint {
                name: &self.name,
                // Content sniffing only makes sense for data we are about to read.
                content: match mode {
                    Mode::Read => self.input.as_deref(),
                    Mode::Write => None,
                },
            };
            resolve(&hint)
        })
    }

    fn slot(&self, mode: Mode) -> &OnceCell<Option<FormatId>> {
        match mode {
            Mode::Read => &self.resolved_read,
            Mode::Write => &self.resolved_write,
        }
    }
}
