//! Format descriptors, registration and request negotiation.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::capability::CapabilityEntry;
use crate::decode::Reader;
use crate::encode::Writer;
use crate::library::{FormatId, Mode, NativeCodecLibrary};
use crate::request::Request;

/// Prefix marking descriptors backed by the native library.
pub const DESCRIPTION_PREFIX: &str = "FI: ";

/// One native codec, as exposed to the image framework.
///
/// Cheap to clone; clones share the capability entry and library.
#[derive(Clone)]
pub struct FormatDescriptor {
    entry: Arc<CapabilityEntry>,
    description: Arc<str>,
    library: Arc<dyn NativeCodecLibrary>,
}

impl FormatDescriptor {
    pub fn new(entry: CapabilityEntry, library: Arc<dyn NativeCodecLibrary>) -> Self {
        let description = alloc::format!("{DESCRIPTION_PREFIX}{}", entry.description);
        Self {
            entry: Arc::new(entry),
            description: description.into(),
            library,
        }
    }

    pub fn name(&self) -> &str {
        &self.entry.short_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn extensions(&self) -> &[String] {
        &self.entry.extensions
    }

    pub fn format_id(&self) -> FormatId {
        self.entry.format_id
    }

    pub fn capability(&self) -> &CapabilityEntry {
        &self.entry
    }

    pub(crate) fn library(&self) -> &dyn NativeCodecLibrary {
        &*self.library
    }

    /// Whether this format should read `request`.
    pub fn can_read(&self, request: &Request) -> bool {
        self.negotiate(request, Mode::Read)
    }

    /// Whether this format should write `request`.
    pub fn can_save(&self, request: &Request) -> bool {
        self.negotiate(request, Mode::Write)
    }

    /// Claim only on an exact match with the library's own resolution, so
    /// other format families keep priority when the answer is unclear.
    fn negotiate(&self, request: &Request, mode: Mode) -> bool {
        if !self.library.is_loaded() || !request.expects_images() {
            return false;
        }
        let resolved = request.resolve_with(mode, |hint| {
            let id = self.library.resolve_format(hint, mode);
            log::trace!("resolved {:?} for {mode:?} to {id:?}", hint.name);
            id
        });
        resolved == Some(self.entry.format_id)
    }

    /// Reader bound to this format.
    pub fn reader(&self) -> Reader<'_> {
        Reader::new(self)
    }

    /// Writer bound to this format.
    pub fn writer(&self) -> Writer<'_> {
        Writer::new(self)
    }
}

impl fmt::Debug for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatDescriptor")
            .field("name", &self.entry.short_name)
            .field("format_id", &self.entry.format_id)
            .field("extensions", &self.entry.extensions)
            .finish_non_exhaustive()
    }
}

/// Destination for descriptors, owned by the image framework.
pub trait FormatRegistry {
    fn register(&mut self, descriptor: FormatDescriptor);
}

/// Build one descriptor per entry and register each exactly once.
pub fn build_descriptors(
    entries: Vec<CapabilityEntry>,
    library: &Arc<dyn NativeCodecLibrary>,
    registry: &mut dyn FormatRegistry,
) -> Vec<FormatDescriptor> {
    let mut built: Vec<FormatDescriptor> = Vec::with_capacity(entries.len());
    for entry in entries {
        debug_assert!(
            built.iter().all(|d| d.format_id() != entry.format_id),
            "format {} discovered twice",
            entry.format_id
        );
        let descriptor = FormatDescriptor::new(entry, Arc::clone(library));
        log::debug!(
            "registering {} ({}) as {}",
            descriptor.name(),
            descriptor.format_id(),
            descriptor.description()
        );
        registry.register(descriptor.clone());
        built.push(descriptor);
    }
    built
}

/// A simple ordered registry of native formats.
#[derive(Clone, Debug, Default)]
pub struct Formats {
    descriptors: Vec<FormatDescriptor>,
}

impl FormatRegistry for Formats {
    fn register(&mut self, descriptor: FormatDescriptor) {
        self.descriptors.push(descriptor);
    }
}

impl Formats {
    /// Discover `library`'s format table and register a descriptor per codec.
    pub fn discover(library: Arc<dyn NativeCodecLibrary>) -> Self {
        let entries = crate::capability::discover(&*library);
        let mut formats = Formats::default();
        build_descriptors(entries, &library, &mut formats);
        formats
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormatDescriptor> {
        self.descriptors.iter()
    }

    /// Look up by short name, case-insensitively.
    pub fn by_name(&self, name: &str) -> Option<&FormatDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
    }

    pub fn by_format_id(&self, id: FormatId) -> Option<&FormatDescriptor> {
        self.descriptors.iter().find(|d| d.format_id() == id)
    }

    /// First descriptor that claims `request` for reading.
    pub fn find_reader(&self, request: &Request) -> Option<&FormatDescriptor> {
        self.descriptors.iter().find(|d| d.can_read(request))
    }

    /// First descriptor that claims `request` for writing.
    pub fn find_writer(&self, request: &Request) -> Option<&FormatDescriptor> {
        self.descriptors.iter().find(|d| d.can_save(request))
    }
}
