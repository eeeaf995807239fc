//! Codec capability table discovery.

use alloc::string::String;
use alloc::vec::Vec;

use crate::library::{FormatId, NativeCodecLibrary};

/// One enabled codec reported by the native library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilityEntry {
    pub format_id: FormatId,
    pub short_name: String,
    pub description: String,
    /// Lowercase extensions without the leading dot, in library order.
    pub extensions: Vec<String>,
}

/// Enumerate the native format table.
///
/// Disabled plugin slots are skipped. An unloaded library yields an empty
/// table.
pub fn discover(library: &dyn NativeCodecLibrary) -> Vec<CapabilityEntry> {
    if !library.is_loaded() {
        log::warn!("native codec library not loaded; no formats discovered");
        return Vec::new();
    }

    let count = library.format_count();
    let mut entries = Vec::with_capacity(count);
    for index in 0..count {
        if !library.is_enabled(index) {
            log::debug!("format slot {index} disabled, skipping");
            continue;
        }
        let Some(short_name) = library.name_of(index).and_then(|b| decode_ascii(&b)) else {
            log::warn!("format slot {index} has no readable name, skipping");
            continue;
        };
        let description = library
            .description_of(index)
            .and_then(|b| decode_ascii(&b))
            .unwrap_or_default();
        let extensions = library
            .extensions_of(index)
            .and_then(|b| decode_ascii(&b))
            .map(|list| parse_extensions(&list))
            .unwrap_or_default();
        entries.push(CapabilityEntry {
            format_id: FormatId::from_index(index),
            short_name,
            description,
            extensions,
        });
    }
    log::info!("discovered {} of {count} native formats", entries.len());
    entries
}

fn decode_ascii(bytes: &[u8]) -> Option<String> {
    let bytes = match bytes.iter().position(|&b| b == 0) {
        Some(nul) => &bytes[..nul],
        None => bytes,
    };
    if !bytes.is_ascii() {
        return None;
    }
    // ASCII is valid UTF-8
    String::from_utf8(bytes.to_vec()).ok()
}

/// Split a native `"jpg,jif,jpeg"` style list into normalized extensions.
pub(crate) fn parse_extensions(list: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ext in list.split([',', ';', ' ']) {
        let ext = ext.trim().trim_start_matches("*.").trim_start_matches('.');
        if ext.is_empty() {
            continue;
        }
        let ext = ext.to_ascii_lowercase();
        if !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}
