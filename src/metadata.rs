//! Per-image metadata attached to decoded and encodable images.
//!
//! Native libraries group tags into models (EXIF, IPTC, XMP, comments, ...).
//! [`Metadata`] keeps that grouping: each entry is addressed by
//! `(model, key)`. Ordering is by model then key and carries no meaning.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// A metadata tag value.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum MetaValue {
    Text(String),
    Bytes(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    /// Unsigned numerator/denominator pairs.
    Rational(Vec<(u32, u32)>),
    /// Signed numerator/denominator pairs.
    SignedRational(Vec<(i32, i32)>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    /// A value whose native type has no dedicated variant, kept verbatim.
    Raw { type_id: u16, count: u32, bytes: Vec<u8> },
}

impl MetaValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.into())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

/// Metadata mapping of `(model, key)` to value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    models: BTreeMap<String, BTreeMap<String, MetaValue>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value for the same model and key.
    pub fn insert(
        &mut self,
        model: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<MetaValue>,
    ) -> Option<MetaValue> {
        self.models
            .entry(model.into())
            .or_default()
            .insert(key.into(), value.into())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(
        mut self,
        model: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<MetaValue>,
    ) -> Self {
        self.insert(model, key, value);
        self
    }

    pub fn get(&self, model: &str, key: &str) -> Option<&MetaValue> {
        self.models.get(model)?.get(key)
    }

    /// All tags of one model.
    pub fn model(&self, model: &str) -> Option<&BTreeMap<String, MetaValue>> {
        self.models.get(model)
    }

    /// Model names present.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Iterate `(model, key, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &MetaValue)> {
        self.models.iter().flat_map(|(model, tags)| {
            tags.iter()
                .map(move |(key, value)| (model.as_str(), key.as_str(), value))
        })
    }

    /// Number of tags across all models.
    pub fn len(&self) -> usize {
        self.models.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge `other` into `self`; entries from `other` win.
    pub fn extend(&mut self, other: Metadata) {
        for (model, tags) in other.models {
            self.models.entry(model).or_default().extend(tags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouped_by_model() {
        let meta = Metadata::new()
            .with("EXIF_MAIN", "Make", "Acme")
            .with("EXIF_MAIN", "Model", "X1")
            .with("COMMENTS", "Comment", "hello");
        assert_eq!(meta.len(), 3);
        assert_eq!(meta.get("EXIF_MAIN", "Make").and_then(MetaValue::as_text), Some("Acme"));
        assert!(meta.get("COMMENTS", "Make").is_none());
        assert_eq!(meta.models().collect::<Vec<_>>(), ["COMMENTS", "EXIF_MAIN"]);
    }

    #[test]
    fn insert_replaces() {
        let mut meta = Metadata::new();
        assert!(meta.insert("XMP", "XMLPacket", "a").is_none());
        assert_eq!(meta.insert("XMP", "XMLPacket", "b"), Some(MetaValue::from("a")));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn extend_merges_models() {
        let mut a = Metadata::new().with("IPTC", "City", "Oslo");
        let b = Metadata::new()
            .with("IPTC", "City", "Bergen")
            .with("IPTC", "Country", "NO");
        a.extend(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.get("IPTC", "City"), Some(&MetaValue::from("Bergen")));
    }
}
