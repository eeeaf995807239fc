//! Conversion between FreeImage tag payloads and [`MetaValue`].

use alloc::string::String;
use alloc::vec::Vec;
use core::ffi::c_int;

use super::ffi;
use crate::metadata::MetaValue;

pub(crate) fn model_id(name: &str) -> Option<c_int> {
    ffi::METADATA_MODELS
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|&(id, _)| id)
}

/// Decode a tag payload of `length` bytes holding `count` values.
pub(crate) fn decode_value(type_id: u16, count: u32, bytes: &[u8]) -> MetaValue {
    match type_id {
        ffi::FIDT_ASCII => {
            let text = match bytes.iter().position(|&b| b == 0) {
                Some(nul) => &bytes[..nul],
                None => bytes,
            };
            MetaValue::Text(String::from_utf8_lossy(text).into_owned())
        }
        ffi::FIDT_BYTE | ffi::FIDT_UNDEFINED => MetaValue::Bytes(bytes.to_vec()),
        ffi::FIDT_SHORT => MetaValue::U16(chunks(bytes, u16::from_ne_bytes)),
        ffi::FIDT_LONG | ffi::FIDT_IFD => MetaValue::U32(chunks(bytes, u32::from_ne_bytes)),
        ffi::FIDT_SLONG => MetaValue::I32(chunks(bytes, i32::from_ne_bytes)),
        ffi::FIDT_RATIONAL => {
            let words: Vec<u32> = chunks(bytes, u32::from_ne_bytes);
            MetaValue::Rational(words.chunks_exact(2).map(|p| (p[0], p[1])).collect())
        }
        ffi::FIDT_SRATIONAL => {
            let words: Vec<i32> = chunks(bytes, i32::from_ne_bytes);
            MetaValue::SignedRational(words.chunks_exact(2).map(|p| (p[0], p[1])).collect())
        }
        ffi::FIDT_FLOAT => MetaValue::F32(chunks(bytes, f32::from_ne_bytes)),
        ffi::FIDT_DOUBLE => MetaValue::F64(chunks(bytes, f64::from_ne_bytes)),
        _ => MetaValue::Raw {
            type_id,
            count,
            bytes: bytes.to_vec(),
        },
    }
}

/// Encode a value as (type, count, payload).
pub(crate) fn encode_value(value: &MetaValue) -> (u16, u32, Vec<u8>) {
    match value {
        MetaValue::Text(s) => {
            let mut bytes: Vec<u8> = s.bytes().filter(|&b| b != 0).collect();
            bytes.push(0);
            (ffi::FIDT_ASCII, bytes.len() as u32, bytes)
        }
        MetaValue::Bytes(b) => (ffi::FIDT_UNDEFINED, b.len() as u32, b.clone()),
        MetaValue::U16(v) => (
            ffi::FIDT_SHORT,
            v.len() as u32,
            v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
        ),
        MetaValue::U32(v) => (
            ffi::FIDT_LONG,
            v.len() as u32,
            v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
        ),
        MetaValue::I32(v) => (
            ffi::FIDT_SLONG,
            v.len() as u32,
            v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
        ),
        MetaValue::Rational(v) => (
            ffi::FIDT_RATIONAL,
            v.len() as u32,
            v.iter()
                .flat_map(|&(n, d)| [n.to_ne_bytes(), d.to_ne_bytes()])
                .flatten()
                .collect(),
        ),
        MetaValue::SignedRational(v) => (
            ffi::FIDT_SRATIONAL,
            v.len() as u32,
            v.iter()
                .flat_map(|&(n, d)| [n.to_ne_bytes(), d.to_ne_bytes()])
                .flatten()
                .collect(),
        ),
        MetaValue::F32(v) => (
            ffi::FIDT_FLOAT,
            v.len() as u32,
            v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
        ),
        MetaValue::F64(v) => (
            ffi::FIDT_DOUBLE,
            v.len() as u32,
            v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
        ),
        MetaValue::Raw {
            type_id,
            count,
            bytes,
        } => (*type_id, *count, bytes.clone()),
    }
}

fn chunks<T, const N: usize>(bytes: &[u8], from: fn([u8; N]) -> T) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .map(|c| {
            let mut arr = [0u8; N];
            arr.copy_from_slice(c);
            from(arr)
        })
        .collect()
}
