use super::open;
use crate::error::ApiError;
use lopdf::{Dictionary, Document, Object};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct DocumentInfo {
    pub filename: String,
    pub pages: usize,
    pub metadata: BTreeMap<String, String>,
}

pub fn inspect(path: &Path, filename: &str) -> Result<DocumentInfo, ApiError> {
    let doc = open(path, "metadata")?;

    let metadata = info_dictionary(&doc)
        .map(|info| {
            info.iter()
                .filter_map(|(key, value)| {
                    let value = display_value(&doc, value, 0)?;
                    Some((String::from_utf8_lossy(key).into_owned(), value))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(DocumentInfo {
        filename: filename.to_string(),
        pages: doc.get_pages().len(),
        metadata,
    })
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Flattens a metadata value to a string. Nested dictionaries and streams are skipped.
fn display_value(doc: &Document, value: &Object, depth: u8) -> Option<String> {
    match value {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        Object::Integer(i) => Some(i.to_string()),
        Object::Real(r) => Some(r.to_string()),
        Object::Boolean(b) => Some(b.to_string()),
        Object::Array(items) if depth < 4 => Some(
            items
                .iter()
                .filter_map(|item| display_value(doc, item, depth + 1))
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Object::Reference(id) if depth < 4 => {
            display_value(doc, doc.get_object(*id).ok()?, depth + 1)
        }
        _ => None,
    }
}

/// PDF text strings are UTF-16BE with a byte order mark, or PDFDocEncoding.
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        // PDFDocEncoding matches Latin-1 for the printable range.
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
