//! PDF operations built on `lopdf`.
//!
//! Everything here is synchronous and CPU-bound; the routes run it on the
//! blocking pool.

pub mod assemble;
pub mod merge;
pub mod metadata;
pub mod pages;
pub mod security;
pub mod text;

use crate::error::ApiError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Loads a PDF, rejecting documents that are still locked after loading.
pub fn open(path: &Path, operation: &'static str) -> Result<Document, ApiError> {
    let doc = open_any(path, operation)?;
    if doc.is_encrypted() {
        return Err(ApiError::DocumentEncrypted);
    }
    Ok(doc)
}

/// Loads a PDF without looking at its encryption state.
pub fn open_any(path: &Path, operation: &'static str) -> Result<Document, ApiError> {
    Document::load(path).map_err(|e| ApiError::conversion(operation, format!("unreadable PDF: {e}")))
}

pub fn save(doc: &mut Document, path: &Path, operation: &'static str) -> Result<(), ApiError> {
    doc.save(path)
        .map(|_| ())
        .map_err(|e| ApiError::conversion(operation, format!("writing PDF: {e}")))
}

/// Page dictionary with inherited attributes copied in from the page tree.
pub fn page_with_inherited(doc: &Document, page_id: ObjectId) -> lopdf::Result<Dictionary> {
    let mut page = doc.get_dictionary(page_id)?.clone();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(node_id) = parent {
        // Malformed files can contain cycles in the page tree.
        depth += 1;
        if depth > 64 {
            break;
        }
        let node = doc.get_dictionary(node_id)?;
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key, value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    Ok(page)
}

/// Outcome of a multi-page operation that degrades page by page instead of aborting.
#[derive(Debug, Default)]
pub struct PageReport {
    degraded: Vec<(u32, String)>,
}

impl PageReport {
    pub fn degrade(&mut self, page: u32, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(page, "page degraded: {reason}");
        self.degraded.push((page, reason));
    }

    /// 1-indexed numbers of the degraded pages, in document order.
    pub fn pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.degraded.iter().map(|(page, _)| *page).collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }

    pub fn is_clean(&self) -> bool {
        self.degraded.is_empty()
    }
}
