//! Plain-text extraction.
//!
//! `pdf-extract` gives the better reading order, but it works on the whole
//! document and gives up (or panics) on the first page it cannot handle. When
//! that happens we fall back to lopdf page by page, so one bad page costs only
//! its own text.

use super::{open, page_with_inherited, PageReport};
use crate::error::ApiError;
use anyhow::Context;
use lopdf::{Document, Object, ObjectId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

pub struct ExtractedText {
    pub pages: Vec<String>,
    pub report: PageReport,
}

impl ExtractedText {
    /// Page texts, each terminated by a newline.
    pub fn joined(&self) -> String {
        let mut out = String::new();
        for page in &self.pages {
            out.push_str(page);
            if !page.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

pub fn extract(path: &Path) -> Result<ExtractedText, ApiError> {
    let doc = open(path, "extract-text")?;
    let total = doc.get_pages().len();
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;

    match catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(&bytes)
    })) {
        Ok(Ok(pages)) if pages.len() == total => {
            return Ok(ExtractedText {
                pages,
                report: PageReport::default(),
            })
        }
        Ok(Ok(pages)) => tracing::debug!(
            expected = total,
            got = pages.len(),
            "pdf-extract page count mismatch, extracting per page"
        ),
        Ok(Err(e)) => tracing::debug!("pdf-extract failed, extracting per page: {e}"),
        Err(_) => tracing::debug!("pdf-extract panicked, extracting per page"),
    }

    Ok(extract_per_page(&doc))
}

fn extract_per_page(doc: &Document) -> ExtractedText {
    let mut report = PageReport::default();
    let pages = doc.get_pages();

    // lopdf only resolves fonts reachable from the page itself, so inherited
    // resources are copied onto each page before extracting.
    let mut flattened = doc.clone();
    for (&number, &page_id) in &pages {
        match page_with_inherited(doc, page_id) {
            Ok(page) => {
                flattened.objects.insert(page_id, Object::Dictionary(page));
            }
            Err(e) => report.degrade(number, format!("unreadable page: {e}")),
        }
    }

    let pages = pages
        .into_iter()
        .map(|(number, page_id)| {
            match catch_unwind(AssertUnwindSafe(|| flattened.extract_text(&[number]))) {
                Ok(Ok(text)) if text.trim().is_empty() && shows_text(&flattened, page_id) => {
                    report.degrade(number, "text operators decoded to nothing");
                    String::new()
                }
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    report.degrade(number, format!("text extraction failed: {e}"));
                    String::new()
                }
                Err(_) => {
                    report.degrade(number, "text extraction panicked");
                    String::new()
                }
            }
        })
        .collect();

    ExtractedText { pages, report }
}

/// Whether the page's content stream draws any text at all.
fn shows_text(doc: &Document, page_id: ObjectId) -> bool {
    doc.get_and_decode_page_content(page_id)
        .map(|content| {
            content
                .operations
                .iter()
                .any(|op| matches!(op.operator.as_str(), "Tj" | "TJ" | "'" | "\""))
        })
        .unwrap_or(false)
}
