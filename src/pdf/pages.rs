//! Page-level operations: extracting a range and rotating.

use super::{open, page_with_inherited, PageReport};
use crate::error::ApiError;
use lopdf::{Document, Object};
use std::path::Path;

/// Keeps pages `start..=end` (1-indexed) and drops the rest.
pub fn split(path: &Path, start: i64, end: i64) -> Result<Document, ApiError> {
    let mut doc = open(path, "split")?;
    let total = doc.get_pages().len();

    if start < 1 || end < start || end > total as i64 {
        return Err(ApiError::InvalidPageRange { start, end, total });
    }

    let (start, end) = (start as u32, end as u32);
    let dropped: Vec<u32> = (1..=total as u32)
        .filter(|page| *page < start || *page > end)
        .collect();
    doc.delete_pages(&dropped);
    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();

    Ok(doc)
}

/// Rotation angles must land on a quarter turn. Returns the angle reduced into `0..360`.
pub fn validate_angle(angle: i64) -> Result<i64, ApiError> {
    if angle % 90 != 0 {
        return Err(ApiError::invalid("angle", "must be a multiple of 90"));
    }
    Ok(angle.rem_euclid(360))
}

/// Adds `angle` degrees to every page's rotation.
///
/// A page whose rotation cannot be updated is left as it was and reported.
pub fn rotate(path: &Path, angle: i64) -> Result<(Document, PageReport), ApiError> {
    let mut doc = open(path, "rotate")?;
    let report = rotate_pages(&mut doc, angle);
    Ok((doc, report))
}

fn rotate_pages(doc: &mut Document, angle: i64) -> PageReport {
    let mut report = PageReport::default();

    for (number, page_id) in doc.get_pages() {
        let current = match page_with_inherited(doc, page_id) {
            Ok(page) => page
                .get(b"Rotate")
                .and_then(Object::as_i64)
                .unwrap_or(0),
            Err(e) => {
                report.degrade(number, format!("unreadable page: {e}"));
                continue;
            }
        };

        match doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            Ok(page) => page.set(
                "Rotate",
                (current.rem_euclid(360) + angle.rem_euclid(360)).rem_euclid(360),
            ),
            Err(e) => report.degrade(number, format!("cannot rotate: {e}")),
        }
    }

    report
}

/// Effective rotation of every page, in page order.
pub fn rotations(doc: &Document) -> Vec<i64> {
    doc.get_pages()
        .into_values()
        .map(|id| {
            page_with_inherited(doc, id)
                .ok()
                .and_then(|page| page.get(b"Rotate").and_then(Object::as_i64).ok())
                .unwrap_or(0)
        })
        .collect()
}
