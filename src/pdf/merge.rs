use super::{open, page_with_inherited};
use crate::error::ApiError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::PathBuf;

const OPERATION: &str = "merge";

/// Concatenates the given PDFs, pages in input order.
pub fn merge(inputs: &[PathBuf]) -> Result<Document, ApiError> {
    let mut max_id: u32 = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for (index, path) in inputs.iter().enumerate() {
        let mut doc = open(path, OPERATION)?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for page_id in doc.get_pages().into_values() {
            let page = page_with_inherited(&doc, page_id).map_err(|e| {
                ApiError::conversion(OPERATION, format!("file {}: broken page: {e}", index + 1))
            })?;
            pages.push((page_id, page));
        }

        for (object_id, object) in doc.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    objects.insert(object_id, object);
                }
            }
        }
    }

    if pages.is_empty() {
        return Err(ApiError::conversion(OPERATION, "inputs contain no pages"));
    }

    let mut document = Document::with_version("1.5");
    document.objects = objects;
    document.max_id = max_id;

    let pages_id = document.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());
    for (page_id, mut page) in pages {
        page.set("Parent", pages_id);
        document.objects.insert(page_id, Object::Dictionary(page));
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    document.renumber_objects();
    document.compress();

    tracing::debug!(inputs = inputs.len(), pages = count, "merged documents");
    Ok(document)
}
