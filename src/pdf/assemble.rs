//! Builds a PDF out of images, one page per image.

use crate::error::ApiError;
use image::ImageReader;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::PathBuf;

const OPERATION: &str = "images-to-pdf";

/// Each image becomes a page of the same size in points (72 dpi), in input order.
pub fn images_to_pdf(inputs: &[PathBuf]) -> Result<Document, ApiError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(inputs.len());

    for (index, path) in inputs.iter().enumerate() {
        let image = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| ApiError::conversion(OPERATION, format!("image {}: {e}", index + 1)))?
            .decode()
            .map_err(|e| ApiError::conversion(OPERATION, format!("image {}: {e}", index + 1)))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        let (width, height) = (i64::from(width), i64::from(height));

        let mut pixels = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
            },
            image.into_raw(),
        );
        // Uncompressed RGB is still a valid image stream.
        let _ = pixels.compress();
        let image_id = doc.add_object(pixels);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width.into(),
                        0_i64.into(),
                        0_i64.into(),
                        height.into(),
                        0_i64.into(),
                        0_i64.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| ApiError::conversion(OPERATION, e))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0_i64.into(), 0_i64.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}
