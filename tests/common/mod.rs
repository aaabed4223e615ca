#![allow(dead_code)]

use actix_web::http::header::CONTENT_TYPE;
use actix_web::test::TestRequest;
use clap::Parser;
use image::{ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use rust_pdf_tools::config::Settings;
use std::ffi::OsString;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

const BOUNDARY: &str = "----rust-pdf-tools-test-boundary";

/// Hand-rolled `multipart/form-data` body.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn pdf(self, name: &str, filename: &str, data: &[u8]) -> Self {
        self.file(name, filename, "application/pdf", data)
    }

    pub fn into_request(mut self, uri: &str) -> TestRequest {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        TestRequest::post()
            .uri(uri)
            .insert_header((
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(self.body)
    }
}

/// Settings pointing at `root`, with converters that cannot be found.
pub fn settings(root: &Path, extra: &[&str]) -> Settings {
    let mut args: Vec<OsString> = vec![
        "rust-pdf-tools".into(),
        "--temp-root".into(),
        root.into(),
        "--soffice-bin".into(),
        "/nonexistent/soffice".into(),
        "--qpdf-bin".into(),
        "/nonexistent/qpdf".into(),
        "--converter-timeout-secs".into(),
        "5".into(),
    ];
    args.extend(extra.iter().map(OsString::from));
    Settings::parse_from(args)
}

/// A PDF with one Helvetica text line per page.
pub fn pdf_bytes(texts: &[&str]) -> Vec<u8> {
    save(&mut pdf_document(texts))
}

/// Like [`pdf_bytes`], but `page` (1-indexed) points at a page tree node that does not exist.
pub fn pdf_bytes_with_broken_page(texts: &[&str], page: u32) -> Vec<u8> {
    let mut doc = pdf_document(texts);
    let page_id = doc.get_pages()[&page];
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .unwrap()
        .set("Parent", (9999, 0));
    save(&mut doc)
}

fn save(doc: &mut Document) -> Vec<u8> {
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn pdf_document(texts: &[&str]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
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
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub fn load_pdf(bytes: &[u8]) -> Document {
    Document::load_mem(bytes).unwrap()
}

pub fn image_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbImage::from_pixel(width, height, Rgb([30, 120, 200]))
        .write_to(&mut out, format)
        .unwrap();
    out.into_inner()
}

/// Every workspace under `root` must be gone once the response has been consumed.
///
/// Removal runs on the blocking pool, so this waits up to two seconds for it.
pub async fn assert_clean(root: &Path) {
    let leftovers = || -> Vec<_> {
        std::fs::read_dir(root)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    };
    for _ in 0..200 {
        if leftovers().is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let leftovers = leftovers();
    assert!(leftovers.is_empty(), "leftover workspaces: {leftovers:?}");
}
