mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web};
use common::{assert_clean, pdf_bytes, settings, MultipartBody};
use rust_pdf_tools::app;
use rust_pdf_tools::error::ErrorBody;

#[actix_web::test]
async fn missing_office_suite_fails_cleanly() {
    let root = tempfile::tempdir().unwrap();
    let app = test::init_service(app(web::Data::new(settings(root.path(), &[])))).await;

    let cases = [
        ("/word-to-pdf", "report.docx", b"PK\x03\x04 not really".to_vec()),
        ("/ppt-to-pdf", "deck.pptx", b"PK\x03\x04 not really".to_vec()),
        ("/pdf-to-word", "doc.pdf", pdf_bytes(&["hello"])),
    ];

    for (uri, filename, data) in cases {
        let req = MultipartBody::new()
            .file("file", filename, "application/octet-stream", &data)
            .into_request(uri)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "conversion_failed", "{uri}");
        assert!(body.details.unwrap().contains("/nonexistent/soffice"));
    }

    assert_clean(root.path()).await;
}

#[actix_web::test]
async fn office_routes_require_a_file() {
    let root = tempfile::tempdir().unwrap();
    let app = test::init_service(app(web::Data::new(settings(root.path(), &[])))).await;

    let req = MultipartBody::new()
        .text("file", "not a file")
        .into_request("/word-to-pdf")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(body.error, "missing_field");

    assert_clean(root.path()).await;
}
