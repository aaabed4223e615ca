//! HTTP surface: one handler per conversion plus health and a landing page.

mod images;
mod office;
mod pdf;

use crate::error::ApiError;
use actix_web::{web, HttpResponse, Responder};

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/health", web::get().to(health))
        .route("/merge", web::post().to(pdf::merge))
        .route("/split", web::post().to(pdf::split))
        .route("/rotate", web::post().to(pdf::rotate))
        .route("/add-password", web::post().to(pdf::add_password))
        .route("/unlock", web::post().to(pdf::unlock))
        .route("/extract-text", web::post().to(pdf::extract_text))
        .route("/pdf-to-images", web::post().to(pdf::pdf_to_images))
        .route("/metadata", web::post().to(pdf::metadata))
        .route("/images-to-pdf", web::post().to(images::images_to_pdf))
        .route(
            "/resize-compress-image",
            web::post().to(images::resize_compress_image),
        )
        .route("/pdf-to-word", web::post().to(office::pdf_to_word))
        .route("/word-to-pdf", web::post().to(office::word_to_pdf))
        .route("/ppt-to-pdf", web::post().to(office::ppt_to_pdf));
}

async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Runs CPU-bound work on the blocking pool. A panic becomes an unexpected error.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let span = tracing::Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(work)).await?
}
