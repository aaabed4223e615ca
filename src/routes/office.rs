use crate::config::Settings;
use crate::download::{Download, DOCX, PDF};
use crate::error::ApiError;
use crate::external::{self, OfficeTarget};
use crate::form::Form;
use crate::workspace::Workspace;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};

pub async fn pdf_to_word(
    settings: web::Data<Settings>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    convert(&settings, payload, external::PDF_TO_WORD, "converted.docx", DOCX).await
}

pub async fn word_to_pdf(
    settings: web::Data<Settings>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    convert(&settings, payload, external::WORD_TO_PDF, "converted.pdf", PDF).await
}

pub async fn ppt_to_pdf(
    settings: web::Data<Settings>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    convert(&settings, payload, external::PPT_TO_PDF, "converted.pdf", PDF).await
}

async fn convert(
    settings: &Settings,
    payload: Multipart,
    target: OfficeTarget,
    filename: &'static str,
    content_type: &'static str,
) -> Result<HttpResponse, ApiError> {
    let workspace = Workspace::create(&settings.temp_root)?;
    let form = Form::read(payload, &workspace, settings.max_upload_bytes).await?;
    let input = form.file("file")?.path.clone();

    let output = external::office_convert(settings, &workspace, &input, target).await?;

    tracing::info!(request_id = %workspace.id(), operation = target.operation, "converted document");
    Download::new(workspace, output, filename, content_type)
        .into_response()
        .await
}
