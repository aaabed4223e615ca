use super::blocking;
use crate::config::Settings;
use crate::download::{Download, PDF, TEXT, ZIP};
use crate::error::ApiError;
use crate::form::Form;
use crate::workspace::Workspace;
use crate::{archive, external, pdf, raster};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use anyhow::Context;
use std::path::PathBuf;

pub async fn merge(
    settings: web::Data<Settings>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let workspace = Workspace::create(&settings.temp_root)?;
    let form = Form::read(payload, &workspace, settings.max_upload_bytes).await?;
    let inputs: Vec<PathBuf> = form
        .files("files", 2)?
        .iter()
        .map(|upload| upload.path.clone())
        .collect();

    let count = inputs.len();
    let output = workspace.allocate("merged.pdf");
    let target = output.clone();
    blocking(move || {
        let mut doc = pdf::merge::merge(&inputs)?;
        pdf::save(&mut doc, &target, "merge")
    })
    .await?;

    tracing::info!(request_id = %workspace.id(), operation = "merge", files = count, "merged documents");
    Download::new(workspace, output, "merged.pdf", PDF)
        .into_response()
        .await
}

pub async fn split(
    settings: web::Data<Settings>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let workspace = Workspace::create(&settings.temp_root)?;
    let form = Form::read(payload, &workspace, settings.max_upload_bytes).await?;
    let input = form.file("file")?.path.clone();
    let start: i64 = form.parse("start")?;
    let end: i64 = form.parse("end")?;

    let output = workspace.allocate("split.pdf");
    let target = output.clone();
    blocking(move || {
        let mut doc = pdf::pages::split(&input, start, end)?;
        pdf::save(&mut doc, &target, "split")
    })
    .await?;

    tracing::info!(request_id = %workspace.id(), operation = "split", start, end, "split document");
    Download::new(workspace, output, "split.pdf", PDF)
        .into_response()
        .await
}

pub async fn rotate(
    settings: web::Data<Settings>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let workspace = Workspace::create(&settings.temp_root)?;
    let form = Form::read(payload, &workspace, settings.max_upload_bytes).await?;
    let input = form.file("file")?.path.clone();
    let angle = pdf::pages::validate_angle(form.parse("angle")?)?;

    let output = workspace.allocate("rotated.pdf");
    let target = output.clone();
    let report = blocking(move || {
        let (mut doc, report) = pdf::pages::rotate(&input, angle)?;
        pdf::save(&mut doc, &target, "rotate")?;
        Ok(report)
    })
    .await?;

    if !report.is_clean() {
        tracing::warn!(
            request_id = %workspace.id(),
            operation = "rotate",
            pages = ?report.pages(),
            "completed with degraded pages"
        );
    }
    tracing::info!(request_id = %workspace.id(), operation = "rotate", angle, "rotated document");
    Download::new(workspace, output, "rotated.pdf", PDF)
        .with_degraded_pages(report.pages())
        .into_response()
        .await
}

pub async fn add_password(
    settings: web::Data<Settings>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let workspace = Workspace::create(&settings.temp_root)?;
    let form = Form::read(payload, &workspace, settings.max_upload_bytes).await?;
    let input = form.file("file")?.path.clone();
    let password = form.password("password")?.to_string();

    let output = workspace.allocate("protected.pdf");
    let target = output.clone();
    blocking(move || {
        let mut doc = pdf::security::protect(&input, &password)?;
        pdf::save(&mut doc, &target, "add-password")
    })
    .await?;

    tracing::info!(request_id = %workspace.id(), operation = "add-password", "protected document");
    Download::new(workspace, output, "protected.pdf", PDF)
        .into_response()
        .await
}

/// lopdf first; anything but a wrong password is retried with qpdf.
pub async fn unlock(
    settings: web::Data<Settings>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let workspace = Workspace::create(&settings.temp_root)?;
    let form = Form::read(payload, &workspace, settings.max_upload_bytes).await?;
    let upload = form.file("file")?;
    let input = upload.path.clone();
    let filename = format!("unlocked_{}", upload.filename);
    let password = form.password("password")?.to_string();

    let output = workspace.allocate("unlocked.pdf");
    let primary = {
        let (input, password, target) = (input.clone(), password.clone(), output.clone());
        blocking(move || {
            let mut doc = pdf::security::unlock(&input, &password)?;
            pdf::save(&mut doc, &target, "unlock")
        })
        .await
    };

    let output = match primary {
        Ok(()) => output,
        Err(ApiError::WrongPassword) => return Err(ApiError::WrongPassword),
        Err(primary) => {
            tracing::warn!(
                request_id = %workspace.id(),
                "in-process unlock failed, retrying with qpdf: {primary}"
            );
            match external::qpdf_decrypt(&settings, &workspace, &input, &password).await {
                Ok(path) => path,
                Err(ApiError::UnlockFailed { detail }) => {
                    return Err(ApiError::UnlockFailed {
                        detail: format!("{primary}; {detail}"),
                    })
                }
                Err(err) => return Err(err),
            }
        }
    };

    tracing::info!(request_id = %workspace.id(), operation = "unlock", "unlocked document");
    Download::new(workspace, output, filename, PDF)
        .into_response()
        .await
}

pub async fn extract_text(
    settings: web::Data<Settings>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let workspace = Workspace::create(&settings.temp_root)?;
    let form = Form::read(payload, &workspace, settings.max_upload_bytes).await?;
    let input = form.file("file")?.path.clone();

    let output = workspace.allocate("extracted_text.txt");
    let target = output.clone();
    let report = blocking(move || {
        let text = pdf::text::extract(&input)?;
        std::fs::write(&target, text.joined())
            .with_context(|| format!("writing {}", target.display()))?;
        Ok(text.report)
    })
    .await?;

    if !report.is_clean() {
        tracing::warn!(
            request_id = %workspace.id(),
            operation = "extract-text",
            pages = ?report.pages(),
            "completed with degraded pages"
        );
    }
    tracing::info!(request_id = %workspace.id(), operation = "extract-text", "extracted text");
    Download::new(workspace, output, "extracted_text.txt", TEXT)
        .with_degraded_pages(report.pages())
        .into_response()
        .await
}

pub async fn pdf_to_images(
    settings: web::Data<Settings>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let workspace = Workspace::create(&settings.temp_root)?;
    let form = Form::read(payload, &workspace, settings.max_upload_bytes).await?;
    let input = form.file("file")?.path.clone();
    let dpi = raster::validate_dpi(
        form.parse_or("dpi", raster::DEFAULT_DPI)?,
        settings.max_dpi,
    )?;

    let pages_dir = workspace.subdir("pages")?;
    let output = workspace.allocate("pdf_images.zip");
    let target = output.clone();
    let lib_dir = settings.pdfium_lib_path.clone();
    let pages = blocking(move || {
        let pages = raster::render_pages(&input, &pages_dir, dpi, lib_dir.as_deref())?;
        let entries: Vec<(PathBuf, String)> = pages
            .iter()
            .enumerate()
            .map(|(index, path)| (path.clone(), format!("page_{}.png", index + 1)))
            .collect();
        archive::zip_files(&entries, &target)?;
        Ok(pages.len())
    })
    .await?;

    tracing::info!(request_id = %workspace.id(), operation = "pdf-to-images", pages, dpi, "rasterised document");
    Download::new(workspace, output, "pdf_images.zip", ZIP)
        .into_response()
        .await
}

pub async fn metadata(
    settings: web::Data<Settings>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let workspace = Workspace::create(&settings.temp_root)?;
    let form = Form::read(payload, &workspace, settings.max_upload_bytes).await?;
    let upload = form.file("file")?;
    let input = upload.path.clone();
    let filename = upload.filename.clone();

    let info = blocking(move || pdf::metadata::inspect(&input, &filename)).await?;

    tracing::info!(request_id = %workspace.id(), operation = "metadata", pages = info.pages, "inspected document");
    Ok(HttpResponse::Ok().json(info))
}
