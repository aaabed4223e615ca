use super::blocking;
use crate::config::Settings;
use crate::download::{Download, PDF, ZIP};
use crate::error::ApiError;
use crate::form::Form;
use crate::imaging::{self, ResizeOptions};
use crate::workspace::Workspace;
use crate::{archive, pdf};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use std::path::PathBuf;

pub async fn images_to_pdf(
    settings: web::Data<Settings>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let workspace = Workspace::create(&settings.temp_root)?;
    let form = Form::read(payload, &workspace, settings.max_upload_bytes).await?;
    let inputs: Vec<PathBuf> = form
        .files("files", 1)?
        .iter()
        .map(|upload| upload.path.clone())
        .collect();

    let count = inputs.len();
    let output = workspace.allocate("images_to_pdf.pdf");
    let target = output.clone();
    blocking(move || {
        let mut doc = pdf::assemble::images_to_pdf(&inputs)?;
        pdf::save(&mut doc, &target, "images-to-pdf")
    })
    .await?;

    tracing::info!(request_id = %workspace.id(), operation = "images-to-pdf", images = count, "assembled document");
    Download::new(workspace, output, "images_to_pdf.pdf", PDF)
        .into_response()
        .await
}

/// One image comes back as-is; several are bundled into a zip.
pub async fn resize_compress_image(
    settings: web::Data<Settings>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let workspace = Workspace::create(&settings.temp_root)?;
    let form = Form::read(payload, &workspace, settings.max_upload_bytes).await?;
    let inputs: Vec<(PathBuf, String)> = form
        .files("files", 1)?
        .iter()
        .map(|upload| (upload.path.clone(), upload.filename.clone()))
        .collect();
    let options = ResizeOptions::new(
        form.parse("width")?,
        form.parse("height")?,
        form.parse_or("quality", imaging::DEFAULT_QUALITY)?,
    )?;

    // Same-named uploads must not overwrite each other.
    let out_dirs = inputs
        .iter()
        .map(|_| workspace.subdir("resized"))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let archive_path = workspace.allocate("resized_images.zip");
    let target = archive_path.clone();
    let mut resized = blocking(move || {
        let resized = inputs
            .iter()
            .zip(&out_dirs)
            .map(|((path, name), out_dir)| imaging::resize(path, name, options, out_dir))
            .collect::<Result<Vec<_>, _>>()?;
        if resized.len() > 1 {
            let entries: Vec<(PathBuf, String)> = resized
                .iter()
                .map(|(path, name)| {
                    let entry = name.strip_prefix("resized_").unwrap_or(name);
                    (path.clone(), entry.to_string())
                })
                .collect();
            archive::zip_files(&entries, &target)?;
        }
        Ok(resized)
    })
    .await?;

    tracing::info!(
        request_id = %workspace.id(),
        operation = "resize-compress-image",
        images = resized.len(),
        width = options.width,
        height = options.height,
        "resized images"
    );

    let download = match resized.pop() {
        Some((path, name)) if resized.is_empty() => {
            let content_type = if name.to_lowercase().ends_with(".png") {
                "image/png"
            } else {
                "image/jpeg"
            };
            Download::new(workspace, path, name, content_type)
        }
        _ => Download::new(workspace, archive_path, "resized_images.zip", ZIP),
    };
    download.into_response().await
}
