//! PDF rasterisation through pdfium.
//!
//! pdfium keeps thread-local state, so this only ever runs inside
//! `spawn_blocking`, binding the library fresh for each request.

use crate::error::ApiError;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};

const OPERATION: &str = "pdf-to-images";

pub const DEFAULT_DPI: u32 = 200;

/// PDF user space is 72 units per inch.
const POINTS_PER_INCH: f32 = 72.0;

pub fn validate_dpi(dpi: u32, max_dpi: u32) -> Result<u32, ApiError> {
    if dpi == 0 || dpi > max_dpi {
        return Err(ApiError::invalid("dpi", format!("must be between 1 and {max_dpi}")));
    }
    Ok(dpi)
}

fn bind(lib_dir: Option<&Path>) -> Result<Pdfium, ApiError> {
    let bindings = match lib_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            .or_else(|_| Pdfium::bind_to_system_library()),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ApiError::conversion(OPERATION, format!("pdfium unavailable: {e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Renders every page to `out_dir/page_<n>.png` and returns the paths in page order.
pub fn render_pages(
    pdf_path: &Path,
    out_dir: &Path,
    dpi: u32,
    lib_dir: Option<&Path>,
) -> Result<Vec<PathBuf>, ApiError> {
    let pdfium = bind(lib_dir)?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| ApiError::conversion(OPERATION, format!("cannot open PDF: {e:?}")))?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / POINTS_PER_INCH);

    let pages = document.pages();
    tracing::debug!(pages = pages.len(), dpi, "rasterising document");

    let mut outputs = Vec::with_capacity(pages.len() as usize);
    for (index, page) in pages.iter().enumerate() {
        let number = index + 1;
        let image = page
            .render_with_config(&render_config)
            .map_err(|e| {
                ApiError::conversion(OPERATION, format!("page {number}: render failed: {e:?}"))
            })?
            .as_image();

        let path = out_dir.join(format!("page_{number}.png"));
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| ApiError::conversion(OPERATION, format!("page {number}: {e}")))?;
        outputs.push(path);
    }

    if outputs.is_empty() {
        return Err(ApiError::MissingOutput {
            operation: OPERATION,
        });
    }

    Ok(outputs)
}
