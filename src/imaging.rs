//! Exact-size resizing and re-encoding of uploaded images.

use crate::error::ApiError;
use crate::workspace::{extension, sanitize_filename};
use anyhow::Context;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::ImageReader;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const OPERATION: &str = "resize-compress-image";

pub const DEFAULT_QUALITY: u8 = 85;
const MAX_DIMENSION: u32 = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct ResizeOptions {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

impl ResizeOptions {
    pub fn new(width: u32, height: u32, quality: u8) -> Result<Self, ApiError> {
        for (field, value) in [("width", width), ("height", height)] {
            if value == 0 || value > MAX_DIMENSION {
                return Err(ApiError::invalid(
                    field,
                    format!("must be between 1 and {MAX_DIMENSION}"),
                ));
            }
        }
        if !(1..=100).contains(&quality) {
            return Err(ApiError::invalid("quality", "must be between 1 and 100"));
        }
        Ok(Self {
            width,
            height,
            quality,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Jpeg,
    Png,
}

/// Output name and encoding for an upload: PNG stays PNG, everything else becomes JPEG.
fn output_name(original: &str) -> (String, Encoding) {
    let name = sanitize_filename(original);
    match extension(&name).as_deref() {
        Some("png") => (name, Encoding::Png),
        Some("jpg" | "jpeg") => (name, Encoding::Jpeg),
        _ => {
            let stem = Path::new(&name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("image");
            (format!("{stem}.jpg"), Encoding::Jpeg)
        }
    }
}

/// Resizes `input` to exactly `options.width` x `options.height` and writes it into `out_dir`.
///
/// Returns the written path and the filename the caller should see.
pub fn resize(
    input: &Path,
    original_name: &str,
    options: ResizeOptions,
    out_dir: &Path,
) -> Result<(PathBuf, String), ApiError> {
    let image = ImageReader::open(input)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| ApiError::conversion(OPERATION, format!("{original_name}: {e}")))?
        .decode()
        .map_err(|e| ApiError::conversion(OPERATION, format!("{original_name}: {e}")))?;

    let resized = image.resize_exact(options.width, options.height, FilterType::Lanczos3);
    let (name, encoding) = output_name(original_name);
    let path = out_dir.join(&name);
    let writer = BufWriter::new(
        File::create(&path).with_context(|| format!("creating {}", path.display()))?,
    );

    let encoded = match encoding {
        Encoding::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(writer, options.quality);
            encoder.encode_image(&resized.to_rgb8())
        }
        Encoding::Png => resized.write_with_encoder(PngEncoder::new_with_quality(
            writer,
            CompressionType::Best,
            PngFilter::Adaptive,
        )),
    };
    encoded.map_err(|e| ApiError::conversion(OPERATION, format!("{original_name}: {e}")))?;

    Ok((path, format!("resized_{name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    #[test]
    fn options_reject_out_of_range_values() {
        assert!(ResizeOptions::new(0, 10, 85).is_err());
        assert!(ResizeOptions::new(10, MAX_DIMENSION + 1, 85).is_err());
        assert!(ResizeOptions::new(10, 10, 0).is_err());
        assert!(ResizeOptions::new(10, 10, 101).is_err());
        assert!(ResizeOptions::new(10, 10, DEFAULT_QUALITY).is_ok());
    }

    #[test]
    fn output_names_follow_encoding() {
        assert_eq!(output_name("a.PNG"), ("a.PNG".to_string(), Encoding::Png));
        assert_eq!(output_name("b.jpeg"), ("b.jpeg".to_string(), Encoding::Jpeg));
        assert_eq!(output_name("c.webp"), ("c.jpg".to_string(), Encoding::Jpeg));
    }

    #[test]
    fn resized_images_have_exact_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let options = ResizeOptions::new(33, 17, 70).unwrap();

        for (name, format) in [
            ("in.png", ImageFormat::Png),
            ("in.jpg", ImageFormat::Jpeg),
            ("in.bmp", ImageFormat::Bmp),
        ] {
            let input = dir.path().join(name);
            let image = RgbaImage::from_pixel(64, 48, Rgba([10, 200, 90, 255]));
            if format == ImageFormat::Jpeg {
                image::DynamicImage::ImageRgba8(image)
                    .to_rgb8()
                    .save_with_format(&input, format)
                    .unwrap();
            } else {
                image.save_with_format(&input, format).unwrap();
            }

            let out_dir = dir.path().join(format!("out-{name}"));
            std::fs::create_dir(&out_dir).unwrap();
            let (path, download) = resize(&input, name, options, &out_dir).unwrap();
            assert!(download.starts_with("resized_"));
            let output = image::open(&path).unwrap();
            assert_eq!((output.width(), output.height()), (33, 17), "{name}");
        }
    }
}
