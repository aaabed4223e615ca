//! Multipart form reading and field validation.
//!
//! File parts are streamed straight into the request workspace as they
//! arrive; text parts are buffered. Once the whole body has been read the
//! handler pulls what it needs through the typed accessors, each of which
//! fails with a 400 naming the offending field.

use crate::error::ApiError;
use crate::workspace::Workspace;
use actix_multipart::Multipart;
use anyhow::Context;
use futures_util::stream::StreamExt as _;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::io::AsyncWriteExt;

const MAX_TEXT_FIELD_BYTES: usize = 8 * 1024;

/// A file part that has been written to the workspace.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Default)]
pub struct Form {
    files: HashMap<String, Vec<Upload>>,
    fields: HashMap<String, String>,
}

impl Form {
    pub async fn read(
        mut payload: Multipart,
        workspace: &Workspace,
        max_upload_bytes: u64,
    ) -> Result<Self, ApiError> {
        let mut form = Form::default();
        let mut total: u64 = 0;

        while let Some(field) = payload.next().await {
            let mut field = field.map_err(|e| ApiError::Multipart(e.to_string()))?;
            let disposition = field.content_disposition();
            let name = disposition.get_name().unwrap_or_default().to_string();
            let filename = disposition.get_filename().map(str::to_string);

            match filename {
                Some(filename) => {
                    let path = workspace.allocate(&filename);
                    let mut file = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("creating {}", path.display()))?;
                    let mut size: u64 = 0;

                    while let Some(chunk) = field.next().await {
                        let data = chunk.map_err(|e| ApiError::Multipart(e.to_string()))?;
                        size += data.len() as u64;
                        total += data.len() as u64;
                        if total > max_upload_bytes {
                            return Err(ApiError::PayloadTooLarge {
                                limit: max_upload_bytes,
                            });
                        }
                        file.write_all(&data)
                            .await
                            .with_context(|| format!("writing {}", path.display()))?;
                    }
                    file.flush().await.context("flushing staged upload")?;

                    // Browsers send an empty part when no file was picked.
                    if filename.is_empty() && size == 0 {
                        continue;
                    }

                    let upload = Upload {
                        filename,
                        content_type: field.content_type().map(|m| m.to_string()),
                        path,
                        size,
                    };
                    tracing::debug!(
                        request_id = %workspace.id(),
                        field = %name,
                        filename = %upload.filename,
                        content_type = upload.content_type.as_deref().unwrap_or("unknown"),
                        bytes = upload.size,
                        "staged upload"
                    );
                    form.files.entry(name).or_default().push(upload);
                }
                None => {
                    let mut value = Vec::new();
                    while let Some(chunk) = field.next().await {
                        let data = chunk.map_err(|e| ApiError::Multipart(e.to_string()))?;
                        if value.len() + data.len() > MAX_TEXT_FIELD_BYTES {
                            return Err(ApiError::invalid(&name, "value too long"));
                        }
                        value.extend_from_slice(&data);
                    }
                    let value = String::from_utf8(value)
                        .map_err(|_| ApiError::invalid(&name, "not valid UTF-8"))?;
                    form.fields.insert(name, value);
                }
            }
        }

        tracing::debug!(
            request_id = %workspace.id(),
            files = form.files.values().map(Vec::len).sum::<usize>(),
            fields = form.fields.len(),
            bytes = total,
            "staged multipart form"
        );

        Ok(form)
    }

    /// The single file uploaded under `name`. Extra files are ignored.
    pub fn file(&self, name: &str) -> Result<&Upload, ApiError> {
        self.files
            .get(name)
            .and_then(|files| files.first())
            .ok_or_else(|| ApiError::missing(name))
    }

    /// All files uploaded under `name`, in upload order, requiring at least `min`.
    pub fn files(&self, name: &str, min: usize) -> Result<&[Upload], ApiError> {
        let files = self.files.get(name).map(Vec::as_slice).unwrap_or_default();
        if files.is_empty() {
            return Err(ApiError::missing(name));
        }
        if files.len() < min {
            return Err(ApiError::NotEnoughFiles {
                field: name.to_string(),
                min,
                got: files.len(),
            });
        }
        Ok(files)
    }

    pub fn text(&self, name: &str) -> Result<&str, ApiError> {
        self.fields
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ApiError::missing(name))
    }

    pub fn parse<T>(&self, name: &str) -> Result<T, ApiError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.text(name)?;
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ApiError::invalid(name, e.to_string()))
    }

    /// Like [`Form::parse`], but an absent or blank field yields `default`.
    pub fn parse_or<T>(&self, name: &str, default: T) -> Result<T, ApiError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.fields.get(name) {
            Some(raw) if !raw.trim().is_empty() => self.parse(name),
            _ => Ok(default),
        }
    }

    pub fn password(&self, name: &str) -> Result<&str, ApiError> {
        let password = self.text(name)?;
        if password.is_empty() {
            return Err(ApiError::invalid(name, "must not be empty"));
        }
        Ok(password)
    }

    #[cfg(test)]
    fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    #[cfg(test)]
    fn with_file(mut self, name: &str, filename: &str) -> Self {
        self.files.entry(name.to_string()).or_default().push(Upload {
            filename: filename.to_string(),
            content_type: None,
            path: PathBuf::from(filename),
            size: 0,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_name_the_field() {
        let form = Form::default();
        match form.file("file") {
            Err(ApiError::MissingField { field }) => assert_eq!(field, "file"),
            other => panic!("expected MissingField, got {other:?}"),
        }
        assert!(matches!(form.text("start"), Err(ApiError::MissingField { .. })));
    }

    #[test]
    fn parse_coerces_and_rejects() {
        let form = Form::default()
            .with_field("start", " 3 ")
            .with_field("angle", "ninety");
        assert_eq!(form.parse::<i64>("start").unwrap(), 3);
        assert!(matches!(
            form.parse::<i64>("angle"),
            Err(ApiError::InvalidField { .. })
        ));
    }

    #[test]
    fn parse_or_uses_default_for_absent_or_blank() {
        let form = Form::default().with_field("quality", "");
        assert_eq!(form.parse_or::<u8>("quality", 85).unwrap(), 85);
        assert_eq!(form.parse_or::<u32>("dpi", 200).unwrap(), 200);
        let form = form.with_field("dpi", "300");
        assert_eq!(form.parse_or::<u32>("dpi", 200).unwrap(), 300);
    }

    #[test]
    fn empty_password_is_rejected() {
        let form = Form::default().with_field("password", "");
        assert!(matches!(
            form.password("password"),
            Err(ApiError::InvalidField { .. })
        ));
    }

    #[test]
    fn files_enforces_minimum() {
        let form = Form::default().with_file("files", "a.pdf");
        assert!(matches!(
            form.files("files", 2),
            Err(ApiError::NotEnoughFiles { min: 2, got: 1, .. })
        ));
        let form = form.with_file("files", "b.pdf");
        let files = form.files("files", 2).unwrap();
        assert_eq!(files[0].filename, "a.pdf");
        assert_eq!(files[1].filename, "b.pdf");
    }
}
