//! Streams a finished artifact back to the caller as a file download.
//!
//! The response body owns the request [`Workspace`]. actix drops the body once
//! the last chunk has been written (or the client goes away), which is what
//! deletes the workspace directory on the success path.

use crate::error::ApiError;
use crate::workspace::Workspace;
use actix_web::http::header::{ContentDisposition, HeaderName, HeaderValue, CONTENT_TYPE};
use actix_web::web::Bytes;
use actix_web::HttpResponse;
use anyhow::Context;
use futures_util::stream::Stream;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio_util::io::ReaderStream;

pub const PDF: &str = "application/pdf";
pub const ZIP: &str = "application/zip";
pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const TEXT: &str = "text/plain; charset=utf-8";

const DEGRADED_PAGES: &str = "x-degraded-pages";

pub struct Download {
    pub path: PathBuf,
    pub filename: String,
    pub content_type: &'static str,
    pub degraded_pages: Vec<u32>,
    pub workspace: Workspace,
}

impl Download {
    pub fn new(
        workspace: Workspace,
        path: PathBuf,
        filename: impl Into<String>,
        content_type: &'static str,
    ) -> Self {
        Self {
            path,
            filename: filename.into(),
            content_type,
            degraded_pages: Vec::new(),
            workspace,
        }
    }

    pub fn with_degraded_pages(mut self, pages: Vec<u32>) -> Self {
        self.degraded_pages = pages;
        self
    }

    pub async fn into_response(self) -> Result<HttpResponse, ApiError> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .with_context(|| format!("opening artifact {}", self.path.display()))?;
        let size = file.metadata().await.map(|m| m.len()).unwrap_or_default();

        tracing::info!(
            request_id = %self.workspace.id(),
            filename = %self.filename,
            bytes = size,
            "streaming artifact"
        );

        let mut response = HttpResponse::Ok();
        response
            .insert_header((CONTENT_TYPE, self.content_type))
            .insert_header(ContentDisposition::attachment(self.filename.clone()));

        if !self.degraded_pages.is_empty() {
            let pages = self
                .degraded_pages
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            if let Ok(value) = HeaderValue::from_str(&pages) {
                response.insert_header((HeaderName::from_static(DEGRADED_PAGES), value));
            }
        }

        Ok(response.streaming(ArtifactStream {
            inner: ReaderStream::new(file),
            _workspace: self.workspace,
        }))
    }
}

/// File chunks, holding the workspace alive until the body is dropped.
struct ArtifactStream {
    inner: ReaderStream<tokio::fs::File>,
    _workspace: Workspace,
}

impl Stream for ArtifactStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn workspace_lives_until_body_is_dropped() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        let path = ws.allocate("out.txt");
        std::fs::write(&path, b"hello").unwrap();

        let response = Download::new(ws, path, "out.txt", TEXT)
            .with_degraded_pages(vec![2, 4])
            .into_response()
            .await
            .unwrap();

        assert_eq!(response.headers().get("x-degraded-pages").unwrap(), "2,4");
        let disposition = response
            .headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(disposition.contains("attachment"));
        assert!(disposition.contains("out.txt"));

        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
        drop(response);
        assert_eq!(crate::workspace::settle(root.path()).await, 0);
    }

    #[actix_web::test]
    async fn body_contains_file_bytes() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        let path = ws.allocate("out.txt");
        std::fs::write(&path, b"hello world").unwrap();

        let response = Download::new(ws, path, "out.txt", TEXT)
            .into_response()
            .await
            .unwrap();
        let bytes = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&bytes[..], b"hello world");
        assert_eq!(crate::workspace::settle(root.path()).await, 0);
    }
}
