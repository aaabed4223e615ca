//! Error type shared by every endpoint and its JSON rendering.
//!
//! Client mistakes map to 4xx with a short machine-readable code. Conversion
//! failures always carry a short diagnostic. Unexpected failures only expose
//! their full trace when the service was started with `--debug-trace`; that
//! decision is made once, when [`trace_policy`] is installed.

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlerResponse, ErrorHandlers};
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("field `{field}` is required")]
    MissingField { field: String },

    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("field `{field}` needs at least {min} file(s), got {got}")]
    NotEnoughFiles { field: String, min: usize, got: usize },

    #[error("page range {start}-{end} is outside the document (1-{total})")]
    InvalidPageRange { start: i64, end: i64, total: usize },

    #[error("malformed multipart body: {0}")]
    Multipart(String),

    #[error("uploaded files exceed the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    #[error("document is password protected")]
    DocumentEncrypted,

    #[error("incorrect password")]
    WrongPassword,

    #[error("{operation} failed: {detail}")]
    Conversion { operation: &'static str, detail: String },

    #[error("could not unlock document: {detail}")]
    UnlockFailed { detail: String },

    #[error("{operation} produced no output file")]
    MissingOutput { operation: &'static str },

    #[error("{program} did not finish within {secs}s")]
    ConverterTimeout { program: String, secs: u64 },

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn missing(field: &str) -> Self {
        ApiError::MissingField {
            field: field.to_string(),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ApiError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn conversion(operation: &'static str, detail: impl ToString) -> Self {
        ApiError::Conversion {
            operation,
            detail: detail.to_string(),
        }
    }

    /// Machine-readable reason placed in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingField { .. } => "missing_field",
            ApiError::InvalidField { .. } => "invalid_field",
            ApiError::NotEnoughFiles { .. } => "not_enough_files",
            ApiError::InvalidPageRange { .. } => "invalid_page_range",
            ApiError::Multipart(_) => "malformed_multipart",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::DocumentEncrypted => "document_encrypted",
            ApiError::WrongPassword => "incorrect_password",
            ApiError::Conversion { .. } => "conversion_failed",
            ApiError::MissingOutput { .. } => "conversion_failed",
            ApiError::UnlockFailed { .. } => "unlock_failed",
            ApiError::ConverterTimeout { .. } => "converter_timeout",
            ApiError::Unexpected(_) => "internal_error",
        }
    }

    /// Details that are always safe to return to the caller.
    fn public_details(&self) -> Option<String> {
        match self {
            ApiError::Unexpected(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Full diagnostic trace, only for failures whose details are withheld by default.
    pub fn trace(&self) -> Option<String> {
        match self {
            ApiError::Unexpected(err) => Some(format!("{err:?}")),
            _ => None,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code().to_string(),
            details: self.public_details(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Unexpected(anyhow::anyhow!("conversion task aborted: {err}"))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingField { .. }
            | ApiError::InvalidField { .. }
            | ApiError::NotEnoughFiles { .. }
            | ApiError::InvalidPageRange { .. }
            | ApiError::Multipart(_)
            | ApiError::DocumentEncrypted => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::WrongPassword => StatusCode::UNAUTHORIZED,
            ApiError::Conversion { .. }
            | ApiError::UnlockFailed { .. }
            | ApiError::MissingOutput { .. }
            | ApiError::ConverterTimeout { .. }
            | ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Unexpected(err) => tracing::error!("Unexpected error: {err:#}"),
            ApiError::Conversion { .. }
            | ApiError::UnlockFailed { .. }
            | ApiError::MissingOutput { .. }
            | ApiError::ConverterTimeout { .. } => tracing::error!("Conversion error: {self}"),
            ApiError::WrongPassword => tracing::info!("Authorization error: {self}"),
            _ => tracing::debug!("Client error: {self}"),
        }

        HttpResponse::build(self.status_code()).json(self.body())
    }
}

/// Middleware that decides, once at startup, whether 500 responses carry traces.
pub fn trace_policy<B: MessageBody + 'static>(debug_trace: bool) -> ErrorHandlers<B> {
    if debug_trace {
        ErrorHandlers::new().handler(StatusCode::INTERNAL_SERVER_ERROR, attach_trace)
    } else {
        ErrorHandlers::new()
    }
}

fn attach_trace<B: MessageBody + 'static>(
    res: ServiceResponse<B>,
) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let traced = res
        .response()
        .error()
        .and_then(|err| err.as_error::<ApiError>())
        .and_then(|err| {
            err.trace().map(|trace| ErrorBody {
                error: err.code().to_string(),
                details: Some(trace),
            })
        });

    let Some(body) = traced else {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    };

    let (req, _) = res.into_parts();
    let response = HttpResponse::InternalServerError().json(body);
    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, response).map_into_right_body(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_bad_request() {
        assert_eq!(ApiError::missing("file").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::invalid("angle", "not an integer").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidPageRange {
                start: 3,
                end: 2,
                total: 5
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn wrong_password_is_unauthorized() {
        let err = ApiError::WrongPassword;
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.body().error, "incorrect_password");
    }

    #[test]
    fn conversion_failures_keep_a_short_diagnostic() {
        let body = ApiError::MissingOutput {
            operation: "word-to-pdf",
        }
        .body();
        assert_eq!(body.error, "conversion_failed");
        assert_eq!(
            body.details.as_deref(),
            Some("word-to-pdf produced no output file")
        );
    }

    #[test]
    fn unexpected_errors_hide_details() {
        let err = ApiError::from(anyhow::anyhow!("disk full").context("staging upload"));
        let body = err.body();
        assert_eq!(body.error, "internal_error");
        assert!(body.details.is_none());
        let trace = err.trace().unwrap();
        assert!(trace.contains("staging upload"));
        assert!(trace.contains("disk full"));
    }
}
