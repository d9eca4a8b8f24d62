use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::ArchiveError;

/// JSON body shared by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

/// An error ready to leave the service as an HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ArchiveError> for ApiError {
    fn from(err: ArchiveError) -> Self {
        let status = match err {
            ArchiveError::UpstreamStatus(_)
            | ArchiveError::MissingContentLength
            | ArchiveError::EocdNotFound(_)
            | ArchiveError::EocdTruncated
            | ArchiveError::CdSizeMismatch { .. }
            | ArchiveError::CdCorrupt(_)
            | ArchiveError::LocalHeaderCorrupt(_)
            | ArchiveError::PayloadSizeMismatch { .. }
            | ArchiveError::DecompressMismatch { .. }
            | ArchiveError::Unsupported(_) => StatusCode::BAD_REQUEST,
            ArchiveError::RangeOutOfBounds { .. }
            | ArchiveError::Http(_)
            | ArchiveError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                status: "error",
                message: self.message,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
