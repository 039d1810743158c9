use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{error, warn};
use serde::Serialize;
use thiserror::Error;

use crate::config::ALLOWED_CONTENT_TYPES;

/// Errors returned by the REST API, rendered as a JSON envelope.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unsupported file type '{0}'")]
    UnsupportedFileType(String),

    #[error("{0}")]
    Validation(String),

    #[error("File size ({actual_mb:.1} MB) exceeds limit ({max_mb:.1} MB)")]
    FileTooLarge { actual_mb: f64, max_mb: f64 },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Model is not loaded")]
    ModelNotLoaded,

    #[error("Disease '{0}' not found")]
    DiseaseNotFound(String),

    #[error("Invalid Twilio signature")]
    InvalidSignature,

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error_code: &'static str,
    pub detail: String,
}

impl ApiError {
    pub fn file_too_large(actual_bytes: usize, max_bytes: usize) -> Self {
        let mb = |bytes: usize| bytes as f64 / (1024.0 * 1024.0);
        Self::FileTooLarge {
            actual_mb: mb(actual_bytes),
            max_mb: mb(max_bytes),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnsupportedFileType(_) | Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidImage(_) => StatusCode::BAD_REQUEST,
            Self::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            Self::DiseaseNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidSignature => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedFileType(_) => "UNSUPPORTED_FILE_TYPE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::InvalidImage(_) => "INVALID_IMAGE",
            Self::ModelNotLoaded => "MODEL_NOT_LOADED",
            Self::DiseaseNotFound(_) => "DISEASE_NOT_FOUND",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-facing explanation. Internal failures never leak their cause.
    pub fn detail(&self) -> String {
        match self {
            Self::UnsupportedFileType(content_type) => {
                let mut allowed = ALLOWED_CONTENT_TYPES.to_vec();
                allowed.sort();
                format!("Unsupported file type '{}'. Allowed: {}", content_type, allowed.join(", "))
            }
            Self::Validation(msg) => msg.clone(),
            Self::FileTooLarge { actual_mb, max_mb } => format!(
                "File size ({:.1} MB) exceeds the maximum allowed size ({:.1} MB).",
                actual_mb, max_mb
            ),
            Self::InvalidImage(_) => "The uploaded file could not be processed as an image. \
                Please upload a valid JPEG or PNG file."
                .to_string(),
            Self::ModelNotLoaded => {
                "Model is not loaded. The service is starting up or encountered an error.".to_string()
            }
            Self::DiseaseNotFound(name) => format!(
                "Disease '{}' not found. Use GET /api/v1/diseases to see all available classes.",
                name
            ),
            Self::InvalidSignature => "Request signature could not be verified.".to_string(),
            Self::Internal(_) => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }

        let body = ErrorBody {
            success: false,
            error_code: self.error_code(),
            detail: self.detail(),
        };
        (status, Json(body)).into_response()
    }
}
