use axum::extract::multipart::MultipartError;
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum PanelError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Account {0} not found")]
    AccountNotFound(i64),

    #[error("Credentials are incomplete: {0}")]
    EmptyCredentials(&'static str),

    #[error("Invalid account settings: {0}")]
    InvalidAccount(String),

    #[error("Unknown database driver: {0}")]
    UnknownDriver(String),

    #[error("Unsupported driver operation: {0}")]
    UnsupportedOperation(String),

    #[error("Login to {driver} failed: {reason}")]
    LoginFailed { driver: String, reason: String },

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("No file found in upload request")]
    MissingUploadFile,

    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("Unsupported image type: {0}")]
    UnsupportedImage(String),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl PanelError {
    /// Status code and public body for this error. Internal failures are not leaked.
    pub fn status_and_body(&self) -> (StatusCode, ApiErrorBody) {
        let (status, code, message) = match self {
            PanelError::DatabaseError(_)
            | PanelError::RactorError(_)
            | PanelError::TaskJoin(_)
            | PanelError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred.".to_string(),
            ),
            PanelError::Json(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", self.to_string()),
            PanelError::AccountNotFound(_) => {
                (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND", self.to_string())
            }
            PanelError::EmptyCredentials(_) | PanelError::InvalidAccount(_) => (
                StatusCode::BAD_REQUEST,
                "INVALID_CREDENTIALS",
                self.to_string(),
            ),
            PanelError::UnknownDriver(_) | PanelError::UnsupportedOperation(_) => {
                (StatusCode::BAD_REQUEST, "UNKNOWN_DRIVER", self.to_string())
            }
            PanelError::LoginFailed { .. } => {
                (StatusCode::UNAUTHORIZED, "LOGIN_FAILED", self.to_string())
            }
            PanelError::Multipart(_) | PanelError::MissingUploadFile => {
                (StatusCode::BAD_REQUEST, "BAD_UPLOAD", self.to_string())
            }
            PanelError::PayloadTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                self.to_string(),
            ),
            PanelError::UploadRejected(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UPLOAD_REJECTED",
                self.to_string(),
            ),
            PanelError::UnsupportedImage(_) | PanelError::Image(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "IMAGE_ERROR",
                self.to_string(),
            ),
        };
        (
            status,
            ApiErrorBody {
                code: code.to_string(),
                message,
            },
        )
    }
}

impl IntoResponse for PanelError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = self.status_and_body();
        (status, Json(ApiErrorResponse { error })).into_response()
    }
}

/// Standardized API error response body
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
