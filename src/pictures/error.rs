use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum PicturesError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Unsupported file extension: {0:?}")]
    InvalidExtension(String),
}

/// Reasons an upload is refused. Client-facing variants carry the exact text
/// returned in the response body.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Title is required.")]
    MissingTitle,

    #[error("Image file is required.")]
    MissingFile,

    #[error("Invalid file format. Only jpeg, png, or gif are allowed.")]
    InvalidFormat,

    #[error("Invalid form data.")]
    InvalidForm(#[from] axum::extract::multipart::MultipartError),

    #[error("Failed to store image.")]
    Storage(#[from] PicturesError),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::InvalidForm(e) => {
                // Oversized bodies keep axum's own status (413).
                let status = e.status();
                if status.is_client_error() {
                    status
                } else {
                    StatusCode::BAD_REQUEST
                }
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        if let UploadError::Storage(e) = &self {
            error!("Failed to store upload: {}", e);
        }
        (self.status(), self.to_string()).into_response()
    }
}
