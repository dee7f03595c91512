use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::pages;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Forbidden")]
    Forbidden,

    #[error("Page not found")]
    PageNotFound,

    #[error("Image upload failed: {0:#}")]
    UploadFailed(anyhow::Error),

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Forbidden => pages::status_page(StatusCode::FORBIDDEN, "403.html", "Forbidden"),
            AppError::PageNotFound | AppError::NotFound => {
                pages::status_page(StatusCode::NOT_FOUND, "404.html", "Page Not Found")
            }
            AppError::InvalidCredentials | AppError::DuplicateEmail | AppError::Validation(_) => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            AppError::UploadFailed(ref e) | AppError::Internal(ref e) => {
                error!(error = %format!("{e:#}"), "request failed");
                pages::status_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "500.html",
                    "Something went wrong",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(AppError::Forbidden.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::PageNotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Validation("bad".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::UploadFailed(anyhow::anyhow!("host down"))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn upload_failure_message_includes_cause() {
        let err = AppError::UploadFailed(anyhow::anyhow!("timeout"));
        assert_eq!(err.to_string(), "Image upload failed: timeout");
    }
}
