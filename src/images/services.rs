use axum::extract::multipart::Field;
use bytes::Bytes;
use tracing::error;

use crate::{error::AppError, images::host::ImageHost};

/// Assigned to entries created without an image.
pub const PLACEHOLDER_IMAGE: &str = "/static/img/image-placeholder.png";

#[derive(Debug, Clone)]
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
    pub file_name: String,
}

impl UploadItem {
    /// Reads a multipart file field. Browsers send an empty part when no
    /// file was chosen; that counts as "no file".
    pub async fn from_field(field: Field<'_>) -> Result<Option<Self>, AppError> {
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        if body.is_empty() {
            return Ok(None);
        }
        if !content_type.starts_with("image/") {
            return Err(AppError::Validation("Please upload an image file.".into()));
        }
        Ok(Some(Self { body, content_type, file_name }))
    }
}

/// Uploads `item` to the image host. Host failures are not retried.
pub async fn upload_image(host: &dyn ImageHost, item: UploadItem) -> Result<String, AppError> {
    let file_name = item.file_name.clone();
    host.upload(item).await.map_err(|e| {
        error!(error = %format!("{e:#}"), file = %file_name, "image upload failed");
        AppError::UploadFailed(e)
    })
}

/// Uploaded URL when a file is supplied, the placeholder otherwise.
pub async fn resolve_image(
    host: &dyn ImageHost,
    file: Option<UploadItem>,
) -> Result<String, AppError> {
    match file {
        Some(item) => upload_image(host, item).await,
        None => Ok(PLACEHOLDER_IMAGE.to_string()),
    }
}

#[cfg(test)]
pub use fakes::{FailingImageHost, FakeImageHost};
