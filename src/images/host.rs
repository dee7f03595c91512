use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::{config::CloudinaryConfig, images::services::UploadItem};

/// Incoming transformation: cap width at 800px, let the host pick quality.
pub const UPLOAD_TRANSFORMATION: &str = "c_limit,w_800,q_auto";

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Stores the image and returns its public https URL.
    async fn upload(&self, item: UploadItem) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct Cloudinary {
    http: reqwest::Client,
    config: CloudinaryConfig,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl Cloudinary {
    pub fn new(config: CloudinaryConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("squirrel/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        let endpoint = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            config.cloud_name
        );
        Ok(Self { http, config, endpoint })
    }
}

/// Signature over the signed upload parameters: `k=v` pairs sorted by key,
/// joined with `&`, secret appended, SHA-256 hex digest.
fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{:x}", Sha256::digest(format!("{joined}{api_secret}").as_bytes()))
}

#[async_trait]
impl ImageHost for Cloudinary {
    #[instrument(skip_all)]
    async fn upload(&self, item: UploadItem) -> anyhow::Result<String> {
        debug!(file = %item.file_name, bytes = item.body.len(), "uploading image");
        let timestamp = OffsetDateTime::now_utc().unix_timestamp().to_string();
        let signature = sign_params(
            &[("timestamp", timestamp.as_str()), ("transformation", UPLOAD_TRANSFORMATION)],
            &self.config.api_secret,
        );

        let file = Part::bytes(item.body.to_vec())
            .file_name(item.file_name)
            .mime_str(&item.content_type)
            .context("invalid image content type")?;
        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("transformation", UPLOAD_TRANSFORMATION)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let res = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .context("cloudinary upload request")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("cloudinary upload rejected with {status}: {body}");
        }

        let body: UploadResponse = res.json().await.context("decode cloudinary response")?;
        debug!(url = %body.secure_url, "image uploaded");
        Ok(body.secure_url)
    }
}
