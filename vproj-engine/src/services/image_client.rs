//! Thumbnail lookup client

use super::{check_status, ImageService, ServiceError};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ThumbnailResponse {
    thumbnail: Option<String>,
}

/// HTTP client for the image endpoint: `GET <endpoint>?prompt=<text>`
pub struct HttpImageService {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpImageService {
    pub fn new(http_client: reqwest::Client, endpoint: String) -> Self {
        Self {
            http_client,
            endpoint,
        }
    }
}

#[async_trait]
impl ImageService for HttpImageService {
    async fn fetch_thumbnail(&self, text: &str) -> Result<Option<String>, ServiceError> {
        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[("prompt", text)])
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let body: ThumbnailResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

        Ok(body.thumbnail.filter(|url| !url.trim().is_empty()))
    }
}
