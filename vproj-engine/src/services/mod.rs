//! Remote service clients
//!
//! Each external collaborator sits behind a trait so the workflow can run
//! against the HTTP implementations here or against test doubles:
//! - [`DomainStreamSource`] - streamed comma-separated domain members
//! - [`AttributeService`] - global schema and per-member ratings
//! - [`ImageService`] - thumbnail lookup per member

pub mod attribute_client;
pub mod domain_stream;
pub mod event_lines;
pub mod image_client;

pub use attribute_client::{normalize_ratings, HttpAttributeService};
pub use domain_stream::{HttpDomainStream, HttpDomainStreamSource};
pub use image_client::HttpImageService;

use crate::config::EngineConfig;
use crate::models::{GlobalAttributeSchema, Ratings};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("vproj/", env!("CARGO_PKG_VERSION"));

/// Errors from the schema, rating, and image services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Errors from the domain member stream; these abort a workflow run
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Stream connection failed: {0}")]
    Connect(String),

    #[error("Stream source error: {0}")]
    Remote(String),

    #[error("Stream transport error: {0}")]
    Transport(String),
}

/// One item read from a domain stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// Raw text, possibly ending mid-member
    Text(String),
    /// End-of-stream sentinel
    Done,
}

/// An open domain member stream
#[async_trait]
pub trait DomainStream: Send {
    /// Next chunk; keeps returning [`StreamChunk::Done`] once the stream has ended
    async fn next_chunk(&mut self) -> Result<StreamChunk, StreamError>;
}

/// Opens domain member streams
#[async_trait]
pub trait DomainStreamSource: Send + Sync {
    async fn open(&self, domain: &str, model: &str) -> Result<Box<dyn DomainStream>, StreamError>;
}

/// Schema and rating service
#[async_trait]
pub trait AttributeService: Send + Sync {
    /// Fetch the rating schema for `domain` from an early member sample
    async fn fetch_global_schema(
        &self,
        domain: &str,
        sample_members: &[String],
    ) -> Result<GlobalAttributeSchema, ServiceError>;

    /// Rate one member; implementations return the bare (normalized) ratings
    async fn rate_member(
        &self,
        member: &str,
        schema: &GlobalAttributeSchema,
    ) -> Result<Ratings, ServiceError>;
}

/// Image lookup service
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Thumbnail URL for `text`; `Ok(None)` when the service has no image
    async fn fetch_thumbnail(&self, text: &str) -> Result<Option<String>, ServiceError>;
}

/// The full set of collaborators a workflow run talks to
#[derive(Clone)]
pub struct RemoteServices {
    pub stream: Arc<dyn DomainStreamSource>,
    pub attributes: Arc<dyn AttributeService>,
    pub images: Arc<dyn ImageService>,
}

impl RemoteServices {
    /// HTTP clients for the endpoints in `config`
    pub fn http(config: &EngineConfig) -> Result<Self, ServiceError> {
        let client = build_http_client(config.request_timeout)?;

        Ok(Self {
            stream: Arc::new(HttpDomainStreamSource::new(
                client.clone(),
                config.stream_url.clone(),
            )),
            attributes: Arc::new(HttpAttributeService::new(
                client.clone(),
                config.attributes_url.clone(),
            )),
            images: Arc::new(HttpImageService::new(client, config.image_url.clone())),
        })
    }
}

/// Shared reqwest client with user agent and transport timeout
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::Network(e.to_string()))
}

/// Map a non-2xx response to [`ServiceError::Status`]
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}
