//! Engine configuration resolution
//!
//! Each setting resolves CLI → ENV → TOML → default (see
//! [`vproj_common::config::resolve_setting`]).

use crate::workflow::PipelineParams;
use std::time::Duration;
use tracing::info;
use vproj_common::config::{resolve_number, resolve_setting, TomlConfig};

pub const ENV_STREAM_URL: &str = "VPROJ_STREAM_URL";
pub const ENV_ATTRIBUTES_URL: &str = "VPROJ_ATTRIBUTES_URL";
pub const ENV_IMAGE_URL: &str = "VPROJ_IMAGE_URL";
pub const ENV_MODEL: &str = "VPROJ_MODEL";
pub const ENV_MAX_CONCURRENT_RATINGS: &str = "VPROJ_MAX_CONCURRENT_RATINGS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "VPROJ_REQUEST_TIMEOUT_SECS";

const DEFAULT_STREAM_URL: &str = "http://127.0.0.1:8080/domain-stream";
const DEFAULT_ATTRIBUTES_URL: &str = "http://127.0.0.1:8080/attributes";
const DEFAULT_IMAGE_URL: &str = "http://127.0.0.1:8080/image";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Models the domain stream service understands
pub const KNOWN_MODELS: [&str; 4] = ["gpt-3.5-turbo", "gpt-4", "claude-3-opus", "gemini-pro"];

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = KNOWN_MODELS[0];

/// Command-line overrides; `None` defers to the lower tiers
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub stream_url: Option<String>,
    pub attributes_url: Option<String>,
    pub image_url: Option<String>,
    pub model: Option<String>,
    pub max_concurrent_ratings: Option<usize>,
    pub request_timeout_secs: Option<u64>,
}

/// Fully resolved engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub stream_url: String,
    pub attributes_url: String,
    pub image_url: String,
    pub model: String,
    pub request_timeout: Duration,
    pub params: PipelineParams,
}

impl EngineConfig {
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Self {
        let endpoints = &toml.endpoints;
        let pipeline = &toml.pipeline;

        let model = resolve_setting(
            cli.model.as_deref(),
            ENV_MODEL,
            pipeline.model.as_deref(),
            DEFAULT_MODEL,
        );
        if !is_known_model(&model) {
            tracing::warn!(model = %model, "Unknown model, passing through to stream service");
        }

        let timeout_secs = resolve_number(
            cli.request_timeout_secs,
            ENV_REQUEST_TIMEOUT_SECS,
            pipeline.request_timeout_secs,
        )
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let params = PipelineParams {
            max_concurrent_ratings: resolve_number(
                cli.max_concurrent_ratings,
                ENV_MAX_CONCURRENT_RATINGS,
                pipeline.max_concurrent_ratings,
            )
            .filter(|cap| *cap > 0),
            ..PipelineParams::default()
        };

        let config = Self {
            stream_url: resolve_setting(
                cli.stream_url.as_deref(),
                ENV_STREAM_URL,
                endpoints.stream_url.as_deref(),
                DEFAULT_STREAM_URL,
            ),
            attributes_url: resolve_setting(
                cli.attributes_url.as_deref(),
                ENV_ATTRIBUTES_URL,
                endpoints.attributes_url.as_deref(),
                DEFAULT_ATTRIBUTES_URL,
            ),
            image_url: resolve_setting(
                cli.image_url.as_deref(),
                ENV_IMAGE_URL,
                endpoints.image_url.as_deref(),
                DEFAULT_IMAGE_URL,
            ),
            model,
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
            params,
        };

        info!(
            stream_url = %config.stream_url,
            attributes_url = %config.attributes_url,
            image_url = %config.image_url,
            model = %config.model,
            rating_cap = ?config.params.max_concurrent_ratings,
            "Engine configuration resolved"
        );

        config
    }
}

pub fn is_known_model(model: &str) -> bool {
    KNOWN_MODELS.contains(&model)
}
