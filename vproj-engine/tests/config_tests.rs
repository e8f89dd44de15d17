//! Engine configuration resolution tests

use serial_test::serial;
use std::time::Duration;
use vproj_common::config::{EndpointConfig, PipelineConfig, TomlConfig};
use vproj_engine::config::{
    is_known_model, CliOverrides, EngineConfig, DEFAULT_MODEL, ENV_MAX_CONCURRENT_RATINGS,
    ENV_MODEL, ENV_STREAM_URL,
};

fn clear_env() {
    for var in [ENV_MODEL, ENV_STREAM_URL, ENV_MAX_CONCURRENT_RATINGS] {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_without_any_source() {
    clear_env();

    let config = EngineConfig::resolve(&CliOverrides::default(), &TomlConfig::default());

    assert_eq!(config.model, DEFAULT_MODEL);
    assert_eq!(config.model, "gpt-3.5-turbo");
    assert_eq!(config.stream_url, "http://127.0.0.1:8080/domain-stream");
    assert_eq!(config.request_timeout, Duration::from_secs(60));
    assert_eq!(config.params.max_concurrent_ratings, None);
    assert_eq!(config.params.image_batch_size, 10);
    assert_eq!(config.params.schema_sample_threshold, 2);
}

#[test]
#[serial]
fn test_cli_beats_env_beats_toml() {
    clear_env();
    let toml = TomlConfig {
        endpoints: EndpointConfig {
            stream_url: Some("http://toml/stream".to_string()),
            ..Default::default()
        },
        pipeline: PipelineConfig {
            model: Some("gemini-pro".to_string()),
            max_concurrent_ratings: Some(3),
            request_timeout_secs: Some(5),
        },
        ..Default::default()
    };

    let from_toml = EngineConfig::resolve(&CliOverrides::default(), &toml);
    assert_eq!(from_toml.model, "gemini-pro");
    assert_eq!(from_toml.stream_url, "http://toml/stream");
    assert_eq!(from_toml.params.max_concurrent_ratings, Some(3));
    assert_eq!(from_toml.request_timeout, Duration::from_secs(5));

    std::env::set_var(ENV_MODEL, "claude-3-opus");
    std::env::set_var(ENV_STREAM_URL, "http://env/stream");
    let from_env = EngineConfig::resolve(&CliOverrides::default(), &toml);
    assert_eq!(from_env.model, "claude-3-opus");
    assert_eq!(from_env.stream_url, "http://env/stream");

    let cli = CliOverrides {
        model: Some("gpt-4".to_string()),
        stream_url: Some("http://cli/stream".to_string()),
        ..Default::default()
    };
    let from_cli = EngineConfig::resolve(&cli, &toml);
    assert_eq!(from_cli.model, "gpt-4");
    assert_eq!(from_cli.stream_url, "http://cli/stream");

    clear_env();
}

#[test]
#[serial]
fn test_zero_rating_cap_means_unbounded() {
    clear_env();
    std::env::set_var(ENV_MAX_CONCURRENT_RATINGS, "0");

    let config = EngineConfig::resolve(&CliOverrides::default(), &TomlConfig::default());
    assert_eq!(config.params.max_concurrent_ratings, None);

    clear_env();
}

#[test]
fn test_known_models() {
    for model in ["gpt-3.5-turbo", "gpt-4", "claude-3-opus", "gemini-pro"] {
        assert!(is_known_model(model));
    }
    assert!(!is_known_model("gpt-5-ultra"));
}
