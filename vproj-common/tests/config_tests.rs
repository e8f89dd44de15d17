//! Configuration loading and resolution tests

use serial_test::serial;
use tempfile::TempDir;
use vproj_common::config::{
    load_config, load_toml_config, resolve_number, resolve_setting, EndpointConfig,
    PipelineConfig, TomlConfig,
};
use vproj_common::Error;

#[test]
fn test_toml_round_trip_through_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");

    let config = TomlConfig {
        endpoints: EndpointConfig {
            stream_url: Some("http://localhost:9000/stream".to_string()),
            ..Default::default()
        },
        pipeline: PipelineConfig {
            model: Some("gpt-4".to_string()),
            max_concurrent_ratings: Some(8),
            request_timeout_secs: None,
        },
        ..Default::default()
    };

    std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
    let loaded = load_toml_config(&path).unwrap();

    assert_eq!(loaded, config);
    assert_eq!(loaded.logging.level, "info");
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[pipeline]\nmodel = \"gemini-pro\"\n").unwrap();

    let loaded = load_toml_config(&path).unwrap();

    assert_eq!(loaded.pipeline.model.as_deref(), Some("gemini-pro"));
    assert_eq!(loaded.endpoints, EndpointConfig::default());
    assert_eq!(loaded.logging.level, "info");
}

#[test]
fn test_malformed_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[pipeline\nmodel = ").unwrap();

    let err = load_config(Some(&path)).unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));
}

#[test]
fn test_explicit_missing_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.toml");

    match load_config(Some(&path)) {
        Err(err @ Error::Io { .. }) => assert!(err.to_string().contains("absent.toml")),
        other => panic!("expected read error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_resolve_setting_priority() {
    std::env::set_var("VPROJ_TEST_SETTING", "from-env");

    assert_eq!(
        resolve_setting(Some("from-cli"), "VPROJ_TEST_SETTING", Some("from-toml"), "default"),
        "from-cli"
    );
    assert_eq!(
        resolve_setting(None, "VPROJ_TEST_SETTING", Some("from-toml"), "default"),
        "from-env"
    );

    std::env::remove_var("VPROJ_TEST_SETTING");

    assert_eq!(
        resolve_setting(None, "VPROJ_TEST_SETTING", Some("from-toml"), "default"),
        "from-toml"
    );
    assert_eq!(
        resolve_setting(Some("  "), "VPROJ_TEST_SETTING", None, "default"),
        "default"
    );
}

#[test]
#[serial]
fn test_resolve_number_ignores_garbage_env() {
    std::env::set_var("VPROJ_TEST_NUMBER", "lots");
    assert_eq!(resolve_number::<usize>(None, "VPROJ_TEST_NUMBER", Some(4)), Some(4));

    std::env::set_var("VPROJ_TEST_NUMBER", " 12 ");
    assert_eq!(resolve_number::<usize>(None, "VPROJ_TEST_NUMBER", Some(4)), Some(12));
    assert_eq!(resolve_number::<usize>(Some(2), "VPROJ_TEST_NUMBER", Some(4)), Some(2));

    std::env::remove_var("VPROJ_TEST_NUMBER");
    assert_eq!(resolve_number::<usize>(None, "VPROJ_TEST_NUMBER", None), None);
}
