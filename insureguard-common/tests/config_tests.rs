//! Unit tests for configuration loading and graceful degradation
//!
//! Tests that manipulate IG_* environment variables are marked #[serial]
//! so they never race each other.

use insureguard_common::config::{
    default_storage_root, ensure_directory_exists, load_toml_config, locate_config_file,
    StorageRootResolver, TomlConfig, CONFIG_ENV_VAR, STORAGE_ROOT_ENV_VAR,
};
use insureguard_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_toml_config(Some(&dir.path().join("absent.toml"))).unwrap();

    assert_eq!(config.server.bind, "127.0.0.1:5780");
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.scoring.voice_match_threshold, 0.55);
    assert_eq!(config.uploads.max_image_bytes, 5 * 1024 * 1024);
}

#[test]
fn test_no_path_yields_defaults() {
    let config = load_toml_config(None).unwrap();
    assert_eq!(config.scoring.weights.sentiment, 0.35);
    assert_eq!(config.scoring.weights.entity, 0.25);
    assert_eq!(config.vision.model, "gemini-2.5-flash");
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[scoring]
mode = "gated"
authentic_min = 81

[scoring.weights]
sentiment = 0.4
entity = 0.2
"#,
    )
    .unwrap();

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.scoring.mode.as_deref(), Some("gated"));
    assert_eq!(config.scoring.authentic_min, Some(81));
    assert_eq!(config.scoring.suspicious_min, None);
    assert_eq!(config.scoring.weights.sentiment, 0.4);
    assert_eq!(config.scoring.weights.semantic, 0.20);
    assert_eq!(config.server.bind, "127.0.0.1:5780");
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[scoring\nmode = ").unwrap();

    let result = load_toml_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_storage_root_priority() {
    let mut toml = TomlConfig::default();
    toml.storage.root = Some(PathBuf::from("/tmp/ig-from-toml"));
    env::remove_var(STORAGE_ROOT_ENV_VAR);

    // CLI wins over everything
    let cli = PathBuf::from("/tmp/ig-from-cli");
    env::set_var(STORAGE_ROOT_ENV_VAR, "/tmp/ig-from-env");
    assert_eq!(StorageRootResolver::new(Some(&cli), &toml).resolve(), cli);

    // ENV wins over TOML
    assert_eq!(
        StorageRootResolver::new(None, &toml).resolve(),
        PathBuf::from("/tmp/ig-from-env")
    );

    // TOML wins over default
    env::remove_var(STORAGE_ROOT_ENV_VAR);
    assert_eq!(
        StorageRootResolver::new(None, &toml).resolve(),
        PathBuf::from("/tmp/ig-from-toml")
    );

    // Default when nothing is configured
    let empty = TomlConfig::default();
    assert_eq!(
        StorageRootResolver::new(None, &empty).resolve(),
        default_storage_root()
    );
}

#[test]
#[serial]
fn test_locate_config_prefers_cli_then_env() {
    let cli = PathBuf::from("/tmp/ig-cli.toml");
    env::set_var(CONFIG_ENV_VAR, "/tmp/ig-env.toml");

    assert_eq!(locate_config_file(Some(&cli)), Some(cli.clone()));
    assert_eq!(locate_config_file(None), Some(PathBuf::from("/tmp/ig-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_ensure_directory_exists_creates_nested() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("a").join("b");

    ensure_directory_exists(&nested).unwrap();
    assert!(nested.is_dir());

    // Idempotent
    ensure_directory_exists(&nested).unwrap();
}
