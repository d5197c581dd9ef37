// tests/config_test.rs
use git_release::config::{load_config, Config};
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_load_default_config() {
    let config = Config::default();
    assert_eq!(config.release.tag_prefix, "v");
    assert_eq!(config.release.remote, "origin");
    assert!(config.release.version_files.is_empty());
    assert!(config.registry.package.is_empty());
    assert_eq!(config.registry.api_base, "https://crates.io");
}

#[test]
fn test_load_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    let toml_content = r#"
[release]
tag_prefix = "release-"
remote = "upstream"
version_files = ["Cargo.toml", "package.json"]

[registry]
package = "my-crate"
max_attempts = 8
"#;
    temp_file.write_all(toml_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = load_config(Some(temp_file.path().to_str().unwrap())).unwrap();
    assert_eq!(config.release.tag_prefix, "release-");
    assert_eq!(config.release.remote, "upstream");
    assert_eq!(config.release.version_files.len(), 2);
    assert_eq!(config.registry.package, "my-crate");
    assert_eq!(config.registry.max_attempts, 8);
    // Unspecified fields fall back to defaults
    assert_eq!(config.registry.grace_period_secs, 3);
    assert_eq!(config.registry.timeout_secs, 60);
}

#[test]
fn test_load_missing_custom_path_errors() {
    assert!(load_config(Some("/nonexistent/gitrelease.toml")).is_err());
}

#[test]
fn test_load_invalid_toml_errors() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[release\ntag_prefix = ").unwrap();
    temp_file.flush().unwrap();

    assert!(load_config(Some(temp_file.path().to_str().unwrap())).is_err());
}

#[test]
#[serial]
fn test_load_from_current_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("gitrelease.toml"),
        "[release]\ntag_prefix = \"cwd-\"\n",
    )
    .unwrap();

    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let config = load_config(None).unwrap();
    std::env::set_current_dir(previous).unwrap();

    assert_eq!(config.release.tag_prefix, "cwd-");
}

#[test]
fn test_verifier_budget_from_config() {
    let mut config = Config::default();
    config.registry.grace_period_secs = 1;
    config.registry.poll_interval_secs = 4;
    config.registry.max_attempts = 9;
    config.registry.timeout_secs = 45;

    let verifier = config.registry.verifier_config();
    assert_eq!(verifier.grace_period, Duration::from_secs(1));
    assert_eq!(verifier.poll_interval, Duration::from_secs(4));
    assert_eq!(verifier.max_attempts, 9);
    assert_eq!(verifier.timeout, Duration::from_secs(45));
}
