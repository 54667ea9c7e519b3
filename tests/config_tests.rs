//! Integration tests for the config module
//!
//! Covers loading matrix files from disk, command-line overrides and the
//! validation pass that runs before the first iteration.

use prebuilt_matrix::cli::Cli;
use prebuilt_matrix::config::{loader, validator, MatrixConfig, DEFAULT_VERSIONS};
use prebuilt_matrix::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn version_strs(config: &MatrixConfig) -> Vec<&str> {
    config.versions.iter().map(|v| v.as_str()).collect()
}

// ============================================================================
// LOADING
// ============================================================================

#[test]
fn test_load_full_toml() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "matrix.toml",
        r#"
versions = ["3.10", "3.11"]

[artifact]
name = "mylib"
arch = "aarch64"

[build]
docker_bin = "podman"
image_prefix = "mylib-prebuilt"
output_dir = "dist"
"#,
    );

    let config = loader::load_config_from_file(&path).unwrap();
    assert_eq!(version_strs(&config), vec!["3.10", "3.11"]);
    assert_eq!(config.artifact.name, "mylib");
    assert_eq!(config.artifact.platform, "linux");
    assert_eq!(config.artifact.extension, "so");
    assert_eq!(config.build.docker_bin, "podman");
    assert_eq!(config.build.output_dir, PathBuf::from("dist"));
    assert_eq!(config.build.container_output_dir, "/app/prebuilt");
    assert!(validator::validate_matrix_config(&config).is_ok());

    let run = config.run_config(true, false);
    assert!(run.skip_existing);
    assert_eq!(run.image_tag(&config.versions[0]), "mylib-prebuilt:3.10");
}

#[test]
fn test_load_json_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "matrix.json", r#"{ "versions": ["3.12"] }"#);

    let config = loader::load_config_from_file(&path).unwrap();
    assert_eq!(version_strs(&config), vec!["3.12"]);
    assert_eq!(config.build, MatrixConfig::default().build);
}

#[test]
fn test_empty_file_yields_default_matrix() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "matrix.toml", "");

    let config = loader::load_config_from_file(&path).unwrap();
    assert_eq!(version_strs(&config), DEFAULT_VERSIONS.to_vec());
}

#[test]
fn test_unquoted_float_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "matrix.toml", "versions = [3.10]\n");

    assert!(matches!(
        loader::load_config_from_file(&path),
        Err(ConfigError::InvalidToml(_))
    ));
}

#[test]
fn test_missing_file() {
    let result = loader::load_config_from_file(Path::new("/nonexistent/matrix.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "matrix.yaml", "versions: []");
    assert!(matches!(
        loader::load_config_from_file(&path),
        Err(ConfigError::UnsupportedFormat(_))
    ));
}

// ============================================================================
// OVERRIDES AND VALIDATION
// ============================================================================

#[test]
fn test_cli_versions_override_file() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "matrix.toml", "versions = [\"3.8\"]\n");
    let mut config = loader::load_config_from_file(&path).unwrap();

    let cli = Cli::try_parse_args(["prebuilt-matrix", "--versions", " 3.9 , 3.10 "]).unwrap();
    cli.apply_overrides(&mut config).unwrap();

    assert_eq!(version_strs(&config), vec!["3.9", "3.10"]);
    assert!(validator::validate_matrix_config(&config).is_ok());
}

#[test]
fn test_empty_version_list_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "matrix.toml", "versions = []\n");
    let config = loader::load_config_from_file(&path).unwrap();

    assert!(matches!(
        validator::validate_matrix_config(&config),
        Err(ConfigError::EmptyMatrix)
    ));
}

#[test]
fn test_invalid_build_settings_fail_validation() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "matrix.toml",
        "[build]\ncontainer_output_dir = \"relative/out\"\n",
    );
    let config = loader::load_config_from_file(&path).unwrap();

    assert!(matches!(
        validator::validate_matrix_config(&config),
        Err(ConfigError::ValidationFailed(_))
    ));
}

#[test]
fn test_artifact_name_with_separator_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "matrix.json", r#"{ "artifact": { "name": "../lib" } }"#);
    let config = loader::load_config_from_file(&path).unwrap();

    assert!(validator::validate_matrix_config(&config).is_err());
}
