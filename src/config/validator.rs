//! Config validation.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::config::MatrixConfig;
use crate::error::ConfigError;
use crate::models::ArtifactNaming;

/// Docker repository name: lowercase components separated by `/`.
static IMAGE_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[._-][a-z0-9]+)*(?:/[a-z0-9]+(?:[._-][a-z0-9]+)*)*$")
        .expect("image name pattern is a valid regex")
});

/// Validate the version list: non-empty. Duplicates are allowed but logged.
pub fn validate_versions(config: &MatrixConfig) -> Result<(), ConfigError> {
    if config.versions.is_empty() {
        return Err(ConfigError::EmptyMatrix);
    }

    let mut seen = HashSet::new();
    for version in &config.versions {
        if !seen.insert(version) {
            log::warn!("[Config] Version {} listed more than once", version);
        }
    }

    Ok(())
}

/// Validate artifact naming parts: non-empty and free of path separators.
pub fn validate_artifact_naming(naming: &ArtifactNaming) -> Result<(), ConfigError> {
    let parts = [
        ("name", &naming.name),
        ("platform", &naming.platform),
        ("arch", &naming.arch),
        ("extension", &naming.extension),
    ];

    for (field, value) in parts {
        if value.is_empty() {
            return Err(ConfigError::ValidationFailed(format!(
                "artifact.{} cannot be empty",
                field
            )));
        }
        if value.contains('/') || value.contains('\\') {
            return Err(ConfigError::ValidationFailed(format!(
                "artifact.{} must not contain path separators, got: {}",
                field, value
            )));
        }
    }

    Ok(())
}

/// Validate container toolchain settings.
pub fn validate_build_settings(config: &MatrixConfig) -> Result<(), ConfigError> {
    let build = &config.build;

    if build.docker_bin.trim().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "build.docker_bin cannot be empty".to_string(),
        ));
    }

    if !IMAGE_NAME_PATTERN.is_match(&build.image_prefix) {
        return Err(ConfigError::ValidationFailed(format!(
            "build.image_prefix is not a valid image name: {}",
            build.image_prefix
        )));
    }

    if !build.container_output_dir.starts_with('/') {
        return Err(ConfigError::ValidationFailed(format!(
            "build.container_output_dir must be an absolute container path, got: {}",
            build.container_output_dir
        )));
    }

    if build.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "build.output_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validate the whole matrix config.
pub fn validate_matrix_config(config: &MatrixConfig) -> Result<(), ConfigError> {
    validate_versions(config)?;
    validate_artifact_naming(&config.artifact)?;
    validate_build_settings(config)?;
    Ok(())
}
