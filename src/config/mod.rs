//! Configuration module for the build matrix.
//!
//! # Module Structure
//!
//! - `loader`: Loads a [`MatrixConfig`] from TOML or JSON files
//! - `validator`: Validates versions, naming and build settings
//!
//! # Configuration Flow
//!
//! 1. `MatrixConfig::default()` or `loader::load_config_from_file`
//! 2. Command-line overrides are applied on top
//! 3. `validator::validate_matrix_config` runs once
//! 4. `MatrixConfig::run_config` produces the immutable [`RunConfig`]

pub mod loader;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::{ArtifactNaming, RunConfig, VersionId};

/// Python versions built when no list is configured.
pub const DEFAULT_VERSIONS: &[&str] = &["3.8", "3.9", "3.10", "3.11", "3.12"];

/// File form of the matrix: which versions, how artifacts are named, and
/// how the container toolchain is driven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    /// Ordered build targets
    pub versions: Vec<VersionId>,
    pub artifact: ArtifactNaming,
    pub build: BuildSettings,
}

/// Container toolchain settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Container CLI executable (`docker`, `podman`, ...)
    pub docker_bin: String,
    pub image_prefix: String,
    /// Build context passed to `docker build`
    pub context_dir: PathBuf,
    /// Host directory receiving artifacts
    pub output_dir: PathBuf,
    /// Where rendered recipes are written
    pub recipe_dir: PathBuf,
    /// Artifact directory inside the container
    pub container_output_dir: String,
    /// Custom recipe template; the built-in Dockerfile is used when unset
    pub template: Option<PathBuf>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        let run = RunConfig::default();
        BuildSettings {
            docker_bin: "docker".to_string(),
            image_prefix: run.image_prefix,
            context_dir: PathBuf::from("."),
            output_dir: run.output_dir,
            recipe_dir: run.recipe_dir,
            container_output_dir: run.container_output_dir,
            template: None,
        }
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        MatrixConfig {
            versions: DEFAULT_VERSIONS
                .iter()
                .filter_map(|v| v.parse().ok())
                .collect(),
            artifact: ArtifactNaming::default(),
            build: BuildSettings::default(),
        }
    }
}

impl MatrixConfig {
    /// Resolve the immutable per-run settings.
    pub fn run_config(&self, skip_existing: bool, dry_run: bool) -> RunConfig {
        RunConfig {
            skip_existing,
            dry_run,
            output_dir: self.build.output_dir.clone(),
            recipe_dir: self.build.recipe_dir.clone(),
            image_prefix: self.build.image_prefix.clone(),
            container_output_dir: self.build.container_output_dir.clone(),
        }
    }
}
