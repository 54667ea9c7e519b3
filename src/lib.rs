//! Prebuilt Matrix
//!
//! Builds pre-compiled native extension binaries for a Python library across
//! a matrix of Python versions. Each version gets its own Docker image,
//! rendered from a single Dockerfile template, so every build runs against
//! the matching interpreter and toolchain.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Version identifiers, artifact naming, run settings
//! - **config**: Matrix configuration loading and validation
//! - **recipe**: Dockerfile template rendering and per-iteration recipe files
//! - **orchestrator**: Sequential, fail-fast build matrix and the container runtime seam
//! - **cli**: Command-line surface
//! - **log_collector**: `log` backend persisting run logs to disk

pub mod cli;
pub mod config;
pub mod error;
pub mod log_collector;
pub mod models;
pub mod orchestrator;
pub mod recipe;

// Re-export the log crate for macro usage
pub use log;

pub use log_collector::{LogCollector, LogLine};

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{AppError, BuildError, ConfigError, RecipeError, Result};

pub use models::{ArtifactNaming, RunConfig, VersionId, VolumeBinding};

pub use config::MatrixConfig;

pub use recipe::{RecipeInstance, RecipeTemplate};

pub use orchestrator::{
    ContainerRuntime, DockerRuntime, IterationPhase, MatrixOrchestrator, RunFailure, RunSummary,
    VersionOutcome,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert_eq!(VERSION, "0.1.0");
    }

    #[test]
    fn test_reexports() {
        let _: Result<i32> = Ok(42);
        let _ = MatrixConfig::default();
        assert_eq!(IterationPhase::Pending, IterationPhase::Pending);
    }
}
