//! Build-matrix orchestration: one recipe -> image build -> image run per version.
//!
//! Versions are processed strictly in order, one at a time. The first failure
//! stops the run; later versions are not touched. On failure the failing
//! iteration's recipe instance is left on disk, since cleanup is never
//! reached.

pub mod executor;
pub mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

pub use executor::{ContainerRuntime, DockerRuntime};
pub use state::{IterationPhase, IterationState, RunSummary, VersionOutcome, VersionReport};

use crate::error::BuildError;
use crate::models::{ArtifactNaming, RunConfig, VersionId, VolumeBinding};
use crate::recipe::{RecipeInstance, RecipeTemplate};

/// First failure of a run, with everything processed up to and including it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    pub summary: RunSummary,
    #[source]
    pub error: BuildError,
}

/// Drives the build matrix against a [`ContainerRuntime`].
pub struct MatrixOrchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    template: RecipeTemplate,
    naming: ArtifactNaming,
    config: RunConfig,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl MatrixOrchestrator {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        template: RecipeTemplate,
        naming: ArtifactNaming,
        config: RunConfig,
    ) -> Self {
        MatrixOrchestrator {
            runtime,
            template,
            naming,
            config,
            cancel_rx: None,
        }
    }

    /// Stop before starting the next version once `cancel_rx` turns `true`.
    pub fn with_cancellation(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Expected artifact path for `version`.
    pub fn artifact_path(&self, version: &VersionId) -> PathBuf {
        self.naming.artifact_path(&self.config.output_dir, version)
    }

    /// Host output directory (absolute) bound to the container output path.
    ///
    /// Creates the directory unless this is a dry run, so the container
    /// engine does not create it with its own ownership.
    pub fn volume_binding(&self) -> Result<VolumeBinding, BuildError> {
        let output_dir = &self.config.output_dir;
        if !self.config.dry_run {
            std::fs::create_dir_all(output_dir)?;
        }
        Ok(VolumeBinding {
            host: absolute(output_dir)?,
            container: self.config.container_output_dir.clone(),
        })
    }

    /// Process `versions` in order.
    ///
    /// # Errors
    /// Returns the first failure together with the summary of everything
    /// processed so far. Versions after the failing one are not processed.
    pub async fn run(&self, versions: &[VersionId]) -> Result<RunSummary, RunFailure> {
        let mut summary = RunSummary::new(self.config.skip_existing, self.config.dry_run);

        let binding = match self.volume_binding() {
            Ok(binding) => binding,
            Err(error) => return Err(self.fail(summary, error)),
        };

        let total = versions.len();
        log::info!(
            target: "parsed",
            "[Matrix] Starting {} version(s): {}",
            total,
            versions.iter().map(VersionId::as_str).collect::<Vec<_>>().join(", ")
        );

        for (index, version) in versions.iter().enumerate() {
            if self.is_cancelled() {
                return Err(self.fail(summary, BuildError::Cancelled));
            }

            log::info!(target: "parsed", "[Matrix] [{}/{}] Python {}", index + 1, total, version);
            let mut state = IterationState::new(version.clone(), self.artifact_path(version));
            let result = self.process(&mut state, &binding).await;
            summary.record(state.into_report());

            if let Err(error) = result {
                return Err(self.fail(summary, error));
            }
        }

        summary.finish();
        log::info!(target: "parsed", "[Matrix] Done: {}", summary.describe());
        Ok(summary)
    }

    async fn process(
        &self,
        state: &mut IterationState,
        binding: &VolumeBinding,
    ) -> Result<(), BuildError> {
        let version = state.version.clone();

        if self.config.skip_existing && entry_exists(&state.artifact) {
            log::info!(
                target: "parsed",
                "[Matrix] Skipping Python {}: {} already exists",
                version,
                state.artifact.display()
            );
            advance(state, IterationPhase::Skipped);
            advance(state, IterationPhase::CleanedUp);
            return Ok(());
        }

        let tag = self.config.image_tag(&version);

        if self.config.dry_run {
            log::info!(
                "[Matrix] [DRY-RUN] Would render {}, build {} and run it with -v {}",
                self.config.recipe_dir.join(RecipeInstance::file_name(&version)).display(),
                tag,
                binding.to_volume_arg()
            );
            advance(state, IterationPhase::Planned);
            advance(state, IterationPhase::CleanedUp);
            return Ok(());
        }

        advance(state, IterationPhase::Building);

        let recipe = match RecipeInstance::materialize(
            &self.template,
            &version,
            &self.config.recipe_dir,
        ) {
            Ok(recipe) => recipe,
            Err(e) => {
                advance(state, IterationPhase::Failed);
                return Err(e.into());
            }
        };

        log::info!("[Matrix] Building image {}", tag);
        if let Err(e) = self.runtime.build_image(recipe.path(), &tag).await {
            advance(state, IterationPhase::Failed);
            log::error!("[Matrix] Image build failed for Python {}: {}", version, e);
            return Err(e);
        }

        log::info!("[Matrix] Running image {}", tag);
        if let Err(e) = self.runtime.run_image(&tag, binding).await {
            advance(state, IterationPhase::Failed);
            log::error!("[Matrix] Image run failed for Python {}: {}", version, e);
            return Err(e);
        }

        advance(state, IterationPhase::Succeeded);
        recipe.release()?;
        advance(state, IterationPhase::CleanedUp);

        log::info!(
            target: "parsed",
            "[Matrix] Python {} done: {}",
            version,
            state.artifact.display()
        );
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().map_or(false, |rx| *rx.borrow())
    }

    fn fail(&self, mut summary: RunSummary, error: BuildError) -> RunFailure {
        summary.finish();
        log::error!(target: "parsed", "[Matrix] Stopped: {} ({})", error, summary.describe());
        RunFailure { summary, error }
    }
}

/// Apply a transition the orchestrator guarantees is legal.
fn advance(state: &mut IterationState, next: IterationPhase) {
    if let Err(e) = state.transition_to(next) {
        log::error!("[Matrix] {}", e);
    }
}

/// Any filesystem entry, including a dangling symlink, counts as present.
fn entry_exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

fn absolute(path: &Path) -> Result<PathBuf, BuildError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::{BoxFuture, FutureExt};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records calls; never fails.
    #[derive(Default)]
    struct RecordingRuntime {
        calls: Mutex<Vec<String>>,
    }

    impl ContainerRuntime for RecordingRuntime {
        fn build_image<'a>(
            &'a self,
            recipe: &'a Path,
            tag: &'a str,
        ) -> BoxFuture<'a, Result<(), BuildError>> {
            let exists = recipe.exists();
            self.calls.lock().unwrap().push(format!("build {} {}", tag, exists));
            async { Ok(()) }.boxed()
        }

        fn run_image<'a>(
            &'a self,
            tag: &'a str,
            _binding: &'a VolumeBinding,
        ) -> BoxFuture<'a, Result<(), BuildError>> {
            self.calls.lock().unwrap().push(format!("run {}", tag));
            async { Ok(()) }.boxed()
        }
    }

    fn orchestrator(
        dir: &TempDir,
        runtime: Arc<RecordingRuntime>,
        dry_run: bool,
    ) -> MatrixOrchestrator {
        let config = RunConfig {
            dry_run,
            output_dir: dir.path().join("prebuilt"),
            recipe_dir: dir.path().to_path_buf(),
            ..RunConfig::default()
        };
        MatrixOrchestrator::new(
            runtime,
            RecipeTemplate::default(),
            ArtifactNaming::default(),
            config,
        )
    }

    #[tokio::test]
    async fn test_recipe_exists_during_build_and_is_removed_after() {
        let dir = TempDir::new().unwrap();
        let runtime = Arc::new(RecordingRuntime::default());
        let orch = orchestrator(&dir, runtime.clone(), false);

        let summary = orch.run(&["3.8".parse().unwrap()]).await.unwrap();

        assert_eq!(summary.count(VersionOutcome::Built), 1);
        let calls = runtime.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["build hicstraw-prebuilt:3.8 true", "run hicstraw-prebuilt:3.8"]);
        assert!(!dir.path().join("Dockerfile.3.8").exists());
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let runtime = Arc::new(RecordingRuntime::default());
        let orch = orchestrator(&dir, runtime.clone(), true);

        let summary = orch
            .run(&["3.8".parse().unwrap(), "3.9".parse().unwrap()])
            .await
            .unwrap();

        assert_eq!(summary.count(VersionOutcome::Planned), 2);
        assert!(runtime.calls.lock().unwrap().is_empty());
        assert!(!dir.path().join("prebuilt").exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_version() {
        let dir = TempDir::new().unwrap();
        let runtime = Arc::new(RecordingRuntime::default());
        let (tx, rx) = watch::channel(false);
        let orch = orchestrator(&dir, runtime.clone(), false).with_cancellation(rx);
        tx.send(true).unwrap();

        let failure = orch.run(&["3.8".parse().unwrap()]).await.unwrap_err();
        assert!(matches!(failure.error, BuildError::Cancelled));
        assert!(failure.summary.versions.is_empty());
        assert!(runtime.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_volume_binding_is_absolute() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir, Arc::new(RecordingRuntime::default()), false);
        let binding = orch.volume_binding().unwrap();
        assert!(binding.host.is_absolute());
        assert_eq!(binding.container, "/app/prebuilt");
        assert!(dir.path().join("prebuilt").is_dir());
    }
}
