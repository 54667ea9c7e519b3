//! Container runtime seam and the Docker implementation.
//!
//! The orchestrator only needs two capabilities: build an image from a
//! rendered recipe, and run that image with a host directory bound in.
//! [`DockerRuntime`] provides them by shelling out to the docker CLI and
//! streaming its output into the `log` pipeline (target `docker`).

use futures::future::{BoxFuture, FutureExt};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;

use crate::error::BuildError;
use crate::models::VolumeBinding;

/// External container toolchain used by the orchestrator.
///
/// Both calls block (asynchronously) until the external process exits; any
/// `Err` is fatal to the run.
pub trait ContainerRuntime: Send + Sync {
    /// Build image `tag` from the recipe file at `recipe`.
    fn build_image<'a>(&'a self, recipe: &'a Path, tag: &'a str)
        -> BoxFuture<'a, Result<(), BuildError>>;

    /// Run image `tag` to completion with `binding` mounted.
    fn run_image<'a>(
        &'a self,
        tag: &'a str,
        binding: &'a VolumeBinding,
    ) -> BoxFuture<'a, Result<(), BuildError>>;
}

/// Docker CLI runtime.
#[derive(Clone)]
pub struct DockerRuntime {
    docker_bin: String,
    context_dir: PathBuf,
    cancel_rx: watch::Receiver<bool>,
}

impl DockerRuntime {
    /// # Arguments
    /// * `docker_bin` - Executable to invoke (`docker`, `podman`, ...)
    /// * `context_dir` - Build context passed to `docker build`
    /// * `cancel_rx` - Flipped to `true` to kill the in-flight process
    pub fn new(
        docker_bin: impl Into<String>,
        context_dir: impl Into<PathBuf>,
        cancel_rx: watch::Receiver<bool>,
    ) -> Self {
        DockerRuntime {
            docker_bin: docker_bin.into(),
            context_dir: context_dir.into(),
            cancel_rx,
        }
    }

    /// Arguments for `docker build`.
    pub fn build_args(&self, recipe: &Path, tag: &str) -> Vec<String> {
        vec![
            "build".to_string(),
            "-f".to_string(),
            recipe.display().to_string(),
            "-t".to_string(),
            tag.to_string(),
            self.context_dir.display().to_string(),
        ]
    }

    /// Arguments for `docker run`.
    pub fn run_args(&self, tag: &str, binding: &VolumeBinding) -> Vec<String> {
        vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            binding.to_volume_arg(),
            tag.to_string(),
        ]
    }

    async fn invoke(&self, args: Vec<String>) -> Result<(), BuildError> {
        let label = format!(
            "{} {}",
            self.docker_bin,
            args.first().map(String::as_str).unwrap_or("")
        );
        log::info!("[Docker] Running: {} {}", self.docker_bin, args.join(" "));

        let mut command = Command::new(&self.docker_bin);
        command.args(&args);
        run_streaming(command, &label, self.cancel_rx.clone()).await
    }
}

impl ContainerRuntime for DockerRuntime {
    fn build_image<'a>(
        &'a self,
        recipe: &'a Path,
        tag: &'a str,
    ) -> BoxFuture<'a, Result<(), BuildError>> {
        self.invoke(self.build_args(recipe, tag)).boxed()
    }

    fn run_image<'a>(
        &'a self,
        tag: &'a str,
        binding: &'a VolumeBinding,
    ) -> BoxFuture<'a, Result<(), BuildError>> {
        self.invoke(self.run_args(tag, binding)).boxed()
    }
}

/// Spawn `command`, forward its stdout/stderr line by line to the logger, and
/// wait for exit.
///
/// # Returns
/// * `Ok(())` on exit status 0
/// * `Err(BuildError::SpawnFailed)` if the executable cannot be started
/// * `Err(BuildError::CommandFailed)` on non-zero exit or signal
/// * `Err(BuildError::Cancelled)` if `cancel_rx` turns `true`; the child is killed
pub async fn run_streaming(
    mut command: Command,
    label: &str,
    mut cancel_rx: watch::Receiver<bool>,
) -> Result<(), BuildError> {
    if *cancel_rx.borrow() {
        return Err(BuildError::Cancelled);
    }

    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command.kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| BuildError::SpawnFailed {
        cmd: label.to_string(),
        reason: e.to_string(),
    })?;

    let stdout = child.stdout.take().ok_or_else(|| BuildError::SpawnFailed {
        cmd: label.to_string(),
        reason: "Failed to capture stdout".to_string(),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| BuildError::SpawnFailed {
        cmd: label.to_string(),
        reason: "Failed to capture stderr".to_string(),
    })?;

    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();

    let mut stdout_closed = false;
    let mut stderr_closed = false;
    // A dropped sender means nobody can cancel anymore
    let mut cancel_closed = false;

    while !(stdout_closed && stderr_closed) {
        tokio::select! {
            line_result = stdout_lines.next_line(), if !stdout_closed => {
                match line_result {
                    Ok(Some(line)) => log::info!(target: "docker", "{}", line),
                    Ok(None) => stdout_closed = true,
                    Err(e) => {
                        log::warn!("[Docker] stdout read error: {}", e);
                        stdout_closed = true;
                    }
                }
            }
            line_result = stderr_lines.next_line(), if !stderr_closed => {
                match line_result {
                    // docker build reports progress on stderr
                    Ok(Some(line)) => log::info!(target: "docker", "{}", line),
                    Ok(None) => stderr_closed = true,
                    Err(e) => {
                        log::warn!("[Docker] stderr read error: {}", e);
                        stderr_closed = true;
                    }
                }
            }
            changed = cancel_rx.changed(), if !cancel_closed => {
                if changed.is_err() {
                    cancel_closed = true;
                } else if *cancel_rx.borrow() {
                    log::warn!("[Docker] Cancellation requested, killing '{}'", label);
                    if let Err(e) = child.kill().await {
                        log::warn!("[Docker] Failed to kill process: {}", e);
                    }
                    return Err(BuildError::Cancelled);
                }
            }
        }
    }

    let status = child.wait().await?;
    if status.success() {
        log::debug!("[Docker] '{}' completed successfully", label);
        return Ok(());
    }

    let status_msg = match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    };
    log::error!("[Docker] '{}' failed with {}", label, status_msg);
    Err(BuildError::CommandFailed {
        cmd: label.to_string(),
        status: status_msg,
    })
}
