//! Iteration State Management and Run Summary
//!
//! Each version in the matrix moves through [`IterationPhase`]:
//!
//! ```text
//! Pending -> Skipped  -------------------------> CleanedUp
//! Pending -> Planned  -------------------------> CleanedUp   (dry run)
//! Pending -> Building -> Succeeded ------------> CleanedUp
//!                     -> Failed                              (absorbing)
//! ```
//!
//! `Failed` ends the whole run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::models::VersionId;

/// Discrete states of one matrix iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationPhase {
    Pending,
    /// Artifact already present and skip-existing mode is on
    Skipped,
    /// Dry run: logged what would be built
    Planned,
    /// Recipe rendered, image build/run in progress
    Building,
    Succeeded,
    Failed,
    /// Recipe instance released
    CleanedUp,
}

impl IterationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            IterationPhase::Pending => "pending",
            IterationPhase::Skipped => "skipped",
            IterationPhase::Planned => "planned",
            IterationPhase::Building => "building",
            IterationPhase::Succeeded => "succeeded",
            IterationPhase::Failed => "failed",
            IterationPhase::CleanedUp => "cleaned_up",
        }
    }

    /// Get all valid phase transitions FROM this phase.
    pub fn valid_next_phases(&self) -> Vec<IterationPhase> {
        match self {
            IterationPhase::Pending => vec![
                IterationPhase::Skipped,
                IterationPhase::Planned,
                IterationPhase::Building,
            ],
            IterationPhase::Building => vec![IterationPhase::Succeeded, IterationPhase::Failed],
            IterationPhase::Skipped | IterationPhase::Planned | IterationPhase::Succeeded => {
                vec![IterationPhase::CleanedUp]
            }
            IterationPhase::Failed | IterationPhase::CleanedUp => vec![],
        }
    }

    pub fn can_transition_to(&self, next: IterationPhase) -> bool {
        self.valid_next_phases().contains(&next)
    }
}

/// Final result recorded for a version in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOutcome {
    Skipped,
    Planned,
    Built,
    Failed,
}

/// Tracks one version through its phases.
#[derive(Debug)]
pub struct IterationState {
    pub version: VersionId,
    pub artifact: PathBuf,
    phase: IterationPhase,
    /// Last phase before `CleanedUp`, which decides the outcome
    settled: IterationPhase,
    started: Instant,
}

impl IterationState {
    pub fn new(version: VersionId, artifact: PathBuf) -> Self {
        IterationState {
            version,
            artifact,
            phase: IterationPhase::Pending,
            settled: IterationPhase::Pending,
            started: Instant::now(),
        }
    }

    pub fn phase(&self) -> IterationPhase {
        self.phase
    }

    /// Attempt to transition to the next phase.
    pub fn transition_to(&mut self, next: IterationPhase) -> Result<(), String> {
        if !self.phase.can_transition_to(next) {
            return Err(format!(
                "Invalid phase transition for {}: {} -> {}",
                self.version,
                self.phase.as_str(),
                next.as_str()
            ));
        }
        log::debug!(
            "[Matrix] {}: {} -> {}",
            self.version,
            self.phase.as_str(),
            next.as_str()
        );
        if next != IterationPhase::CleanedUp {
            self.settled = next;
        }
        self.phase = next;
        Ok(())
    }

    /// Outcome once the iteration has settled; `None` while pending or building.
    pub fn outcome(&self) -> Option<VersionOutcome> {
        match self.settled {
            IterationPhase::Skipped => Some(VersionOutcome::Skipped),
            IterationPhase::Planned => Some(VersionOutcome::Planned),
            IterationPhase::Succeeded => Some(VersionOutcome::Built),
            IterationPhase::Failed => Some(VersionOutcome::Failed),
            _ => None,
        }
    }

    /// Convert into a report entry.
    pub fn into_report(self) -> VersionReport {
        let outcome = self.outcome().unwrap_or(VersionOutcome::Failed);
        VersionReport {
            version: self.version,
            outcome,
            artifact: self.artifact,
            duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

/// Per-version line of the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReport {
    pub version: VersionId,
    pub outcome: VersionOutcome,
    pub artifact: PathBuf,
    pub duration_ms: u64,
}

/// What happened during a run, in processing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub skip_existing: bool,
    pub dry_run: bool,
    pub versions: Vec<VersionReport>,
}

impl RunSummary {
    pub fn new(skip_existing: bool, dry_run: bool) -> Self {
        RunSummary {
            started_at: Utc::now(),
            finished_at: None,
            skip_existing,
            dry_run,
            versions: Vec::new(),
        }
    }

    pub fn record(&mut self, report: VersionReport) {
        self.versions.push(report);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn count(&self, outcome: VersionOutcome) -> usize {
        self.versions.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Versions in the given outcome, in processing order.
    pub fn versions_with(&self, outcome: VersionOutcome) -> Vec<&VersionId> {
        self.versions
            .iter()
            .filter(|r| r.outcome == outcome)
            .map(|r| &r.version)
            .collect()
    }

    /// Write the summary as pretty JSON, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        fs::write(path, json)
    }

    /// One-line summary for the log.
    pub fn describe(&self) -> String {
        format!(
            "{} built, {} skipped, {} planned, {} failed",
            self.count(VersionOutcome::Built),
            self.count(VersionOutcome::Skipped),
            self.count(VersionOutcome::Planned),
            self.count(VersionOutcome::Failed)
        )
    }
}
