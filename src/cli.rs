//! # CLI Argument Definitions
//!
//! Command-line surface of `prebuilt-matrix`, defined with `clap`.
//! Any unknown flag or positional argument is a usage error (exit status 1).

use clap::error::ErrorKind;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::MatrixConfig;
use crate::error::ConfigError;
use crate::models::parse_version_list;

/// Build pre-built extension binaries for every Python version in the matrix.
#[derive(Debug, Default, Parser)]
#[command(name = "prebuilt-matrix")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build per-Python-version extension binaries in Docker")]
pub struct Cli {
    /// Skip versions whose output artifact already exists
    #[arg(short = 's', long)]
    pub skip_existing: bool,

    /// Matrix configuration file (.toml or .json)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Comma-separated version list overriding the configured one (e.g. 3.8,3.9)
    #[arg(long, value_name = "LIST")]
    pub versions: Option<String>,

    /// Host directory receiving the built artifacts
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Custom Dockerfile template containing {{python_version}}
    #[arg(long, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Show what would be built without running docker
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Write a JSON run summary to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory for run log files (default: ./logs)
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    /// Parse arguments, returning clap's error for help, version and bad input.
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Cli::try_parse_from(args)
    }

    /// Apply command-line overrides on top of a loaded config.
    pub fn apply_overrides(&self, config: &mut MatrixConfig) -> Result<(), ConfigError> {
        if let Some(list) = &self.versions {
            config.versions = parse_version_list(list)?;
        }
        if let Some(dir) = &self.output_dir {
            config.build.output_dir = dir.clone();
        }
        if let Some(template) = &self.template {
            config.build.template = Some(template.clone());
        }
        Ok(())
    }
}

/// Exit status for a parse error: 0 for `--help`/`--version`, 1 otherwise.
pub fn exit_code_for(err: &clap::Error) -> u8 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_existing_short_and_long() {
        assert!(Cli::try_parse_args(["prebuilt-matrix", "-s"]).unwrap().skip_existing);
        assert!(
            Cli::try_parse_args(["prebuilt-matrix", "--skip-existing"])
                .unwrap()
                .skip_existing
        );
        assert!(!Cli::try_parse_args(["prebuilt-matrix"]).unwrap().skip_existing);
    }

    #[test]
    fn test_help_exits_zero() {
        let err = Cli::try_parse_args(["prebuilt-matrix", "-h"]).unwrap_err();
        assert_eq!(exit_code_for(&err), 0);
        let err = Cli::try_parse_args(["prebuilt-matrix", "--help"]).unwrap_err();
        assert_eq!(exit_code_for(&err), 0);
    }

    #[test]
    fn test_unknown_flag_exits_one() {
        let err = Cli::try_parse_args(["prebuilt-matrix", "--bogus"]).unwrap_err();
        assert_eq!(exit_code_for(&err), 1);
        let err = Cli::try_parse_args(["prebuilt-matrix", "extra"]).unwrap_err();
        assert_eq!(exit_code_for(&err), 1);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_args([
            "prebuilt-matrix",
            "--versions",
            "3.10,3.11",
            "-o",
            "out",
            "--template",
            "Dockerfile.tpl",
        ])
        .unwrap();
        let mut config = MatrixConfig::default();
        cli.apply_overrides(&mut config).unwrap();

        let versions: Vec<&str> = config.versions.iter().map(|v| v.as_str()).collect();
        assert_eq!(versions, vec!["3.10", "3.11"]);
        assert_eq!(config.build.output_dir, PathBuf::from("out"));
        assert_eq!(config.build.template, Some(PathBuf::from("Dockerfile.tpl")));
    }

    #[test]
    fn test_invalid_version_override() {
        let cli = Cli::try_parse_args(["prebuilt-matrix", "--versions", "3.8,$(id)"]).unwrap();
        let mut config = MatrixConfig::default();
        assert!(matches!(
            cli.apply_overrides(&mut config),
            Err(ConfigError::InvalidVersion(_))
        ));
    }
}
