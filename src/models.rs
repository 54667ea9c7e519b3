//! Core data types for Prebuilt Matrix.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;

/// Characters a version may contain; it ends up inside a Docker image tag.
static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("version pattern is a valid regex")
});

/// One build target in the matrix, e.g. `3.10`.
///
/// Opaque: it is only substituted into the recipe, the image tag and the
/// artifact filename, never parsed as a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for VersionId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if !VERSION_PATTERN.is_match(trimmed) {
            return Err(ConfigError::InvalidVersion(s.to_string()));
        }
        Ok(VersionId(trimmed.to_string()))
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VersionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct VersionIdVisitor;

        impl<'de> Visitor<'de> for VersionIdVisitor {
            type Value = VersionId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a version identifier string such as \"3.10\"")
            }

            fn visit_str<E>(self, value: &str) -> Result<VersionId, E>
            where
                E: de::Error,
            {
                value.parse().map_err(|e: ConfigError| E::custom(e.to_string()))
            }

            fn visit_u64<E>(self, value: u64) -> Result<VersionId, E>
            where
                E: de::Error,
            {
                Ok(VersionId(value.to_string()))
            }

            fn visit_i64<E>(self, value: i64) -> Result<VersionId, E>
            where
                E: de::Error,
            {
                value.to_string().parse().map_err(|e: ConfigError| E::custom(e.to_string()))
            }

            fn visit_f64<E>(self, value: f64) -> Result<VersionId, E>
            where
                E: de::Error,
            {
                // 3.10 would silently become 3.1
                Err(E::custom(format!(
                    "version {} must be quoted (e.g. \"3.10\") so trailing zeros are kept",
                    value
                )))
            }
        }

        deserializer.deserialize_any(VersionIdVisitor)
    }
}

/// Parse a comma-separated version list such as `3.8,3.9,3.10`.
pub fn parse_version_list(list: &str) -> Result<Vec<VersionId>, ConfigError> {
    list.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Naming convention for the artifact produced per version:
/// `<name>.<platform>.<arch>.cp<version>-<version>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactNaming {
    pub name: String,
    pub platform: String,
    pub arch: String,
    pub extension: String,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        ArtifactNaming {
            name: "hicstraw".to_string(),
            // Artifacts are always produced inside Linux containers
            platform: "linux".to_string(),
            arch: std::env::consts::ARCH.to_string(),
            extension: "so".to_string(),
        }
    }
}

impl ArtifactNaming {
    /// File name of the artifact for `version`.
    pub fn file_name(&self, version: &VersionId) -> String {
        format!(
            "{}.{}.{}.cp{v}-{v}.{}",
            self.name,
            self.platform,
            self.arch,
            self.extension,
            v = version
        )
    }

    /// Expected host path of the artifact for `version`.
    pub fn artifact_path(&self, output_dir: &Path, version: &VersionId) -> PathBuf {
        output_dir.join(self.file_name(version))
    }
}

/// Host directory bound into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeBinding {
    pub host: PathBuf,
    pub container: String,
}

impl VolumeBinding {
    /// `-v` argument form: `<host>:<container>`.
    pub fn to_volume_arg(&self) -> String {
        format!("{}:{}", self.host.display(), self.container)
    }
}

/// Immutable run settings, resolved once before the first iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Skip versions whose artifact already exists
    pub skip_existing: bool,
    /// Log the plan without touching docker or the filesystem
    pub dry_run: bool,
    /// Host directory receiving artifacts
    pub output_dir: PathBuf,
    /// Directory where the per-iteration recipe instance is written
    pub recipe_dir: PathBuf,
    /// Image tag prefix; the tag is `<prefix>:<version>`
    pub image_prefix: String,
    /// Output location inside the container
    pub container_output_dir: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            skip_existing: false,
            dry_run: false,
            output_dir: PathBuf::from("prebuilt"),
            recipe_dir: PathBuf::from("."),
            image_prefix: "hicstraw-prebuilt".to_string(),
            container_output_dir: "/app/prebuilt".to_string(),
        }
    }
}

impl RunConfig {
    /// Image tag used for `version`.
    pub fn image_tag(&self, version: &VersionId) -> String {
        format!("{}:{}", self.image_prefix, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> VersionId {
        s.parse().unwrap()
    }

    #[test]
    fn test_version_rejects_shell_characters() {
        assert!("3.8; rm -rf /".parse::<VersionId>().is_err());
        assert!("".parse::<VersionId>().is_err());
        assert!("-3.8".parse::<VersionId>().is_err());
    }

    #[test]
    fn test_version_keeps_trailing_zero() {
        assert_eq!(v("3.10").as_str(), "3.10");
        assert_eq!(v(" 3.11 ").as_str(), "3.11");
    }

    #[test]
    fn test_parse_version_list_ignores_empty_entries() {
        let list = parse_version_list("3.8, 3.9,,3.10,").unwrap();
        assert_eq!(list, vec![v("3.8"), v("3.9"), v("3.10")]);
    }

    #[test]
    fn test_artifact_file_name_convention() {
        let naming = ArtifactNaming {
            arch: "x86_64".to_string(),
            ..ArtifactNaming::default()
        };
        assert_eq!(naming.file_name(&v("3.8")), "hicstraw.linux.x86_64.cp3.8-3.8.so");
        assert_eq!(
            naming.artifact_path(Path::new("prebuilt"), &v("3.10")),
            PathBuf::from("prebuilt/hicstraw.linux.x86_64.cp3.10-3.10.so")
        );
    }

    #[test]
    fn test_image_tag() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.image_tag(&v("3.9")), "hicstraw-prebuilt:3.9");
    }

    #[test]
    fn test_volume_arg() {
        let binding = VolumeBinding {
            host: PathBuf::from("/work/prebuilt"),
            container: "/app/prebuilt".to_string(),
        };
        assert_eq!(binding.to_volume_arg(), "/work/prebuilt:/app/prebuilt");
    }

    #[test]
    fn test_version_deserialize_rejects_float() {
        #[derive(Deserialize)]
        struct Doc {
            versions: Vec<VersionId>,
        }
        let err = toml::from_str::<Doc>("versions = [3.10]").err().unwrap();
        assert!(err.to_string().contains("quoted"));
        let ok: Doc = toml::from_str(r#"versions = ["3.10"]"#).unwrap();
        assert_eq!(ok.versions, vec![v("3.10")]);
    }
}
