//! Build recipes: template rendering and the per-iteration recipe file.
//!
//! A [`RecipeTemplate`] is rendered once per version into a
//! [`RecipeInstance`], a Dockerfile on disk that lives for exactly one
//! iteration and is removed with [`RecipeInstance::release`].

pub mod templates;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RecipeError;
use crate::models::VersionId;
pub use templates::{DEFAULT_DOCKERFILE, VERSION_PLACEHOLDER};

/// Recipe text with a single version placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeTemplate {
    text: String,
}

impl Default for RecipeTemplate {
    fn default() -> Self {
        RecipeTemplate {
            text: DEFAULT_DOCKERFILE.to_string(),
        }
    }
}

impl RecipeTemplate {
    /// Wrap template text. Fails if the placeholder is missing.
    pub fn new(text: impl Into<String>) -> Result<Self, RecipeError> {
        let text = text.into();
        if !text.contains(VERSION_PLACEHOLDER) {
            return Err(RecipeError::MissingPlaceholder(VERSION_PLACEHOLDER));
        }
        Ok(RecipeTemplate { text })
    }

    /// Load a custom template from disk.
    pub fn from_file(path: &Path) -> Result<Self, RecipeError> {
        let text = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RecipeError::TemplateNotFound(path.display().to_string())
            } else {
                RecipeError::IoError(e)
            }
        })?;
        Self::new(text)
    }

    /// Substitute `version` into every occurrence of the placeholder.
    pub fn render(&self, version: &VersionId) -> String {
        self.text.replace(VERSION_PLACEHOLDER, version.as_str())
    }
}

/// A rendered recipe written to disk for one iteration.
///
/// Not removed on drop: if the run aborts mid-iteration the file stays
/// behind for inspection.
#[derive(Debug)]
pub struct RecipeInstance {
    path: PathBuf,
}

impl RecipeInstance {
    /// File name used for the recipe instance of `version`.
    pub fn file_name(version: &VersionId) -> String {
        format!("Dockerfile.{}", version)
    }

    /// Render `template` for `version` and write it into `dir`.
    pub fn materialize(
        template: &RecipeTemplate,
        version: &VersionId,
        dir: &Path,
    ) -> Result<Self, RecipeError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::file_name(version));
        fs::write(&path, template.render(version))?;
        log::debug!("[Recipe] Wrote {}", path.display());
        Ok(RecipeInstance { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the recipe file.
    pub fn release(self) -> Result<(), RecipeError> {
        fs::remove_file(&self.path)?;
        log::debug!("[Recipe] Removed {}", self.path.display());
        Ok(())
    }
}
