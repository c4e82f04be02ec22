// ABOUTME: Template-source capability for loading template text by name
// ABOUTME: Includes a filesystem source confined to a configured template root

use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::error::{Result, TemplateError};

/// Loads raw template text for `@name` references and `import` directives
pub trait TemplateSource: fmt::Debug + Send + Sync {
    fn load(&self, name: &str) -> Result<String>;
}

/// Reads templates from files below a root directory. Names that would
/// leave the root, lexically or through symlinks, are rejected.
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    root: PathBuf,
}

impl FileSystemSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a named template inside the root
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let root = self
            .root
            .canonicalize()
            .map_err(|_| TemplateError::MissingTemplateRoot(self.root.clone()))?;

        let escapes = || TemplateError::PathEscapesRoot {
            path: name.to_string(),
            root: root.clone(),
        };

        let mut depth = 0usize;
        for component in Path::new(name).components() {
            match component {
                Component::Normal(_) => depth += 1,
                Component::CurDir => {}
                Component::ParentDir if depth > 0 => depth -= 1,
                _ => return Err(escapes()),
            }
        }

        let candidate = root
            .join(name)
            .canonicalize()
            .map_err(|_| TemplateError::TemplateNotFound(name.to_string()))?;
        if !candidate.starts_with(&root) {
            return Err(escapes());
        }
        if !candidate.is_file() {
            return Err(TemplateError::TemplateNotFound(name.to_string()));
        }
        Ok(candidate)
    }
}

impl TemplateSource for FileSystemSource {
    fn load(&self, name: &str) -> Result<String> {
        let path = self.resolve(name)?;
        debug!("Loading template '{}' from {}", name, path.display());
        Ok(std::fs::read_to_string(path)?)
    }
}
