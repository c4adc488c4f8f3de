//! Template sources.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::UNIX_EPOCH;

use crate::error::LoadError;

/// Raw template source with the data the cache keys on.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTemplate {
    /// Stable identity such as an absolute path.
    pub identity: String,
    /// Modification time in seconds; a change invalidates cached output.
    pub mtime: f64,
    pub source: String,
}

/// Loads templates by name.
pub trait TemplateLoader: Send + Sync {
    /// Load `name`; `Ok(None)` if no such template exists.
    fn load(&self, name: &str) -> Result<Option<LoadedTemplate>, LoadError>;
}

impl<T: TemplateLoader + ?Sized> TemplateLoader for Arc<T> {
    fn load(&self, name: &str) -> Result<Option<LoadedTemplate>, LoadError> {
        (**self).load(name)
    }
}

/// Reject absolute names and names containing `..`.
fn validate_name(name: &str) -> Result<&Path, LoadError> {
    let path = Path::new(name);
    let valid = !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if valid {
        Ok(path)
    } else {
        Err(LoadError::InvalidName(name.to_owned()))
    }
}

/// Loads templates from an ordered list of directories.
///
/// The first directory containing the template wins.
#[derive(Debug, Clone)]
pub struct FsLoader {
    dirs: Vec<PathBuf>,
}

impl FsLoader {
    #[must_use]
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl TemplateLoader for FsLoader {
    fn load(&self, name: &str) -> Result<Option<LoadedTemplate>, LoadError> {
        let relative = validate_name(name)?;

        for dir in &self.dirs {
            let path = dir.join(relative);
            let metadata = match std::fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(LoadError::Io { path, source }),
            };
            let source = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
                .map_or(0.0, |elapsed| elapsed.as_secs_f64());

            tracing::debug!(name, path = %path.display(), "Loaded template");
            return Ok(Some(LoadedTemplate {
                identity: path.to_string_lossy().into_owned(),
                mtime,
                source,
            }));
        }

        Ok(None)
    }
}

/// In-memory templates, mainly for tests and embedding.
///
/// Every insert bumps the template's modification time.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    templates: RwLock<HashMap<String, (f64, String)>>,
}

impl MemoryLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template, builder style.
    #[must_use]
    pub fn with_template(self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    /// Add or replace a template.
    pub fn insert(&self, name: impl Into<String>, source: impl Into<String>) {
        let mut templates = self.templates.write().unwrap_or_else(PoisonError::into_inner);
        let name = name.into();
        let mtime = templates.get(&name).map_or(1.0, |(mtime, _)| mtime + 1.0);
        templates.insert(name, (mtime, source.into()));
    }
}

impl TemplateLoader for MemoryLoader {
    fn load(&self, name: &str) -> Result<Option<LoadedTemplate>, LoadError> {
        validate_name(name)?;
        let templates = self.templates.read().unwrap_or_else(PoisonError::into_inner);
        Ok(templates.get(name).map(|(mtime, source)| LoadedTemplate {
            identity: format!("memory:{name}"),
            mtime: *mtime,
            source: source.clone(),
        }))
    }
}
