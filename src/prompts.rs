//! Per-model prompt registry.
//!
//! Loaded once at startup from a directory of `<model>.txt` files and read
//! concurrently by every request afterwards. Uses a read-write lock so many
//! requests can look up prompts at once while a `set` is exclusive.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

const PROMPT_EXTENSION: &str = "txt";

/// Errors that can occur while loading prompt files.
#[derive(Debug, Error)]
pub enum PromptLoadError {
    #[error("failed to read prompt directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Thread-safe model name → prompt text mapping.
#[derive(Clone, Default)]
pub struct PromptRegistry {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl PromptRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every `<model>.txt` file in `dir`.
    ///
    /// A missing directory yields an empty registry. Subdirectories and
    /// files with other extensions are ignored; unreadable files are logged
    /// and skipped. Invalid UTF-8 is replaced with U+FFFD rather than
    /// rejecting the file.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, PromptLoadError> {
        let registry = Self::new();
        registry.load_from(dir.as_ref())?;
        Ok(registry)
    }

    /// Load prompt files from `dir` into this registry, returning how many were loaded.
    pub fn load_from(&self, dir: &Path) -> Result<usize, PromptLoadError> {
        if !dir.exists() {
            tracing::debug!(dir = %dir.display(), "prompt directory does not exist");
            return Ok(0);
        }

        let entries = std::fs::read_dir(dir).map_err(|source| PromptLoadError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut loaded = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(PROMPT_EXTENSION) {
                continue;
            }
            let Some(model) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            match std::fs::read(&path) {
                Ok(bytes) => {
                    let content = String::from_utf8_lossy(&bytes).into_owned();
                    tracing::debug!(model, bytes = content.len(), "loaded prompt");
                    self.set(model, content);
                    loaded += 1;
                }
                Err(err) => {
                    tracing::error!(path = %path.display(), error = %err, "failed to read prompt file");
                }
            }
        }

        Ok(loaded)
    }

    /// Insert or replace the prompt for `model`.
    pub fn set(&self, model: impl Into<String>, prompt: impl Into<String>) {
        self.inner.write().insert(model.into(), prompt.into());
    }

    /// Prompt registered for exactly `model`, if any.
    pub fn get(&self, model: &str) -> Option<String> {
        self.inner.read().get(model).cloned()
    }

    /// Sorted list of models with a registered prompt.
    pub fn models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.inner.read().keys().cloned().collect();
        models.sort();
        models
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
