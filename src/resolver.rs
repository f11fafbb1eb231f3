//! Locating the model files the engine needs.
//!
//! A candidate directory is valid when it holds both the model file and a
//! sibling `tokens.txt`. Candidates are tried in order and the first valid one
//! wins:
//!
//! 1. configured directory + configured (or default) file name
//! 2. [`DEFAULT_MODEL_DIR`] + [`DEFAULT_MODEL_NAME`]
//! 3. working directory + configured (or default) file name
//!
//! The auxiliary phonemizer data is expected in [`DATA_DIR_NAME`] next to the
//! chosen model file.

use std::io;
use std::path::{Path, PathBuf};

use derive_builder::Builder;

pub const DEFAULT_MODEL_DIR: &str = "models/vits-piper-en_US-libritts_r-medium";
pub const DEFAULT_MODEL_NAME: &str = "en_US-libritts_r-medium.onnx";
pub const TOKENS_FILE: &str = "tokens.txt";
pub const DATA_DIR_NAME: &str = "espeak-ng-data";

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("TTS model not found, tried: {}", display_paths(.tried))]
    NotFound { tried: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Absolute paths of everything the engine loads. Fixed once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub model: PathBuf,
    pub tokens: PathBuf,
    pub data_dir: PathBuf,
}

/// Outcome of checking a single path.
#[derive(Debug)]
pub enum Probe {
    Exists,
    Missing,
    /// The path could not be checked (permissions, I/O failure, ...).
    Inaccessible(io::Error),
}

impl Probe {
    pub fn path(path: &Path) -> Self {
        match path.try_exists() {
            Ok(true) => Probe::Exists,
            Ok(false) => Probe::Missing,
            Err(e) => Probe::Inaccessible(e),
        }
    }

    pub fn exists(&self) -> bool {
        matches!(self, Probe::Exists)
    }
}

/// Check one candidate directory, returning the model and tokens paths when
/// both exist. Empty folder or file names never validate.
pub fn validate_candidate(folder: &Path, file_name: &str) -> Option<(PathBuf, PathBuf)> {
    if folder.as_os_str().is_empty() || file_name.is_empty() {
        return None;
    }

    let model = folder.join(file_name);
    let tokens = folder.join(TOKENS_FILE);
    for path in [&model, &tokens] {
        match Probe::path(path) {
            Probe::Exists => {}
            Probe::Missing => return None,
            Probe::Inaccessible(e) => {
                log::debug!("Cannot probe {}: {e}", path.display());
                return None;
            }
        }
    }
    Some((model, tokens))
}

/// Ordered fallback search for the model files.
#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct ModelResolver {
    /// Folder from the configuration, if any.
    #[builder(setter(into, strip_option))]
    configured_dir: Option<PathBuf>,
    /// File name override from the configuration, if any.
    #[builder(setter(into, strip_option))]
    configured_name: Option<String>,
    #[builder(setter(into))]
    default_dir: PathBuf,
    #[builder(setter(into))]
    default_name: String,
    /// Base for relative candidates and the last-resort candidate itself.
    #[builder(setter(into))]
    working_dir: PathBuf,
}

impl Default for ModelResolver {
    fn default() -> Self {
        Self {
            configured_dir: None,
            configured_name: None,
            default_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            default_name: DEFAULT_MODEL_NAME.to_string(),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl ModelResolver {
    /// Resolver for a configured folder and optional file name override,
    /// relative to the process working directory.
    pub fn from_config(dir: Option<&Path>, name: Option<&str>) -> Self {
        Self {
            configured_dir: dir.map(Path::to_path_buf),
            configured_name: name.filter(|n| !n.is_empty()).map(str::to_string),
            ..Self::default()
        }
    }

    fn file_name(&self) -> &str {
        self.configured_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.default_name)
    }

    /// Candidate directories in priority order, anchored at the working dir.
    fn candidates(&self) -> Vec<(PathBuf, &str)> {
        let mut candidates = Vec::with_capacity(3);
        if let Some(dir) = &self.configured_dir {
            candidates.push((self.working_dir.join(dir), self.file_name()));
        }
        candidates.push((
            self.working_dir.join(&self.default_dir),
            self.default_name.as_str(),
        ));
        candidates.push((self.working_dir.clone(), self.file_name()));
        candidates
    }

    /// Walk the fallback chain and return the first valid set of files.
    pub fn resolve(&self) -> Result<ModelFiles, ResolveError> {
        let mut tried = Vec::new();

        for (dir, name) in self.candidates() {
            if let Some((model, tokens)) = validate_candidate(&dir, name) {
                let data_dir = model
                    .parent()
                    .map(|p| p.join(DATA_DIR_NAME))
                    .unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME));
                log::info!("Using TTS model {}", model.display());
                return Ok(ModelFiles {
                    model,
                    tokens,
                    data_dir,
                });
            }
            tried.push(dir.join(name));
        }

        Err(ResolveError::NotFound { tried })
    }
}
