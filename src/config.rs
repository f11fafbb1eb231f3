use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::mailbox::{default_segment_dir, SEGMENT_NAME};
use crate::resolver::ModelResolver;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Worker settings, read from a JSON file. Every field is optional.
///
/// ```json
/// {
///   "tts_model_path": "D:/voices/libritts",
///   "tts_model_alt_name": "en_US-libritts_r-medium.onnx",
///   "poll_interval_ms": 10
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Folder holding the model and `tokens.txt`.
    pub tts_model_path: Option<PathBuf>,
    /// Model file name inside `tts_model_path`.
    pub tts_model_alt_name: Option<String>,
    /// Where each rendered job is written before playback.
    pub output_file: PathBuf,
    pub log_file: PathBuf,
    pub poll_interval_ms: u64,
    /// Inference threads for the engine.
    pub num_threads: usize,
    /// Directory backing the named shared segment.
    pub segment_dir: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tts_model_path: None,
            tts_model_alt_name: None,
            output_file: PathBuf::from("temp_tts.wav"),
            log_file: PathBuf::from("voice_bridge_audio.log"),
            poll_interval_ms: 10,
            num_threads: 2,
            segment_dir: None,
        }
    }
}

impl WorkerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Like [`WorkerConfig::load`], but a missing or broken file yields the
    /// defaults.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Using default config ({}: {e})", path.display());
                Self::default()
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn segment_path(&self) -> PathBuf {
        self.segment_dir
            .clone()
            .unwrap_or_else(default_segment_dir)
            .join(SEGMENT_NAME)
    }

    pub fn resolver(&self) -> ModelResolver {
        ModelResolver::from_config(
            self.tts_model_path.as_deref(),
            self.tts_model_alt_name.as_deref(),
        )
    }
}
