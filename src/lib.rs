//! # voice-bridge
//!
//! Out-of-process speech synthesis for host applications.
//!
//! A host process posts synthesis jobs into a small shared-memory mailbox; a
//! worker process polls the mailbox, renders each job with a text-to-speech
//! engine, writes the audio to a WAV file and plays it.
//!
//! ## Features
//!
//! - **Shared mailbox**: one pending job at a time, fixed binary layout, no locks
//! - **Model resolution**: ordered fallback search for the model and tokens files
//! - **VITS engine** (`vits` feature): Piper/VITS ONNX models with espeak-ng phonemes
//! - **Playback** (`playback` feature): blocking playback on the default device
//!
//! ## Quick Start
//!
//! Host side:
//!
//! ```no_run
//! use voice_bridge::ProducerEndpoint;
//!
//! let bridge = ProducerEndpoint::new();
//! bridge.send("Hello world", "2", 1.0);
//! while bridge.is_talking() || bridge.has_pending_job() {
//!     std::thread::sleep(std::time::Duration::from_millis(50));
//! }
//! ```
//!
//! Worker side:
//!
//! ```ignore
//! use voice_bridge::{engines::vits::VitsEngine, playback::RodioSink, lifecycle, WorkerConfig};
//!
//! let config = WorkerConfig::load_or_default("voice_bridge.json".as_ref());
//! let handle = lifecycle::attach(move |shutdown| {
//!     voice_bridge::worker::script_main(&config, VitsEngine::new(), Default::default(), RodioSink, &shutdown)
//! })?;
//! // ... later, on unload
//! handle.detach();
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod bridge;
pub mod config;
pub mod engines;
pub mod lifecycle;
pub mod logging;
pub mod mailbox;
pub mod pipeline;
pub mod playback;
pub mod resolver;
pub mod voices;
pub mod wav;
pub mod worker;

pub use bridge::{ConsumerEndpoint, ProducerEndpoint};
pub use config::WorkerConfig;
pub use mailbox::Job;
pub use resolver::{ModelFiles, ModelResolver};
pub use worker::{Worker, WorkerState};

use std::path::Path;

/// The result of a synthesis (text-to-speech) operation.
///
/// Contains raw f32 audio samples and the sample rate of the output audio.
/// The buffer is owned by the caller and freed when the result is dropped.
#[derive(Debug)]
pub struct SynthesisResult {
    /// Raw mono audio samples, nominally in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate of the audio
    pub sample_rate: u32,
}

impl SynthesisResult {
    /// Write the audio to a 16-bit PCM WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), wav::WavError> {
        wav::write_pcm16(path, &self.samples, self.sample_rate)
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Common interface for text-to-speech synthesis engines.
///
/// The worker only ever talks to an engine through this trait, so the
/// inference backend can be swapped (or replaced by a test double).
pub trait SynthesisEngine {
    /// Parameters for configuring model loading (threads, etc.)
    type ModelParams: Default;

    /// Load a model from resolved files using default parameters.
    fn load_model(&mut self, files: &ModelFiles) -> Result<(), Box<dyn std::error::Error>> {
        self.load_model_with_params(files, Self::ModelParams::default())
    }

    /// Load a model from resolved files with custom parameters.
    fn load_model_with_params(
        &mut self,
        files: &ModelFiles,
        params: Self::ModelParams,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Unload the currently loaded model and free associated resources.
    fn unload_model(&mut self);

    /// Synthesize speech for `text` with the given speaker index and speed
    /// multiplier (1.0 = nominal rate).
    ///
    /// An empty sample buffer means there is nothing to play.
    fn synthesize(
        &mut self,
        text: &str,
        speaker_id: i64,
        speed: f32,
    ) -> Result<SynthesisResult, Box<dyn std::error::Error>>;

    /// Synthesize speech and write it to a WAV file.
    ///
    /// Default implementation calls `synthesize()` then `SynthesisResult::write_wav()`.
    fn synthesize_to_file(
        &mut self,
        text: &str,
        speaker_id: i64,
        speed: f32,
        wav_path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.synthesize(text, speaker_id, speed)?.write_wav(wav_path)?;
        Ok(())
    }
}
