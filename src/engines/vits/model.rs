use std::path::Path;

use ndarray::{arr1, Array2};
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use crate::ModelFiles;

use super::phonemizer::{phonemize, EspeakConfig};
use super::tokens::TokenTable;

/// Sample rate assumed when the model metadata does not declare one.
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// espeak-ng voice assumed when the model metadata does not declare one.
pub const DEFAULT_VOICE: &str = "en-us";

pub const NOISE_SCALE: f32 = 0.667;
pub const NOISE_SCALE_W: f32 = 0.8;

#[derive(thiserror::Error, Debug)]
pub enum VitsError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    PhonemizerFailed(String),
    #[error("Model not loaded. Call load_model() first.")]
    ModelNotLoaded,
    #[error("Invalid tokens.txt: {0}")]
    Tokens(String),
}

/// How the model takes its noise and length scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalesInput {
    /// Piper export: one `scales` tensor `[noise, length, noise_w]`.
    Combined,
    /// sherpa-onnx export: `noise_scale`, `length_scale`, `noise_scale_w`.
    Separate,
}

/// Internal VITS ONNX model state.
pub struct VitsModel {
    session: Session,
    tokens: TokenTable,
    sample_rate: u32,
    num_speakers: i64,
    voice: String,
    /// Detected input names.
    tokens_input_name: String,
    lengths_input_name: String,
    scales_input: ScalesInput,
    has_sid_input: bool,
}

impl VitsModel {
    pub fn load(files: &ModelFiles, num_threads: Option<usize>) -> Result<Self, VitsError> {
        log::info!("Loading VITS model from {}", files.model.display());
        let session = init_session(&files.model, num_threads)?;

        let tokens = TokenTable::load(&files.tokens)?;
        log::info!("Loaded {} tokens from {}", tokens.len(), files.tokens.display());

        let sample_rate = metadata_value(&session, "sample_rate")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SAMPLE_RATE);
        let num_speakers = metadata_value(&session, "n_speakers")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1i64)
            .max(1);
        let voice = metadata_value(&session, "voice").unwrap_or_else(|| DEFAULT_VOICE.to_string());

        let tokens_input_name = detect_input(&session, &["x", "input"], "x");
        let lengths_input_name = detect_input(&session, &["x_length", "input_lengths"], "x_length");
        let scales_input = if has_input(&session, "scales") {
            ScalesInput::Combined
        } else {
            ScalesInput::Separate
        };
        let has_sid_input = has_input(&session, "sid");

        log::info!(
            "Detected: tokens_input='{}', scales={:?}, speakers={}, sample_rate={}, voice='{}'",
            tokens_input_name,
            scales_input,
            num_speakers,
            sample_rate,
            voice
        );

        Ok(Self {
            session,
            tokens,
            sample_rate,
            num_speakers,
            voice,
            tokens_input_name,
            lengths_input_name,
            scales_input,
            has_sid_input,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_speakers(&self) -> i64 {
        self.num_speakers
    }

    /// Synthesize audio for `text` with the given speaker and speed.
    pub fn synthesize_text(
        &mut self,
        text: &str,
        speaker_id: i64,
        speed: f32,
        espeak: &EspeakConfig,
    ) -> Result<Vec<f32>, VitsError> {
        let phonemes = phonemize(text, &self.voice, espeak)?;
        let ids = self.tokens.encode(&phonemes);

        // BOS + PAD + EOS alone carry no speech.
        if ids.len() <= 3 {
            log::warn!("No phoneme tokens produced for text: {text:?}");
            return Ok(vec![]);
        }

        let sid = if (0..self.num_speakers).contains(&speaker_id) {
            speaker_id
        } else {
            log::warn!(
                "Speaker {speaker_id} out of range (model has {}), using 0",
                self.num_speakers
            );
            0
        };

        let length_scale = if speed > 0.0 { 1.0 / speed } else { 1.0 };
        self.run(&ids, sid, length_scale)
    }

    /// Run ONNX inference on a full token sequence.
    fn run(&mut self, ids: &[i64], sid: i64, length_scale: f32) -> Result<Vec<f32>, VitsError> {
        let tokens_arr = Array2::from_shape_vec((1, ids.len()), ids.to_vec())?;
        let lengths_arr = arr1(&[ids.len() as i64]);
        let sid_arr = arr1(&[sid]);
        let scales_arr = arr1(&[NOISE_SCALE, length_scale, NOISE_SCALE_W]);
        let noise_arr = arr1(&[NOISE_SCALE]);
        let length_arr = arr1(&[length_scale]);
        let noise_w_arr = arr1(&[NOISE_SCALE_W]);

        let mut inputs = inputs![
            self.tokens_input_name.as_str() => TensorRef::from_array_view(tokens_arr.view())?,
            self.lengths_input_name.as_str() => TensorRef::from_array_view(lengths_arr.view())?,
        ];
        match self.scales_input {
            ScalesInput::Combined => inputs.extend(inputs![
                "scales" => TensorRef::from_array_view(scales_arr.view())?,
            ]),
            ScalesInput::Separate => inputs.extend(inputs![
                "noise_scale" => TensorRef::from_array_view(noise_arr.view())?,
                "length_scale" => TensorRef::from_array_view(length_arr.view())?,
                "noise_scale_w" => TensorRef::from_array_view(noise_w_arr.view())?,
            ]),
        }
        if self.has_sid_input {
            inputs.extend(inputs![
                "sid" => TensorRef::from_array_view(sid_arr.view())?,
            ]);
        }

        let output = self.session.run(inputs)?;

        // First output is the waveform, shaped [1, 1, n] or [1, n].
        let first_output = output
            .iter()
            .next()
            .ok_or_else(|| VitsError::Ort(ort::Error::new("No output from model")))?;
        let waveform = first_output.1.try_extract_array::<f32>()?;

        Ok(waveform.iter().copied().collect())
    }
}

fn init_session(onnx_path: &Path, num_threads: Option<usize>) -> Result<Session, VitsError> {
    let providers = vec![CPUExecutionProvider::default().build()];

    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers(providers)?;

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(onnx_path)?)
}

/// Read a custom metadata entry written by the model exporter.
fn metadata_value(session: &Session, key: &str) -> Option<String> {
    session.metadata().ok()?.custom(key).ok().flatten()
}

fn has_input(session: &Session, name: &str) -> bool {
    session.inputs().iter().any(|input| input.name() == name)
}

/// Pick the first of `candidates` the session declares as an input.
fn detect_input(session: &Session, candidates: &[&str], default: &str) -> String {
    candidates
        .iter()
        .find(|name| has_input(session, name))
        .unwrap_or(&default)
        .to_string()
}
