use crate::{ModelFiles, SynthesisEngine, SynthesisResult};

use super::model::{VitsError, VitsModel};
use super::phonemizer::EspeakConfig;

/// Parameters for configuring VITS model loading.
#[derive(Debug, Clone)]
pub struct VitsModelParams {
    /// Number of CPU threads to use for inference.
    pub num_threads: Option<usize>,
    /// Override the espeak-ng binary (default: `espeak-ng` from PATH).
    pub espeak_bin: Option<std::path::PathBuf>,
}

impl Default for VitsModelParams {
    fn default() -> Self {
        Self {
            num_threads: Some(2),
            espeak_bin: None,
        }
    }
}

/// VITS text-to-speech engine.
///
/// ```rust,no_run
/// use voice_bridge::{SynthesisEngine, ModelFiles, engines::vits::VitsEngine};
/// use std::path::PathBuf;
///
/// let files = ModelFiles {
///     model: PathBuf::from("/voices/en_US-libritts_r-medium.onnx"),
///     tokens: PathBuf::from("/voices/tokens.txt"),
///     data_dir: PathBuf::from("/voices/espeak-ng-data"),
/// };
/// let mut engine = VitsEngine::new();
/// engine.load_model(&files)?;
/// engine.synthesize_to_file("Hello!", 0, 1.0, &PathBuf::from("out.wav"))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Default)]
pub struct VitsEngine {
    model: Option<VitsModel>,
    espeak: EspeakConfig,
}

impl VitsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Number of speakers in the loaded model (0 if none is loaded).
    pub fn num_speakers(&self) -> i64 {
        self.model.as_ref().map(|m| m.num_speakers()).unwrap_or(0)
    }
}

impl Drop for VitsEngine {
    fn drop(&mut self) {
        self.unload_model();
    }
}

impl SynthesisEngine for VitsEngine {
    type ModelParams = VitsModelParams;

    fn load_model_with_params(
        &mut self,
        files: &ModelFiles,
        params: Self::ModelParams,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let model = VitsModel::load(files, params.num_threads)?;
        self.espeak = EspeakConfig {
            bin_path: params.espeak_bin,
            data_path: files.data_dir.is_dir().then(|| files.data_dir.clone()),
        };
        self.model = Some(model);
        Ok(())
    }

    fn unload_model(&mut self) {
        self.model = None;
    }

    fn synthesize(
        &mut self,
        text: &str,
        speaker_id: i64,
        speed: f32,
    ) -> Result<SynthesisResult, Box<dyn std::error::Error>> {
        let model = self.model.as_mut().ok_or(VitsError::ModelNotLoaded)?;
        let samples = model.synthesize_text(text, speaker_id, speed, &self.espeak)?;

        Ok(SynthesisResult {
            samples,
            sample_rate: model.sample_rate(),
        })
    }
}
