//! Synthesis adapter: voice lookup, engine call, WAV encoding and playback.

use std::path::{Path, PathBuf};

use crate::playback::AudioSink;
use crate::resolver::ModelResolver;
use crate::voices::speaker_for_voice;
use crate::{Job, SynthesisEngine};

/// Resolve the model files and load them into `engine`.
///
/// Returns `None` when resolution or loading fails; the failure is logged and
/// not retried.
pub fn init_engine<E: SynthesisEngine>(
    mut engine: E,
    params: E::ModelParams,
    resolver: &ModelResolver,
) -> Option<E> {
    log::info!("Initializing speech engine");
    let files = match resolver.resolve() {
        Ok(files) => files,
        Err(e) => {
            log::error!("FATAL: {e}");
            return None;
        }
    };

    match engine.load_model_with_params(&files, params) {
        Ok(()) => {
            log::info!("Speech engine started");
            Some(engine)
        }
        Err(e) => {
            log::error!("Speech engine failed to start: {e}");
            None
        }
    }
}

/// Turns jobs into audio on disk and plays it.
pub struct SpeechPipeline<E, S> {
    engine: Option<E>,
    sink: S,
    output_path: PathBuf,
}

impl<E: SynthesisEngine, S: AudioSink> SpeechPipeline<E, S> {
    /// `engine` is `None` when initialisation failed; every request is then a
    /// no-op.
    pub fn new(engine: Option<E>, sink: S, output_path: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            sink,
            output_path: output_path.into(),
        }
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Synthesize `job` and encode it to the output file.
    ///
    /// Returns `true` when a file is ready to be played.
    pub fn render(&mut self, job: &Job) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };

        let speaker = speaker_for_voice(&job.voice_id);
        log::debug!(
            "Synthesizing {} bytes with voice {:?} (speaker {speaker}) at {}x",
            job.text.len(),
            job.voice_id,
            job.speed
        );

        let result = match engine.synthesize(&job.text, speaker, job.speed) {
            Ok(result) if !result.is_empty() => result,
            Ok(_) => {
                log::debug!("Engine produced no audio");
                return false;
            }
            Err(e) => {
                log::warn!("Synthesis failed: {e}");
                return false;
            }
        };

        // `result` is dropped at the end of this scope, releasing the buffer.
        match result.write_wav(&self.output_path) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Cannot write {}: {e}", self.output_path.display());
                false
            }
        }
    }

    /// Play the last rendered file. Failures are logged and otherwise ignored.
    pub fn play(&self) {
        if let Err(e) = self.sink.play(&self.output_path) {
            log::warn!("Playback failed: {e}");
        }
    }

    /// Render and play in one step.
    pub fn speak(&mut self, job: &Job) {
        if self.render(job) {
            self.play();
        }
    }

    /// Tear down the engine. Called once at shutdown.
    pub fn shutdown(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.unload_model();
            log::info!("Speech engine released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::PlaybackError;
    use crate::{ModelFiles, SynthesisResult};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeEngine {
        samples: Vec<f32>,
        fail: bool,
        calls: Rc<RefCell<Vec<(String, i64, f32)>>>,
    }

    impl SynthesisEngine for FakeEngine {
        type ModelParams = ();

        fn load_model_with_params(
            &mut self,
            _files: &ModelFiles,
            _params: (),
        ) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }

        fn unload_model(&mut self) {}

        fn synthesize(
            &mut self,
            text: &str,
            speaker_id: i64,
            speed: f32,
        ) -> Result<SynthesisResult, Box<dyn std::error::Error>> {
            self.calls
                .borrow_mut()
                .push((text.to_string(), speaker_id, speed));
            if self.fail {
                return Err("engine exploded".into());
            }
            Ok(SynthesisResult {
                samples: self.samples.clone(),
                sample_rate: 22050,
            })
        }
    }

    #[derive(Default, Clone)]
    struct RecordingSink {
        played: Rc<RefCell<Vec<PathBuf>>>,
    }

    impl AudioSink for RecordingSink {
        fn play(&self, path: &Path) -> Result<(), PlaybackError> {
            self.played.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    fn job(voice: &str) -> Job {
        Job {
            text: "Hello world".to_string(),
            voice_id: voice.to_string(),
            speed: 1.25,
        }
    }

    #[test]
    fn renders_and_plays_with_mapped_speaker() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("temp_tts.wav");
        let engine = FakeEngine {
            samples: vec![0.1, -0.2, 0.3],
            ..Default::default()
        };
        let calls = engine.calls.clone();
        let sink = RecordingSink::default();
        let mut pipeline = SpeechPipeline::new(Some(engine), sink.clone(), &out);

        pipeline.speak(&job("3"));

        assert_eq!(
            calls.borrow().as_slice(),
            &[("Hello world".to_string(), 2, 1.25)]
        );
        assert_eq!(sink.played.borrow().as_slice(), &[out.clone()]);
        assert_eq!(hound::WavReader::open(&out).unwrap().len(), 3);
    }

    #[test]
    fn unknown_voice_uses_speaker_zero() {
        let dir = tempdir().unwrap();
        let engine = FakeEngine {
            samples: vec![0.0],
            ..Default::default()
        };
        let calls = engine.calls.clone();
        let mut pipeline =
            SpeechPipeline::new(Some(engine), RecordingSink::default(), dir.path().join("o.wav"));

        pipeline.speak(&job("unknown"));
        assert_eq!(calls.borrow()[0].1, 0);
    }

    #[test]
    fn empty_result_skips_encode_and_playback() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("temp_tts.wav");
        let sink = RecordingSink::default();
        let mut pipeline = SpeechPipeline::new(Some(FakeEngine::default()), sink.clone(), &out);

        assert!(!pipeline.render(&job("1")));
        pipeline.speak(&job("1"));
        assert!(!out.exists());
        assert!(sink.played.borrow().is_empty());
    }

    #[test]
    fn engine_error_skips_encode_and_playback() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("temp_tts.wav");
        let engine = FakeEngine {
            samples: vec![0.5],
            fail: true,
            ..Default::default()
        };
        let sink = RecordingSink::default();
        let mut pipeline = SpeechPipeline::new(Some(engine), sink.clone(), &out);

        pipeline.speak(&job("1"));
        assert!(!out.exists());
        assert!(sink.played.borrow().is_empty());
    }

    #[test]
    fn unwritable_output_skips_playback() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("missing").join("temp_tts.wav");
        let engine = FakeEngine {
            samples: vec![0.5],
            ..Default::default()
        };
        let sink = RecordingSink::default();
        let mut pipeline = SpeechPipeline::new(Some(engine), sink.clone(), &out);

        pipeline.speak(&job("1"));
        assert!(sink.played.borrow().is_empty());
    }

    #[test]
    fn missing_engine_is_a_no_op() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("temp_tts.wav");
        let sink = RecordingSink::default();
        let mut pipeline: SpeechPipeline<FakeEngine, _> =
            SpeechPipeline::new(None, sink.clone(), &out);

        assert!(!pipeline.has_engine());
        pipeline.speak(&job("1"));
        assert!(!out.exists());
        assert!(sink.played.borrow().is_empty());
    }

    #[test]
    fn init_engine_without_model_leaves_engine_unset() {
        let dir = tempdir().unwrap();
        let resolver = crate::resolver::ModelResolverBuilder::default()
            .default_dir(dir.path().join("default"))
            .working_dir(dir.path())
            .build()
            .unwrap();

        assert!(init_engine(FakeEngine::default(), (), &resolver).is_none());
    }
}
