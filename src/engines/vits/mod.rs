//! VITS (Piper) text-to-speech engine.
//!
//! Runs single- or multi-speaker VITS models exported to ONNX, as shipped in
//! the `vits-piper-*` model packs. Phonemes come from espeak-ng.
//!
//! # System Requirements
//!
//! The **espeak-ng** binary must be on PATH. Its language data is taken from
//! the `espeak-ng-data` directory shipped next to the model when present.
//!
//! # Model Directory Layout
//!
//! ```text
//! models/vits-piper-en_US-libritts_r-medium/
//! ├── en_US-libritts_r-medium.onnx   # VITS generator
//! ├── tokens.txt                     # "<symbol> <id>" per line
//! └── espeak-ng-data/                # phonemizer data
//! ```
//!
//! The sample rate, speaker count and espeak voice are read from the ONNX
//! metadata (`sample_rate`, `n_speakers`, `voice`).
//!
//! # Example
//!
//! ```rust,no_run
//! use voice_bridge::{SynthesisEngine, ModelResolver, engines::vits::VitsEngine};
//!
//! let files = ModelResolver::default().resolve()?;
//! let mut engine = VitsEngine::new();
//! engine.load_model(&files)?;
//!
//! let result = engine.synthesize("Hello, world!", 1, 1.0)?;
//! println!("Generated {} samples at {}Hz", result.samples.len(), result.sample_rate);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engine;
pub mod model;
pub mod phonemizer;
pub mod tokens;

pub use engine::{VitsEngine, VitsModelParams};
pub use model::VitsError;
