//! Speech synthesis engines.
//!
//! This module contains implementations of text-to-speech engines.
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `vits` - VITS / Piper models (ONNX format, espeak-ng required)

#[cfg(feature = "vits")]
pub mod vits;
