//! Voxpad Core - Soundboard audio engine
//!
//! Captures microphone input, mixes it with user-loaded clips and synthesized
//! tones, applies optional waveshaping distortion and a master gain, and fans
//! the mix out to a virtual output device (for use as a virtual microphone)
//! plus an optional monitoring output.

pub mod audio;
pub mod config;
pub mod engine;
pub mod library;
pub mod soundboard;
pub mod types;

pub use soundboard::{Notification, Soundboard};
pub use types::*;
