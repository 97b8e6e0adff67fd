//! Audio engine - mix bus, voices, tone, distortion
//!
//! Core processing components for the soundboard:
//! - MixEngine: the single mix bus everything sums into
//! - Voice: one-shot clip playback instances
//! - ToneGenerator: the held whistle/bass/censor tones
//! - DistortionStage: swap-on-change waveshaping
//! - EngineCommand: lock-free UI → audio thread control

mod command;
mod distortion;
mod engine;
mod tone;
mod voice;

pub use command::*;
pub use distortion::*;
pub use engine::*;
pub use tone::*;
pub use voice::*;
