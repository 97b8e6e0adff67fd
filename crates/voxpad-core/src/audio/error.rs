//! Audio error types

use thiserror::Error;

/// Errors that can occur during audio operations
///
/// Everything here is caught at the operation boundary that triggered it and
/// surfaced as a warning or a no-op; no variant is allowed to take down the
/// engine.
#[derive(Error, Debug)]
pub enum AudioError {
    /// Device enumeration failed or found nothing
    #[error("Audio device enumeration failed: {0}")]
    Enumeration(String),

    /// Device not found by its persisted identifier
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// An output sink could not be bound to the requested device
    /// (non-fatal: the sink falls back to the host default)
    #[error("Failed to bind output sink to {device}: {reason}")]
    Binding { device: String, reason: String },

    /// Clip bytes could not be decoded as audio
    #[error("Failed to decode clip: {0}")]
    Decode(String),

    /// Play request against a clip id that no longer exists
    #[error("Unknown clip id: {0}")]
    UnknownClip(u64),

    /// Stop request against a voice that was never issued
    #[error("Unknown voice id: {0}")]
    UnknownVoice(u64),

    /// Microphone capture was denied by the host
    #[error("Microphone capture denied: {0}")]
    PermissionDenied(String),

    /// Failed to get a usable device configuration
    #[error("Failed to get device config: {0}")]
    Config(String),

    /// Failed to build an audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    /// Failed to start an audio stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlay(String),

    /// Input device cannot run at the engine sample rate
    #[error("Sample rate mismatch: engine={engine}Hz, device={device}Hz")]
    SampleRateMismatch { engine: u32, device: u32 },
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
