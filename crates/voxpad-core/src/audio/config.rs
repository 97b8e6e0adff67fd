//! Audio device identity and stream configuration constants

use serde::{Deserialize, Serialize};

/// Maximum buffer size to pre-allocate (covers typical configurations)
/// Common values: 64, 128, 256, 512, 1024, 2048, 4096 frames
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Default buffer size when no preference is specified (frames)
/// 512 frames is a safe default that works on most systems
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// The role an audio device plays in the soundboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceRole {
    /// Microphone capture source
    Input,
    /// The mix destination exposed as a virtual microphone
    VirtualOutput,
    /// Operator monitoring output
    MonitorOutput,
}

impl DeviceRole {
    pub const ALL: [DeviceRole; 3] = [
        DeviceRole::Input,
        DeviceRole::VirtualOutput,
        DeviceRole::MonitorOutput,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DeviceRole::Input => "input",
            DeviceRole::VirtualOutput => "virtual output",
            DeviceRole::MonitorOutput => "monitor output",
        }
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, WASAPI, etc.)
/// so a persisted selection survives on systems with multiple audio backends
/// exposing devices under the same name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g., "Alsa", "CoreAudio")
    /// If None, uses the default/preferred host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_label() {
        let bare = DeviceId::new("default");
        assert_eq!(bare.display_label(), "default");

        let hosted = DeviceId::with_host("hw:0,0", "ALSA");
        assert_eq!(hosted.display_label(), "[ALSA] hw:0,0");
    }

    #[test]
    fn test_device_id_yaml_roundtrip() {
        let id = DeviceId::with_host("Scarlett 2i2", "ALSA");
        let yaml = serde_yaml::to_string(&id).unwrap();
        let back: DeviceId = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, id);
    }
}
