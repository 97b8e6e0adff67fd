//! Standard paths for voxpad configuration files

use std::path::PathBuf;

/// Get the voxpad configuration directory
///
/// Returns the platform config dir plus `voxpad` (e.g.
/// `~/.config/voxpad` on Linux), falling back to the current directory
/// when the platform dir cannot be determined.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("voxpad")
}

/// Path of the settings file (device selections)
pub fn settings_path() -> PathBuf {
    config_dir().join("settings.yaml")
}

/// Path of the persisted clip list
pub fn clips_path() -> PathBuf {
    config_dir().join("clips.yaml")
}
