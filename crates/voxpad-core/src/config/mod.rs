//! Persistent settings
//!
//! Device selections survive restarts in a YAML settings file under the
//! platform config directory. Selections are stored per role; a missing
//! entry means "use the host default".

pub mod io;
pub mod paths;

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::audio::config::{DeviceId, DeviceRole};

pub use io::{load_yaml, save_yaml};

/// Persisted device selections, one per role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub input_device: Option<DeviceId>,
    #[serde(default)]
    pub virtual_output_device: Option<DeviceId>,
    #[serde(default)]
    pub monitor_output_device: Option<DeviceId>,
}

impl Settings {
    /// Load settings from the default location
    pub fn load() -> Self {
        Self::load_from(&paths::settings_path())
    }

    pub fn load_from(path: &Path) -> Self {
        load_yaml(path)
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&paths::settings_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        save_yaml(self, path)
    }

    pub fn device_for(&self, role: DeviceRole) -> Option<&DeviceId> {
        match role {
            DeviceRole::Input => self.input_device.as_ref(),
            DeviceRole::VirtualOutput => self.virtual_output_device.as_ref(),
            DeviceRole::MonitorOutput => self.monitor_output_device.as_ref(),
        }
    }

    pub fn set_device_for(&mut self, role: DeviceRole, id: Option<DeviceId>) {
        match role {
            DeviceRole::Input => self.input_device = id,
            DeviceRole::VirtualOutput => self.virtual_output_device = id,
            DeviceRole::MonitorOutput => self.monitor_output_device = id,
        }
    }
}
