//! Audio device layer
//!
//! Device enumeration across all cpal hosts, microphone capture, and the
//! output sink manager that binds the mix bus to the virtual and monitor
//! output devices.

pub mod config;
pub mod device;
pub mod error;
pub mod input;
pub mod output;

pub use config::{DeviceId, DeviceRole, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE};
pub use device::{list_devices, AudioDeviceInfo, DeviceList};
pub use error::{AudioError, AudioResult};
pub use input::MicCapture;
pub use output::SinkManager;
