//! Audio device enumeration and lookup
//!
//! Enumerates devices from ALL available audio hosts so the operator can pick
//! any input for the mic, any output as the virtual microphone destination,
//! and any other output for monitoring. On Linux that typically means seeing
//! both PipeWire's merged view and ALSA's raw hardware devices.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Host, HostId};

use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

/// Get a human-readable name for a host ID
fn host_name(host_id: HostId) -> String {
    // Use the debug representation which gives us the variant name
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

/// Get a host by its name string
fn get_host_by_name(name: &str) -> Option<Host> {
    for host_id in cpal::available_hosts() {
        if host_name(host_id) == name {
            return cpal::host_from_id(host_id).ok();
        }
    }
    None
}

/// Whether a device is enumerated for capture or playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

/// Information about one enumerated audio device
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    /// Device identifier for configuration (includes host info)
    pub id: DeviceId,
    /// Human-readable device name
    pub name: String,
    /// Host backend name (e.g., "ALSA", "WASAPI")
    pub host: String,
    /// Whether this is the system default device for its host
    pub is_default: bool,
    /// Maximum channel count in the relevant direction
    pub max_channels: u16,
}

impl std::fmt::Display for AudioDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.host, self.name)
    }
}

/// The device lists a UI needs to populate its selectors
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    pub inputs: Vec<AudioDeviceInfo>,
    pub outputs: Vec<AudioDeviceInfo>,
}

impl DeviceList {
    /// Check whether a persisted selection is still enumerable
    pub fn contains_input(&self, id: &DeviceId) -> bool {
        self.inputs.iter().any(|d| &d.id == id)
    }

    /// Check whether a persisted selection is still enumerable
    pub fn contains_output(&self, id: &DeviceId) -> bool {
        self.outputs.iter().any(|d| &d.id == id)
    }
}

/// Enumerate all input and output devices from every available host
///
/// Enumeration failures on individual hosts are skipped; a host that denies
/// enumeration entirely yields empty lists rather than an error, so callers
/// can degrade gracefully.
pub fn list_devices() -> AudioResult<DeviceList> {
    let hosts = cpal::available_hosts();
    if hosts.is_empty() {
        return Err(AudioError::Enumeration(
            "no audio hosts available".to_string(),
        ));
    }

    let mut list = DeviceList::default();

    for host_id in hosts {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("Could not initialize host {:?}: {}", host_id, e);
                continue;
            }
        };

        collect_devices(&host, host_id, Direction::Input, &mut list.inputs);
        collect_devices(&host, host_id, Direction::Output, &mut list.outputs);
    }

    // Sort: default devices first, then by host, then by name
    for devices in [&mut list.inputs, &mut list.outputs] {
        devices.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then_with(|| a.host.cmp(&b.host))
                .then_with(|| a.name.cmp(&b.name))
        });
    }

    log::info!(
        "Enumerated {} input and {} output devices from {} hosts",
        list.inputs.len(),
        list.outputs.len(),
        cpal::available_hosts().len()
    );

    Ok(list)
}

fn collect_devices(
    host: &Host,
    host_id: HostId,
    direction: Direction,
    out: &mut Vec<AudioDeviceInfo>,
) {
    let host_name_str = host_name(host_id);

    let default_device_name = match direction {
        Direction::Input => host.default_input_device(),
        Direction::Output => host.default_output_device(),
    }
    .and_then(|d: cpal::Device| d.name().ok());

    let devices_iter = match direction {
        Direction::Input => host.input_devices(),
        Direction::Output => host.output_devices(),
    };
    let devices_iter = match devices_iter {
        Ok(d) => d,
        Err(e) => {
            log::debug!("Could not enumerate devices for {:?}: {}", host_id, e);
            return;
        }
    };

    for device in devices_iter {
        let name = match device.name() {
            Ok(n) => n,
            Err(_) => continue,
        };

        let is_default = default_device_name.as_ref() == Some(&name);

        let max_channels = match direction {
            Direction::Input => device
                .supported_input_configs()
                .map(|c| c.map(|cfg| cfg.channels()).max().unwrap_or(0)),
            Direction::Output => device
                .supported_output_configs()
                .map(|c| c.map(|cfg| cfg.channels()).max().unwrap_or(0)),
        };
        let max_channels = match max_channels {
            Ok(0) | Err(_) => continue,
            Ok(n) => n,
        };

        out.push(AudioDeviceInfo {
            id: DeviceId::with_host(&name, &host_name_str),
            name,
            host: host_name_str.clone(),
            is_default,
            max_channels,
        });
    }
}

/// Find an output device by its persisted identifier
///
/// Uses the host recorded in the DeviceId if available, otherwise searches
/// all available hosts by name.
pub fn find_output_device(id: &DeviceId) -> AudioResult<cpal::Device> {
    if let Some(ref host_name) = id.host {
        if let Some(host) = get_host_by_name(host_name) {
            return host
                .output_devices()
                .map_err(|e| AudioError::Config(e.to_string()))?
                .find(|d: &cpal::Device| d.name().ok().as_ref() == Some(&id.name))
                .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()));
        }
    }

    for host_id in cpal::available_hosts() {
        if let Ok(host) = cpal::host_from_id(host_id) {
            if let Ok(mut devices) = host.output_devices() {
                if let Some(device) =
                    devices.find(|d: &cpal::Device| d.name().ok().as_ref() == Some(&id.name))
                {
                    return Ok(device);
                }
            }
        }
    }

    Err(AudioError::DeviceNotFound(id.display_label()))
}

/// Find an input device by its persisted identifier
pub fn find_input_device(id: &DeviceId) -> AudioResult<cpal::Device> {
    if let Some(ref host_name) = id.host {
        if let Some(host) = get_host_by_name(host_name) {
            return host
                .input_devices()
                .map_err(|e| AudioError::Config(e.to_string()))?
                .find(|d: &cpal::Device| d.name().ok().as_ref() == Some(&id.name))
                .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()));
        }
    }

    for host_id in cpal::available_hosts() {
        if let Ok(host) = cpal::host_from_id(host_id) {
            if let Ok(mut devices) = host.input_devices() {
                if let Some(device) =
                    devices.find(|d: &cpal::Device| d.name().ok().as_ref() == Some(&id.name))
                {
                    return Ok(device);
                }
            }
        }
    }

    Err(AudioError::DeviceNotFound(id.display_label()))
}

/// Get the default output device from the default host
pub fn default_output_device() -> AudioResult<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AudioError::Enumeration("no default output device".to_string()))
}

/// Get the default input device from the default host
pub fn default_input_device() -> AudioResult<cpal::Device> {
    cpal::default_host()
        .default_input_device()
        .ok_or_else(|| AudioError::Enumeration("no default input device".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_enumeration() {
        // This test may find nothing on headless CI; both outcomes are fine
        match list_devices() {
            Ok(list) => {
                println!(
                    "Found {} inputs, {} outputs:",
                    list.inputs.len(),
                    list.outputs.len()
                );
                for device in list.inputs.iter().chain(list.outputs.iter()) {
                    println!(
                        "  - {} (default: {}, channels: {})",
                        device, device.is_default, device.max_channels
                    );
                }
            }
            Err(e) => {
                println!("Enumeration unavailable: {}", e);
            }
        }
    }

    #[test]
    fn test_stale_selection_not_contained() {
        let list = DeviceList::default();
        let stale = DeviceId::with_host("Unplugged USB Mic", "ALSA");
        assert!(!list.contains_input(&stale));
        assert!(!list.contains_output(&stale));
    }
}
