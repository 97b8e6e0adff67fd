//! Output sink manager
//!
//! Binds the mix bus to the OS output devices:
//!
//! - The **virtual sink** is the primary stream. Its callback owns the
//!   engine state: it drains the command queue, processes one buffer, and
//!   writes the mix to the device picked as the virtual microphone. It is
//!   always active once a virtual output device is chosen.
//! - The **monitor sink** is a secondary stream fed by a lock-free ring
//!   buffer. The virtual stream's callback pushes every processed sample
//!   into the ring while monitoring is enabled; the monitor stream pops and
//!   plays them, with silence on under-run. The monitor never blocks the
//!   virtual stream and can be created or torn down without touching it.
//!
//! Rebinding a sink always tears the old stream down before the new one is
//! built, so a device change never produces a double-output window. Binding
//! to the requested device is non-fatal: on failure the sink falls back to
//! the host default and the caller receives a warning.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use crate::engine::{command_channel, voice_reclaim_channel, CommandSender, EngineCommand, MixEngine};
use crate::types::{StereoBuffer, StereoSample};

use super::config::{DeviceId, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE};
use super::device::{default_output_device, find_output_device};
use super::error::{AudioError, AudioResult};

/// Shared state between the UI thread and the virtual stream callback
///
/// The mutex is only contended when the UI swaps the monitor producer or a
/// sink is being rebuilt; the audio callback otherwise holds it alone.
struct EngineShared {
    engine: MixEngine,
    command_rx: rtrb::Consumer<EngineCommand>,
    /// Fan-out producer for the monitor sink; None while monitoring is off
    monitor_tx: Option<rtrb::Producer<StereoSample>>,
    /// Pre-allocated bus buffer (never reallocated on the audio thread)
    buffer: StereoBuffer,
}

/// Outcome of binding a sink: the warning, if a fallback was taken
pub type BindWarning = Option<String>;

/// Manages the virtual and monitor output sinks
pub struct SinkManager {
    shared: Arc<Mutex<EngineShared>>,
    sample_rate: u32,

    virtual_stream: Option<Stream>,
    virtual_device: Option<DeviceId>,

    monitor_stream: Option<Stream>,
    monitoring_enabled: bool,
}

impl SinkManager {
    /// Create the manager and its engine
    ///
    /// No streams are opened yet; the engine starts processing once a
    /// virtual output device is chosen. The returned consumer carries the
    /// ids of voices the engine has retired.
    pub fn new(sample_rate: u32) -> (Self, CommandSender, rtrb::Consumer<u64>) {
        let (command_tx, command_rx) = command_channel();
        let (reclaim_tx, reclaim_rx) = voice_reclaim_channel();
        let mut engine = MixEngine::new(sample_rate);
        engine.set_voice_reclaim(reclaim_tx);

        let shared = EngineShared {
            engine,
            command_rx,
            monitor_tx: None,
            buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
        };

        (
            Self {
                shared: Arc::new(Mutex::new(shared)),
                sample_rate,
                virtual_stream: None,
                virtual_device: None,
                monitor_stream: None,
                monitoring_enabled: false,
            },
            CommandSender {
                producer: command_tx,
            },
            reclaim_rx,
        )
    }

    /// Drive one buffer through the engine without an output stream
    ///
    /// Does the same work as the virtual stream callback minus the device
    /// write; for test environments where no output device can be opened.
    #[cfg(test)]
    pub(crate) fn process_offline(&self, n_frames: usize) {
        if let Ok(mut shared) = self.shared.lock() {
            let shared = &mut *shared;
            shared
                .buffer
                .set_len_from_capacity(n_frames.min(MAX_BUFFER_SIZE));
            shared.engine.process_commands(&mut shared.command_rx);
            shared.engine.process(&mut shared.buffer);
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn virtual_device(&self) -> Option<&DeviceId> {
        self.virtual_device.as_ref()
    }

    pub fn virtual_active(&self) -> bool {
        self.virtual_stream.is_some()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring_enabled
    }

    /// Bind (or rebind) the virtual sink to an output device
    ///
    /// The previous stream is severed before the new one is established.
    /// Falls back to the host default device with a warning when the
    /// requested device cannot be bound.
    pub fn set_virtual_device(&mut self, id: Option<&DeviceId>) -> AudioResult<BindWarning> {
        // Sever the old sink first; no double-output period
        self.virtual_stream = None;

        let (device, warning) = resolve_output_device(id)?;

        let stream = self.build_virtual_stream(&device)?;
        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        log::info!(
            "Virtual sink bound to {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        self.virtual_stream = Some(stream);
        self.virtual_device = id.cloned();
        Ok(warning)
    }

    /// Toggle the monitor sink
    ///
    /// Enabling creates a stream on the given device (host default if None
    /// or unbindable, with a warning). Disabling tears the stream down and
    /// detaches the fan-out queue. The virtual sink is untouched either way.
    pub fn set_monitoring(
        &mut self,
        enabled: bool,
        id: Option<&DeviceId>,
    ) -> AudioResult<BindWarning> {
        // Tear down the current monitor sink in both directions
        self.monitor_stream = None;
        if let Ok(mut shared) = self.shared.lock() {
            shared.monitor_tx = None;
        }
        self.monitoring_enabled = false;

        if !enabled {
            return Ok(None);
        }

        let (device, warning) = resolve_output_device(id)?;

        // Fan-out ring: 4x the buffer size absorbs timing jitter between
        // the two streams
        let capacity = DEFAULT_BUFFER_SIZE as usize * 4;
        let (producer, consumer) = rtrb::RingBuffer::<StereoSample>::new(capacity);

        let stream = build_monitor_stream(&device, self.sample_rate, consumer)?;
        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        log::info!(
            "Monitor sink bound to {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        self.shared
            .lock()
            .map(|mut shared| shared.monitor_tx = Some(producer))
            .ok();
        self.monitor_stream = Some(stream);
        self.monitoring_enabled = true;
        Ok(warning)
    }

    /// Build the virtual output stream: the callback owns engine processing
    fn build_virtual_stream(&self, device: &cpal::Device) -> AudioResult<Stream> {
        let stream_config = get_output_config(device, self.sample_rate)?;
        let channels = stream_config.channels as usize;
        let state = Arc::clone(&self.shared);

        log::info!(
            "Virtual sink config: {} channels, {}Hz",
            channels,
            stream_config.sample_rate.0
        );

        device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let mut state = match state.lock() {
                        Ok(s) => s,
                        Err(_) => {
                            data.fill(0.0);
                            return;
                        }
                    };
                    let n_frames = data.len() / channels;
                    let state = &mut *state;

                    // RT-safe: only the working length changes
                    state.buffer.set_len_from_capacity(n_frames.min(MAX_BUFFER_SIZE));

                    state.engine.process_commands(&mut state.command_rx);
                    state.engine.process(&mut state.buffer);

                    let samples = state.buffer.as_slice();
                    for (i, frame) in data.chunks_mut(channels).enumerate() {
                        let sample = samples.get(i).copied().unwrap_or_default();
                        frame[0] = sample.left;
                        if channels > 1 {
                            frame[1] = sample.right;
                        }
                        for ch in frame.iter_mut().skip(2) {
                            *ch = 0.0;
                        }
                    }

                    // Fan out to the monitor sink; if its ring is full the
                    // monitor is behind and will catch up
                    if let Some(monitor_tx) = &mut state.monitor_tx {
                        for sample in samples {
                            if monitor_tx.push(*sample).is_err() {
                                break;
                            }
                        }
                    }
                },
                move |err| {
                    log::error!("Virtual sink stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))
    }
}

/// Resolve an output device id, falling back to the host default
///
/// Returns the device plus a warning when the requested device was
/// unavailable and the default was substituted.
fn resolve_output_device(id: Option<&DeviceId>) -> AudioResult<(cpal::Device, BindWarning)> {
    match id {
        None => Ok((default_output_device()?, None)),
        Some(id) => match find_output_device(id) {
            Ok(device) => Ok((device, None)),
            Err(e) => {
                let warning = format!(
                    "output device {} unavailable ({}), using default",
                    id.display_label(),
                    e
                );
                log::warn!("{}", warning);
                let device = default_output_device().map_err(|_| AudioError::Binding {
                    device: id.display_label(),
                    reason: e.to_string(),
                })?;
                Ok((device, Some(warning)))
            }
        },
    }
}

/// Get a stream configuration for an output device at the engine rate
fn get_output_config(device: &cpal::Device, sample_rate: u32) -> AudioResult<StreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::Config(e.to_string()))?
        .collect();

    if supported_configs.is_empty() {
        return Err(AudioError::Config(
            "no supported output configurations".to_string(),
        ));
    }

    // Prefer f32 stereo at the engine rate
    let best_config = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(|c| sample_rate >= c.min_sample_rate().0 && sample_rate <= c.max_sample_rate().0)
        .or_else(|| {
            supported_configs.iter().find(|c| {
                sample_rate >= c.min_sample_rate().0 && sample_rate <= c.max_sample_rate().0
            })
        })
        .ok_or_else(|| {
            AudioError::Config(format!(
                "device does not support {}Hz output",
                sample_rate
            ))
        })?;

    Ok(StreamConfig {
        channels: best_config.channels(),
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Fixed(DEFAULT_BUFFER_SIZE),
    })
}

/// Build the monitor stream: reads from the fan-out ring, never blocks
fn build_monitor_stream(
    device: &cpal::Device,
    sample_rate: u32,
    mut consumer: rtrb::Consumer<StereoSample>,
) -> AudioResult<Stream> {
    let stream_config = get_output_config(device, sample_rate)?;
    let channels = stream_config.channels as usize;

    device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    match consumer.pop() {
                        Ok(sample) => {
                            frame[0] = sample.left;
                            if channels > 1 {
                                frame[1] = sample.right;
                            }
                            for ch in frame.iter_mut().skip(2) {
                                *ch = 0.0;
                            }
                        }
                        Err(_) => {
                            // Nothing produced yet: play silence
                            for ch in frame.iter_mut() {
                                *ch = 0.0;
                            }
                        }
                    }
                }
            },
            move |err| {
                log::error!("Monitor sink stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuild(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::{ToneKind, Voice};

    #[test]
    fn test_new_manager_is_idle() {
        let (manager, _sender, _reclaim) = SinkManager::new(48_000);
        assert!(!manager.virtual_active());
        assert!(!manager.monitoring_enabled());
        assert_eq!(manager.virtual_device(), None);
    }

    #[test]
    fn test_disable_monitoring_leaves_virtual_state() {
        let (mut manager, _sender, _reclaim) = SinkManager::new(48_000);
        let before_active = manager.virtual_active();
        let before_device = manager.virtual_device().cloned();

        manager.set_monitoring(false, None).unwrap();

        assert!(!manager.monitoring_enabled());
        assert_eq!(manager.virtual_active(), before_active);
        assert_eq!(manager.virtual_device().cloned(), before_device);
    }

    #[test]
    fn test_commands_reach_engine_via_shared_state() {
        let (manager, mut sender, _reclaim) = SinkManager::new(48_000);

        sender
            .send(EngineCommand::SetMasterGain { percent: 250.0 })
            .ok()
            .unwrap();
        sender.send(EngineCommand::StartTone(ToneKind::Censor)).ok().unwrap();

        // Drive the engine the way the virtual stream callback would
        let mut shared = manager.shared.lock().unwrap();
        let shared = &mut *shared;
        shared.engine.process_commands(&mut shared.command_rx);

        assert_eq!(shared.engine.master_gain(), 2.5);
        assert_eq!(shared.engine.active_tone(), Some(ToneKind::Censor));
    }

    #[test]
    fn test_offline_processing_reports_finished_voices() {
        let (manager, mut sender, mut reclaim_rx) = SinkManager::new(48_000);

        let clip = Arc::new(StereoBuffer::silence(16));
        sender
            .send(EngineCommand::PlayVoice(Box::new(Voice::new(5, clip, 1.0))))
            .ok()
            .unwrap();

        manager.process_offline(64);

        assert_eq!(reclaim_rx.pop().unwrap(), 5);
        assert!(reclaim_rx.pop().is_err());
    }
}
