//! Microphone capture
//!
//! Runs a cpal input stream on the selected capture device and pushes frames
//! into a lock-free SPSC queue. The consumer side is handed to the engine
//! via an AttachMic command; the engine drains it at the output rate. If the
//! queue fills (monitor stalled, output not running), the capture callback
//! drops frames instead of blocking.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use crate::types::StereoSample;

use super::config::DeviceId;
use super::device::{default_input_device, find_input_device};
use super::error::{AudioError, AudioResult};

/// Capture queue depth: a quarter second at the engine rate absorbs
/// scheduling jitter without adding meaningful steady-state latency (the
/// engine drains the queue as fast as it fills).
fn capture_queue_len(sample_rate: u32) -> usize {
    (sample_rate / 4) as usize
}

/// Handle to a live microphone capture stream
///
/// Dropping this stops the hardware capture.
pub struct MicCapture {
    _stream: Stream,
    device_label: String,
}

impl MicCapture {
    /// Start capturing from the given device (or the host default)
    ///
    /// The stream is negotiated at the engine sample rate so captured frames
    /// can feed the mix bus without resampling; a device that cannot run at
    /// that rate fails with `SampleRateMismatch`. Returns the capture handle
    /// and the consumer side of the sample queue for the engine.
    pub fn start(
        device_id: Option<&DeviceId>,
        sample_rate: u32,
    ) -> AudioResult<(MicCapture, rtrb::Consumer<StereoSample>)> {
        let device = match device_id {
            Some(id) => find_input_device(id)?,
            None => default_input_device()?,
        };
        let device_label = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported_configs: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| AudioError::PermissionDenied(e.to_string()))?
            .collect();

        if supported_configs.is_empty() {
            return Err(AudioError::Config(
                "no supported input configurations".to_string(),
            ));
        }

        // Prefer f32 at the engine rate; fall back to any config that can
        // run at the engine rate.
        let best_config = supported_configs
            .iter()
            .filter(|c| c.sample_format() == SampleFormat::F32)
            .find(|c| {
                sample_rate >= c.min_sample_rate().0 && sample_rate <= c.max_sample_rate().0
            })
            .or_else(|| {
                supported_configs.iter().find(|c| {
                    sample_rate >= c.min_sample_rate().0 && sample_rate <= c.max_sample_rate().0
                })
            })
            .ok_or_else(|| {
                let device_max = supported_configs
                    .iter()
                    .map(|c| c.max_sample_rate().0)
                    .max()
                    .unwrap_or(0);
                AudioError::SampleRateMismatch {
                    engine: sample_rate,
                    device: device_max,
                }
            })?;

        let stream_config = StreamConfig {
            channels: best_config.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let channels = stream_config.channels as usize;

        log::info!(
            "Mic capture: {} ({} channels, {}Hz)",
            device_label,
            channels,
            sample_rate
        );

        let (mut producer, consumer) =
            rtrb::RingBuffer::<StereoSample>::new(capture_queue_len(sample_rate));

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    for frame in data.chunks(channels) {
                        let sample = match frame {
                            [mono] => StereoSample::mono(*mono),
                            [left, right, ..] => StereoSample::new(*left, *right),
                            [] => continue,
                        };
                        // Queue full: drop the frame (never block in the
                        // capture callback)
                        if producer.push(sample).is_err() {
                            break;
                        }
                    }
                },
                move |err| {
                    log::error!("Mic capture stream error: {}", err);
                },
                None,
            )
            .map_err(|e| match e {
                cpal::BuildStreamError::DeviceNotAvailable => {
                    AudioError::PermissionDenied("capture device not available".to_string())
                }
                other => AudioError::StreamBuild(other.to_string()),
            })?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        Ok((
            MicCapture {
                _stream: stream,
                device_label,
            },
            consumer,
        ))
    }

    /// Name of the device being captured
    pub fn device_label(&self) -> &str {
        &self.device_label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_queue_sized_to_rate() {
        assert_eq!(capture_queue_len(48_000), 12_000);
        assert_eq!(capture_queue_len(44_100), 11_025);
    }

    #[test]
    fn test_start_with_stale_device_fails_cleanly() {
        let stale = DeviceId::with_host("No Such Microphone", "ALSA");
        match MicCapture::start(Some(&stale), 48_000) {
            Err(AudioError::DeviceNotFound(_)) | Err(AudioError::Enumeration(_)) => {}
            Err(e) => println!("start failed with host-specific error: {}", e),
            Ok(_) => panic!("capture started on a nonexistent device"),
        }
    }
}
