//! The mix engine - single mix bus combining mic, voices, and tone
//!
//! Owned exclusively by the virtual-output stream callback. All mutation
//! arrives through the lock-free command queue; processing sums the live
//! sources into the bus, applies master gain, the optional distortion stage,
//! and a final safety clamp before the buffer is fanned out to the sinks.

use crate::types::{StereoBuffer, StereoSample};

use super::command::EngineCommand;
use super::distortion::DistortionStage;
use super::tone::{ToneGenerator, ToneKind};
use super::voice::Voice;

/// Upper bound on concurrent voices; the oldest voice is evicted beyond this
pub const MAX_VOICES: usize = 64;

/// Capacity of the finished-voice feedback queue (audio thread → UI)
pub const VOICE_RECLAIM_CAPACITY: usize = MAX_VOICES * 4;

/// Create the finished-voice feedback channel
///
/// The engine pushes the id of every voice it retires (natural completion,
/// explicit stop, or cap eviction) so the controller can release its
/// per-voice bookkeeping.
pub fn voice_reclaim_channel() -> (rtrb::Producer<u64>, rtrb::Consumer<u64>) {
    rtrb::RingBuffer::new(VOICE_RECLAIM_CAPACITY)
}

/// Master gain bounds as a percent value (0%-500%)
pub const MAX_MASTER_GAIN_PERCENT: f32 = 500.0;

/// The mix engine
///
/// One mix bus per engine: every sound-producing entity (mic queue, playback
/// voices, tone) sums into it, never directly into an output sink.
pub struct MixEngine {
    sample_rate: u32,
    /// Master bus gain, linear (percent / 100)
    master_gain: f32,
    voices: Vec<Voice>,
    tone: ToneGenerator,
    distortion: Option<Box<DistortionStage>>,
    /// Live mic capture queue; None while the mic is detached
    mic: Option<Box<rtrb::Consumer<StereoSample>>>,
    /// Retired-voice ids flow back to the UI through here
    reclaim_tx: Option<rtrb::Producer<u64>>,
}

impl MixEngine {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            master_gain: 1.0,
            voices: Vec::with_capacity(MAX_VOICES),
            tone: ToneGenerator::new(sample_rate),
            distortion: None,
            mic: None,
            reclaim_tx: None,
        }
    }

    /// Wire the producer side of the finished-voice feedback channel
    pub fn set_voice_reclaim(&mut self, tx: rtrb::Producer<u64>) {
        self.reclaim_tx = Some(tx);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Current linear master gain
    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    /// Set master gain from a percent value (0-500)
    pub fn set_master_gain_percent(&mut self, percent: f32) {
        self.master_gain = percent.clamp(0.0, MAX_MASTER_GAIN_PERCENT) / 100.0;
    }

    /// The tone currently sounding, if any
    pub fn active_tone(&self) -> Option<ToneKind> {
        self.tone.active()
    }

    /// Number of voices still in flight
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Start a prepared voice
    ///
    /// At the voice cap the oldest in-flight voice is evicted; triggering
    /// sounds must always win over long tails.
    pub fn play_voice(&mut self, voice: Voice) {
        if self.voices.len() >= MAX_VOICES {
            let evicted = self.voices.remove(0);
            self.reclaim(evicted.id());
        }
        self.voices.push(voice);
    }

    fn reclaim(&mut self, voice_id: u64) {
        if let Some(tx) = &mut self.reclaim_tx {
            // Queue full means the UI is not draining; drop the id
            let _ = tx.push(voice_id);
        }
    }

    /// Stop a voice by id; stale or finished ids are no-ops
    pub fn stop_voice(&mut self, voice_id: u64) {
        if let Some(voice) = self.voices.iter_mut().find(|v| v.id() == voice_id) {
            voice.stop();
        }
    }

    /// Start a tone; ignored while another tone is sounding (first-wins)
    pub fn start_tone(&mut self, kind: ToneKind) {
        self.tone.start(kind);
    }

    /// Stop the active tone; idempotent
    pub fn stop_tone(&mut self) {
        self.tone.stop();
    }

    /// Swap the distortion stage (None removes it)
    pub fn set_distortion(&mut self, stage: Option<Box<DistortionStage>>) {
        self.distortion = stage;
    }

    /// Current distortion amount, if a stage is active
    pub fn distortion_amount(&self) -> Option<f32> {
        self.distortion.as_ref().map(|d| d.amount())
    }

    /// Wire a mic capture queue into the bus, replacing any previous one
    pub fn attach_mic(&mut self, consumer: Box<rtrb::Consumer<StereoSample>>) {
        self.mic = Some(consumer);
    }

    /// Disconnect the mic capture queue
    pub fn detach_mic(&mut self) {
        self.mic = None;
    }

    pub fn mic_attached(&self) -> bool {
        self.mic.is_some()
    }

    /// Apply all pending commands (called at the start of each audio buffer)
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(cmd) = rx.pop() {
            match cmd {
                EngineCommand::SetMasterGain { percent } => self.set_master_gain_percent(percent),
                EngineCommand::PlayVoice(voice) => self.play_voice(*voice),
                EngineCommand::StopVoice { voice_id } => self.stop_voice(voice_id),
                EngineCommand::StartTone(kind) => self.start_tone(kind),
                EngineCommand::StopTone => self.stop_tone(),
                EngineCommand::SetDistortion(stage) => self.set_distortion(stage),
                EngineCommand::AttachMic(consumer) => self.attach_mic(consumer),
                EngineCommand::DetachMic => self.detach_mic(),
            }
        }
    }

    /// Process one buffer of audio into `out`
    ///
    /// `out` carries the working length; the engine overwrites it entirely.
    pub fn process(&mut self, out: &mut StereoBuffer) {
        out.fill_silence();
        let len = out.len();

        // Mic first: consume at most one frame per output frame so the
        // capture queue drains at the output rate. An empty queue (startup,
        // jitter) contributes silence for the remainder.
        if let Some(mic) = &mut self.mic {
            for i in 0..len {
                match mic.pop() {
                    Ok(sample) => out[i] += sample,
                    Err(_) => break,
                }
            }
        }

        // Sum playback voices
        for voice in &mut self.voices {
            for i in 0..len {
                if voice.is_finished() {
                    break;
                }
                out[i] += voice.next_sample();
            }
        }
        // Retire finished voices and report their ids back to the UI
        let mut i = 0;
        while i < self.voices.len() {
            if self.voices[i].is_finished() {
                let voice = self.voices.remove(i);
                self.reclaim(voice.id());
            } else {
                i += 1;
            }
        }

        // Tone
        if self.tone.active().is_some() {
            for i in 0..len {
                out[i] += self.tone.next_sample();
            }
        }

        // Master gain, then the optional distortion stage
        out.scale(self.master_gain);

        if let Some(stage) = &self.distortion {
            for sample in out.iter_mut() {
                *sample = stage.shape_sample(*sample);
            }
        }

        // Safety clamp: the bus must never hand the sinks samples beyond
        // full scale (the bass tone alone is driven far past it)
        for sample in out.iter_mut() {
            sample.left = sample.left.clamp(-1.0, 1.0);
            sample.right = sample.right.clamp(-1.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::command::command_channel;

    fn constant_clip(len: usize, value: f32) -> Arc<StereoBuffer> {
        let mut buf = StereoBuffer::silence(len);
        for i in 0..len {
            buf[i] = StereoSample::mono(value);
        }
        Arc::new(buf)
    }

    #[test]
    fn test_master_gain_percent_mapping() {
        let mut engine = MixEngine::new(48_000);
        assert_eq!(engine.master_gain(), 1.0);

        for percent in [0.0, 50.0, 100.0, 250.0, 500.0] {
            engine.set_master_gain_percent(percent);
            assert_eq!(engine.master_gain(), percent / 100.0);
        }

        // Out-of-range values clamp
        engine.set_master_gain_percent(900.0);
        assert_eq!(engine.master_gain(), 5.0);
        engine.set_master_gain_percent(-10.0);
        assert_eq!(engine.master_gain(), 0.0);
    }

    #[test]
    fn test_tone_exclusivity_via_commands() {
        let mut engine = MixEngine::new(48_000);
        let (mut tx, mut rx) = command_channel();

        tx.push(EngineCommand::StartTone(ToneKind::Whistle)).unwrap();
        tx.push(EngineCommand::StartTone(ToneKind::Bass)).unwrap();
        engine.process_commands(&mut rx);
        assert_eq!(engine.active_tone(), Some(ToneKind::Whistle));

        tx.push(EngineCommand::StopTone).unwrap();
        tx.push(EngineCommand::StartTone(ToneKind::Bass)).unwrap();
        engine.process_commands(&mut rx);
        assert_eq!(engine.active_tone(), Some(ToneKind::Bass));
    }

    #[test]
    fn test_voice_sums_into_bus_and_finishes() {
        let mut engine = MixEngine::new(48_000);
        engine.play_voice(Voice::new(1, constant_clip(32, 0.25), 1.0));
        assert_eq!(engine.voice_count(), 1);

        let mut out = StereoBuffer::silence(64);
        engine.process(&mut out);

        assert!((out[0].left - 0.25).abs() < 1e-6);
        // Clip is shorter than the buffer: tail is silent, voice retired
        assert_eq!(out[40], StereoSample::silence());
        assert_eq!(engine.voice_count(), 0);
    }

    #[test]
    fn test_stop_voice_stale_id_is_noop() {
        let mut engine = MixEngine::new(48_000);
        engine.play_voice(Voice::new(1, constant_clip(64, 0.5), 1.0));
        engine.stop_voice(999);
        assert_eq!(engine.voice_count(), 1);

        engine.stop_voice(1);
        let mut out = StereoBuffer::silence(16);
        engine.process(&mut out);
        assert_eq!(out[0], StereoSample::silence());
        assert_eq!(engine.voice_count(), 0);
    }

    #[test]
    fn test_concurrent_voices_sum() {
        let mut engine = MixEngine::new(48_000);
        engine.play_voice(Voice::new(1, constant_clip(64, 0.2), 1.0));
        engine.play_voice(Voice::new(2, constant_clip(64, 0.3), 1.0));

        let mut out = StereoBuffer::silence(16);
        engine.process(&mut out);
        assert!((out[0].left - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_mic_queue_feeds_bus() {
        let mut engine = MixEngine::new(48_000);
        let (mut producer, consumer) = rtrb::RingBuffer::<StereoSample>::new(128);
        engine.attach_mic(Box::new(consumer));

        for _ in 0..8 {
            producer.push(StereoSample::mono(0.4)).unwrap();
        }

        let mut out = StereoBuffer::silence(16);
        engine.process(&mut out);

        assert!((out[0].left - 0.4).abs() < 1e-6);
        // Queue under-run past frame 8 contributes silence, not garbage
        assert_eq!(out[12], StereoSample::silence());

        engine.detach_mic();
        assert!(!engine.mic_attached());
    }

    #[test]
    fn test_distortion_swap_applies_to_bus() {
        let mut engine = MixEngine::new(48_000);
        engine.play_voice(Voice::new(1, constant_clip(64, 0.9), 1.0));
        engine.set_distortion(Some(Box::new(DistortionStage::new(0.0))));

        let mut out = StereoBuffer::silence(8);
        engine.process(&mut out);
        // amount = 0 reduces to x/3
        assert!((out[0].left - 0.3).abs() < 1e-3);

        engine.set_distortion(None);
        assert_eq!(engine.distortion_amount(), None);
    }

    #[test]
    fn test_safety_clamp_bounds_output() {
        let mut engine = MixEngine::new(48_000);
        engine.start_tone(ToneKind::Bass); // 100x gain
        let mut out = StereoBuffer::silence(2048);
        engine.process(&mut out);
        assert!(out.peak() <= 1.0);
    }

    #[test]
    fn test_retired_voices_reported_for_reclaim() {
        let mut engine = MixEngine::new(48_000);
        let (tx, mut rx) = voice_reclaim_channel();
        engine.set_voice_reclaim(tx);

        // Natural completion: the short clip runs out within one buffer
        engine.play_voice(Voice::new(7, constant_clip(8, 0.1), 1.0));
        // Explicit stop before processing
        engine.play_voice(Voice::new(9, constant_clip(256, 0.1), 1.0));
        engine.stop_voice(9);

        let mut out = StereoBuffer::silence(32);
        engine.process(&mut out);

        assert_eq!(engine.voice_count(), 0);
        let mut retired = vec![rx.pop().unwrap(), rx.pop().unwrap()];
        retired.sort_unstable();
        assert_eq!(retired, vec![7, 9]);
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_cap_eviction_reports_evicted_voice() {
        let mut engine = MixEngine::new(48_000);
        let (tx, mut rx) = voice_reclaim_channel();
        engine.set_voice_reclaim(tx);

        for id in 0..=MAX_VOICES as u64 {
            engine.play_voice(Voice::new(id, constant_clip(256, 0.1), 1.0));
        }

        assert_eq!(engine.voice_count(), MAX_VOICES);
        assert_eq!(rx.pop().unwrap(), 0);
    }

    #[test]
    fn test_voice_cap_evicts_oldest() {
        let mut engine = MixEngine::new(48_000);
        for id in 0..(MAX_VOICES as u64 + 4) {
            engine.play_voice(Voice::new(id, constant_clip(256, 0.1), 1.0));
        }
        assert_eq!(engine.voice_count(), MAX_VOICES);
    }
}
