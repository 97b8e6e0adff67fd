//! Synthesized tone generator
//!
//! Produces the three hold-to-sound board tones: the high-frequency "dog
//! whistle", the sub-bass rumble, and the censor beep. Exactly one tone can
//! sound at a time; a start request while another tone is held is ignored
//! until `stop()` (first-wins). Start and stop are idempotent so overlapping
//! press/release input events collapse to no-ops.

use std::f32::consts::TAU;

use crate::types::StereoSample;

/// Which tone to sound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneKind {
    /// 12 kHz sine at a safe level
    Whistle,
    /// 40 Hz sine, heavily overdriven into the safety clipper
    Bass,
    /// 900 Hz sine at unity
    Censor,
}

impl ToneKind {
    pub fn frequency_hz(&self) -> f32 {
        match self {
            ToneKind::Whistle => 12_000.0,
            ToneKind::Bass => 40.0,
            ToneKind::Censor => 900.0,
        }
    }

    /// Linear gain applied to the oscillator output
    pub fn gain(&self) -> f32 {
        match self {
            ToneKind::Whistle => 0.5,
            ToneKind::Bass => 100.0,
            ToneKind::Censor => 1.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToneKind::Whistle => "whistle",
            ToneKind::Bass => "bass",
            ToneKind::Censor => "censor",
        }
    }
}

/// Sine oscillator state while a tone is sounding
struct Oscillator {
    kind: ToneKind,
    /// Normalized phase in [0, 1)
    phase: f32,
}

/// Tone generator state machine: Idle or Sounding
pub struct ToneGenerator {
    sample_rate: u32,
    osc: Option<Oscillator>,
}

impl ToneGenerator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            osc: None,
        }
    }

    /// Start sounding a tone
    ///
    /// Returns false if another tone is already sounding (the request is
    /// dropped, not queued). Starting the same kind again is also a no-op.
    pub fn start(&mut self, kind: ToneKind) -> bool {
        if self.osc.is_some() {
            return false;
        }
        self.osc = Some(Oscillator { kind, phase: 0.0 });
        true
    }

    /// Return to Idle, releasing the oscillator immediately (no fade)
    pub fn stop(&mut self) {
        self.osc = None;
    }

    /// The kind currently sounding, if any
    pub fn active(&self) -> Option<ToneKind> {
        self.osc.as_ref().map(|o| o.kind)
    }

    /// Produce the next sample; silence while Idle
    #[inline]
    pub fn next_sample(&mut self) -> StereoSample {
        match &mut self.osc {
            None => StereoSample::silence(),
            Some(osc) => {
                let value = (osc.phase * TAU).sin() * osc.kind.gain();
                osc.phase += osc.kind.frequency_hz() / self.sample_rate as f32;
                if osc.phase >= 1.0 {
                    osc.phase -= 1.0;
                }
                StereoSample::mono(value)
            }
        }
    }
}
