//! One-shot clip playback voices
//!
//! A voice is one in-flight playback of a clip at a fixed rate. Voices are
//! created per trigger, run to the end of the clip (or until stopped), and
//! are then dropped by the engine. Several voices may play the same clip
//! concurrently; each holds its own position into the shared sample buffer.

use std::sync::Arc;

use crate::types::{StereoBuffer, StereoSample};

/// One in-flight playback of a clip
pub struct Voice {
    id: u64,
    samples: Arc<StereoBuffer>,
    /// Fractional read position in samples
    position: f64,
    /// Playback rate multiplier (pitch and speed combined, like a varispeed
    /// tape). Folds in both the user pitch setting and the clip's native
    /// rate vs the engine rate.
    rate: f64,
    finished: bool,
}

impl Voice {
    /// Create a voice over a shared clip buffer
    ///
    /// A non-positive or non-finite rate is clamped to a sane minimum so a
    /// bad UI value can never produce a stuck voice.
    pub fn new(id: u64, samples: Arc<StereoBuffer>, rate: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        let finished = samples.is_empty();
        Self {
            id,
            samples,
            position: 0.0,
            rate,
            finished,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Halt the voice immediately; idempotent
    pub fn stop(&mut self) {
        self.finished = true;
    }

    /// Produce the next output sample and advance the playhead
    ///
    /// Linear interpolation between neighboring frames; returns silence once
    /// the clip end is reached.
    #[inline]
    pub fn next_sample(&mut self) -> StereoSample {
        if self.finished {
            return StereoSample::silence();
        }

        let len = self.samples.len();
        let base = self.position as usize;
        if base + 1 >= len {
            self.finished = true;
            // Last frame plays without a neighbor to interpolate toward
            return if base < len {
                self.samples[base]
            } else {
                StereoSample::silence()
            };
        }

        let frac = (self.position - base as f64) as f32;
        let a = self.samples[base];
        let b = self.samples[base + 1];
        let out = StereoSample::new(
            a.left + (b.left - a.left) * frac,
            a.right + (b.right - a.right) * frac,
        );

        self.position += self.rate;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_clip(len: usize) -> Arc<StereoBuffer> {
        let mut buf = StereoBuffer::silence(len);
        for i in 0..len {
            buf[i] = StereoSample::mono(i as f32);
        }
        Arc::new(buf)
    }

    #[test]
    fn test_unity_rate_plays_through() {
        let mut voice = Voice::new(1, ramp_clip(4), 1.0);

        assert_eq!(voice.next_sample().left, 0.0);
        assert_eq!(voice.next_sample().left, 1.0);
        assert_eq!(voice.next_sample().left, 2.0);
        // Position 3 is the final frame; the voice finishes on it
        assert_eq!(voice.next_sample().left, 3.0);
        assert!(voice.is_finished());
        assert_eq!(voice.next_sample(), StereoSample::silence());
    }

    #[test]
    fn test_half_rate_interpolates() {
        let mut voice = Voice::new(1, ramp_clip(4), 0.5);

        assert_eq!(voice.next_sample().left, 0.0);
        assert_eq!(voice.next_sample().left, 0.5);
        assert_eq!(voice.next_sample().left, 1.0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut voice = Voice::new(7, ramp_clip(8), 1.0);
        voice.stop();
        assert!(voice.is_finished());
        voice.stop();
        assert!(voice.is_finished());
    }

    #[test]
    fn test_bad_rate_clamped() {
        let mut voice = Voice::new(2, ramp_clip(4), 0.0);
        voice.next_sample();
        let second = voice.next_sample();
        // Rate fell back to 1.0, so the playhead advances
        assert_eq!(second.left, 1.0);
    }

    #[test]
    fn test_empty_clip_finishes_immediately() {
        let voice = Voice::new(3, Arc::new(StereoBuffer::default()), 1.0);
        assert!(voice.is_finished());
    }
}
