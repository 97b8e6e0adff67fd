//! Common audio types for voxpad
//!
//! Fundamental stereo sample and buffer types used throughout the engine.

use std::ops::{Index, IndexMut};

/// Default sample rate for the engine (48kHz - standard professional audio rate)
/// This is the preferred rate; the actual rate is negotiated with the device.
pub const SAMPLE_RATE: u32 = 48000;

/// Audio sample type (32-bit float throughout the processing chain)
pub type Sample = f32;

/// A single stereo sample (left and right channels)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Get the peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

impl std::ops::MulAssign<Sample> for StereoSample {
    #[inline]
    fn mul_assign(&mut self, factor: Sample) {
        self.left *= factor;
        self.right *= factor;
    }
}

/// A buffer of stereo samples
///
/// The primary audio buffer type for the mix bus and decoded clips. Supports
/// real-time-safe length management on pre-allocated buffers.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    /// Create a buffer from interleaved samples [L, R, L, R, ...]
    pub fn from_interleaved(interleaved: &[Sample]) -> Self {
        assert!(
            interleaved.len() % 2 == 0,
            "Interleaved buffer must have even length"
        );
        let samples = interleaved
            .chunks_exact(2)
            .map(|chunk| StereoSample::new(chunk[0], chunk[1]))
            .collect();
        Self { samples }
    }

    /// Create a buffer from an existing Vec of StereoSamples
    pub fn from_vec(samples: Vec<StereoSample>) -> Self {
        Self { samples }
    }

    /// Get the number of stereo samples in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Panics in debug builds if new_len > capacity. Newly exposed elements
    /// are filled with silence.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        if new_len > self.samples.len() {
            debug_assert!(
                new_len <= self.samples.capacity(),
                "set_len_from_capacity called with len > capacity"
            );
            self.samples.resize(new_len, StereoSample::silence());
        } else {
            self.samples.truncate(new_len);
        }
    }

    /// Fill the buffer with silence
    pub fn fill_silence(&mut self) {
        self.samples.fill(StereoSample::silence());
    }

    /// Get a slice of the samples
    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    /// Get a mutable slice of the samples
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    /// Scale all samples by a factor
    pub fn scale(&mut self, factor: Sample) {
        for sample in &mut self.samples {
            *sample *= factor;
        }
    }

    /// Push a sample to the buffer
    #[inline]
    pub fn push(&mut self, sample: StereoSample) {
        self.samples.push(sample);
    }

    /// Get an iterator over the samples
    pub fn iter(&self) -> impl Iterator<Item = &StereoSample> {
        self.samples.iter()
    }

    /// Get a mutable iterator over the samples
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StereoSample> {
        self.samples.iter_mut()
    }

    /// Get the peak amplitude in the buffer
    pub fn peak(&self) -> Sample {
        self.samples.iter().map(|s| s.peak()).fold(0.0, Sample::max)
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for StereoBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_sample_operations() {
        let a = StereoSample::new(1.0, 2.0);
        let b = StereoSample::new(0.5, 0.5);

        let sum = a + b;
        assert_eq!(sum.left, 1.5);
        assert_eq!(sum.right, 2.5);

        let scaled = a * 0.5;
        assert_eq!(scaled.left, 0.5);
        assert_eq!(scaled.right, 1.0);
    }

    #[test]
    fn test_stereo_buffer_from_interleaved() {
        let interleaved = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let buffer = StereoBuffer::from_interleaved(&interleaved);

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer[0].left, 1.0);
        assert_eq!(buffer[0].right, 2.0);
        assert_eq!(buffer[2].left, 5.0);
        assert_eq!(buffer[2].right, 6.0);
    }

    #[test]
    fn test_set_len_from_capacity_preserves_allocation() {
        let mut buffer = StereoBuffer::silence(512);
        let cap = buffer.samples.capacity();

        buffer.set_len_from_capacity(128);
        assert_eq!(buffer.len(), 128);

        buffer.set_len_from_capacity(512);
        assert_eq!(buffer.len(), 512);
        assert_eq!(buffer.samples.capacity(), cap);
    }

    #[test]
    fn test_peak() {
        let mut buffer = StereoBuffer::silence(4);
        buffer[2] = StereoSample::new(-0.8, 0.3);
        assert_eq!(buffer.peak(), 0.8);
    }
}
