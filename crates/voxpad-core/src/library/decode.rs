//! Clip decoding
//!
//! Decodes compressed audio bytes (MP3, FLAC, WAV) into a stereo frame
//! buffer via symphonia. Clips live entirely in memory, so decoding works
//! on a byte slice rather than a file on disk. The clip's native sample
//! rate is preserved; rate conversion happens at playback time through the
//! voice's resampling rate.

use std::io::Cursor;

use crate::audio::error::{AudioError, AudioResult};
use crate::types::{StereoBuffer, StereoSample};

/// A fully decoded clip at its native sample rate
pub struct DecodedClip {
    pub buffer: StereoBuffer,
    pub sample_rate: u32,
}

/// Decode audio bytes into stereo frames
///
/// The clip name is used as a format hint (its extension, if any). Mono
/// sources are duplicated to both channels; sources with more than two
/// channels keep the first two.
pub fn decode_clip(name: &str, bytes: Vec<u8>) -> AudioResult<DecodedClip> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    // Hint with the clip name's extension
    let mut hint = Hint::new();
    if let Some(ext) = name.rsplit('.').next().filter(|e| *e != name) {
        hint.with_extension(ext);
    }

    // Probe the media source
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioError::Decode(e.to_string()))?;

    let mut format = probed.format;

    // Find the first audio track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::Decode("no audio track found".to_string()))?;

    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::Decode("unknown sample rate".to_string()))?;

    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(2);

    // Create decoder
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    // Decode all packets
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Error decoding packet: {}", e);
                continue;
            }
        };

        // Initialize sample buffer on first decode
        if sample_buf.is_none() {
            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() {
        return Err(AudioError::Decode("no audio frames decoded".to_string()));
    }

    Ok(DecodedClip {
        buffer: to_stereo(&samples, channels),
        sample_rate,
    })
}

/// Fold interleaved frames of any channel count down to stereo
fn to_stereo(samples: &[f32], channels: usize) -> StereoBuffer {
    match channels {
        0 | 1 => StereoBuffer::from_vec(
            samples.iter().map(|&s| StereoSample::mono(s)).collect(),
        ),
        2 => StereoBuffer::from_interleaved(&samples[..samples.len() - samples.len() % 2]),
        n => StereoBuffer::from_vec(
            samples
                .chunks_exact(n)
                .map(|frame| StereoSample::new(frame[0], frame[1]))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal 16-bit PCM WAV with the given mono samples
    fn wav_bytes(samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&44_100u32.to_le_bytes());
        out.extend_from_slice(&(44_100u32 * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_decode_wav_mono() {
        let samples: Vec<i16> = (0..1000).map(|i| (i % 100) * 300).collect();
        let clip = decode_clip("beep.wav", wav_bytes(&samples)).unwrap();

        assert_eq!(clip.sample_rate, 44_100);
        assert_eq!(clip.buffer.len(), 1000);
        // Mono is duplicated to both channels
        let frame = clip.buffer[500];
        assert_eq!(frame.left, frame.right);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode_clip("noise.mp3", vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_empty_fails() {
        assert!(decode_clip("empty.wav", Vec::new()).is_err());
    }
}
