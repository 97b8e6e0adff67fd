//! Clip library
//!
//! Holds the user's loaded clips in insertion order, decodes new clips on a
//! background thread so the UI never stalls on a large file, and persists
//! the list across restarts. Removal does not cut off voices already
//! playing the clip; they hold their own reference to the frames and finish
//! naturally.

pub mod decode;
pub mod store;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::error::{AudioError, AudioResult};
use crate::types::StereoBuffer;

use decode::decode_clip;
use store::{load_records, save_records, ClipRecord};

/// A loaded clip: decoded frames for playback plus the original bytes for
/// persistence
pub struct Clip {
    pub id: u64,
    pub name: String,
    pub samples: Arc<StereoBuffer>,
    pub sample_rate: u32,
    raw: Vec<u8>,
}

/// Lightweight clip description for the UI
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSummary {
    pub id: u64,
    pub name: String,
    pub frames: usize,
    pub sample_rate: u32,
}

impl Clip {
    fn summary(&self) -> ClipSummary {
        ClipSummary {
            id: self.id,
            name: self.name.clone(),
            frames: self.samples.len(),
            sample_rate: self.sample_rate,
        }
    }
}

/// Event produced by [`ClipLibrary::poll`]
pub enum LibraryEvent {
    ClipAdded(ClipSummary),
    LoadFailed { name: String, reason: String },
}

struct DecodeRequest {
    name: String,
    bytes: Vec<u8>,
}

struct DecodeResult {
    name: String,
    bytes: Vec<u8>,
    result: Result<decode::DecodedClip, String>,
}

/// Handle to the background decoder thread
struct ClipDecoder {
    tx: Sender<DecodeRequest>,
    rx: Receiver<DecodeResult>,
    _handle: JoinHandle<()>,
}

impl ClipDecoder {
    fn spawn() -> Self {
        let (request_tx, request_rx) = std::sync::mpsc::channel::<DecodeRequest>();
        let (result_tx, result_rx) = std::sync::mpsc::channel::<DecodeResult>();

        let handle = thread::Builder::new()
            .name("clip-decoder".to_string())
            .spawn(move || {
                decoder_thread(request_rx, result_tx);
            })
            .expect("Failed to spawn clip decoder thread");

        Self {
            tx: request_tx,
            rx: result_rx,
            _handle: handle,
        }
    }
}

fn decoder_thread(rx: Receiver<DecodeRequest>, tx: Sender<DecodeResult>) {
    log::info!("Clip decoder thread started");

    while let Ok(request) = rx.recv() {
        let result = decode_clip(&request.name, request.bytes.clone()).map_err(|e| {
            log::error!("Failed to decode clip {}: {}", request.name, e);
            e.to_string()
        });
        let _ = tx.send(DecodeResult {
            name: request.name,
            bytes: request.bytes,
            result,
        });
    }

    log::info!("Clip decoder thread shutting down");
}

/// The ordered clip collection
pub struct ClipLibrary {
    clips: Vec<Clip>,
    next_clip_id: u64,
    next_voice_id: u64,
    /// Live voices mapped back to the clip they play
    voices: HashMap<u64, u64>,
    decoder: ClipDecoder,
    /// Where the clip list persists; None disables persistence
    store_path: Option<PathBuf>,
}

impl ClipLibrary {
    pub fn new(store_path: Option<PathBuf>) -> Self {
        Self {
            clips: Vec::new(),
            next_clip_id: 1,
            next_voice_id: 1,
            voices: HashMap::new(),
            decoder: ClipDecoder::spawn(),
            store_path,
        }
    }

    /// Load the persisted clip list, skipping entries that fail to decode
    ///
    /// Decoding happens inline; this runs once at startup.
    pub fn load_persisted(&mut self) {
        let Some(path) = self.store_path.clone() else {
            return;
        };
        for record in load_records(&path) {
            let bytes = match record.decode_bytes() {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("Skipping clip {}: corrupt payload: {}", record.name, e);
                    continue;
                }
            };
            match decode_clip(&record.name, bytes.clone()) {
                Ok(decoded) => {
                    self.push_clip(record.name, bytes, decoded);
                }
                Err(e) => {
                    log::warn!("Skipping clip {}: {}", record.name, e);
                }
            }
        }
        log::info!("Loaded {} persisted clips", self.clips.len());
    }

    /// Queue audio bytes for background decoding
    ///
    /// The clip appears in the list (and an event fires) once a later
    /// [`poll`](Self::poll) observes the finished decode. Clips are appended
    /// in completion order.
    pub fn load_bytes(&self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        if self
            .decoder
            .tx
            .send(DecodeRequest {
                name: name.clone(),
                bytes,
            })
            .is_err()
        {
            log::error!("Decoder thread disconnected; dropping clip {}", name);
        }
    }

    /// Drain finished decodes into the clip list (non-blocking)
    pub fn poll(&mut self) -> Vec<LibraryEvent> {
        let mut events = Vec::new();
        loop {
            let result = match self.decoder.rx.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::error!("Decoder thread disconnected unexpectedly");
                    break;
                }
            };
            match result.result {
                Ok(decoded) => {
                    let summary = self.push_clip(result.name, result.bytes, decoded);
                    events.push(LibraryEvent::ClipAdded(summary));
                }
                Err(reason) => {
                    events.push(LibraryEvent::LoadFailed {
                        name: result.name,
                        reason,
                    });
                }
            }
        }
        if events
            .iter()
            .any(|e| matches!(e, LibraryEvent::ClipAdded(_)))
        {
            self.persist();
        }
        events
    }

    fn push_clip(
        &mut self,
        name: String,
        raw: Vec<u8>,
        decoded: decode::DecodedClip,
    ) -> ClipSummary {
        let clip = Clip {
            id: self.next_clip_id,
            name,
            samples: Arc::new(decoded.buffer),
            sample_rate: decoded.sample_rate,
            raw,
        };
        self.next_clip_id += 1;
        let summary = clip.summary();
        log::info!(
            "Clip {} added: {} ({} frames @ {}Hz)",
            summary.id,
            summary.name,
            summary.frames,
            summary.sample_rate
        );
        self.clips.push(clip);
        summary
    }

    /// Remove a clip from the list
    ///
    /// Voices currently playing it keep their reference and finish
    /// naturally. Removing an unknown id is a no-op.
    pub fn remove(&mut self, clip_id: u64) -> bool {
        let before = self.clips.len();
        self.clips.retain(|c| c.id != clip_id);
        if self.clips.len() == before {
            return false;
        }
        self.persist();
        true
    }

    /// Start tracking a voice for a clip
    ///
    /// Returns the voice id plus the frames to hand to the engine. A stale
    /// clip id yields [`AudioError::UnknownClip`].
    pub fn begin_voice(&mut self, clip_id: u64) -> AudioResult<(u64, Arc<StereoBuffer>, u32)> {
        let clip = self
            .clips
            .iter()
            .find(|c| c.id == clip_id)
            .ok_or(AudioError::UnknownClip(clip_id))?;

        let voice_id = self.next_voice_id;
        self.next_voice_id += 1;
        self.voices.insert(voice_id, clip_id);
        Ok((voice_id, Arc::clone(&clip.samples), clip.sample_rate))
    }

    /// Stop tracking a voice; returns its clip id if it was known
    pub fn end_voice(&mut self, voice_id: u64) -> Option<u64> {
        self.voices.remove(&voice_id)
    }

    /// Look up which clip a live voice is playing
    ///
    /// A stale or finished voice id yields [`AudioError::UnknownVoice`].
    pub fn clip_for_voice(&self, voice_id: u64) -> AudioResult<u64> {
        self.voices
            .get(&voice_id)
            .copied()
            .ok_or(AudioError::UnknownVoice(voice_id))
    }

    /// Voice ids currently playing the given clip
    pub fn voices_for(&self, clip_id: u64) -> Vec<u64> {
        self.voices
            .iter()
            .filter(|(_, c)| **c == clip_id)
            .map(|(v, _)| *v)
            .collect()
    }

    pub fn summaries(&self) -> Vec<ClipSummary> {
        self.clips.iter().map(Clip::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    fn persist(&self) {
        let Some(path) = &self.store_path else {
            return;
        };
        let records: Vec<ClipRecord> = self
            .clips
            .iter()
            .map(|c| ClipRecord::encode(c.name.clone(), &c.raw))
            .collect();
        if let Err(e) = save_records(&records, path) {
            log::error!("Failed to persist clip list: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    /// Minimal 16-bit PCM WAV with the given mono samples
    fn wav_bytes(samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
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

    fn poll_until_event(library: &mut ClipLibrary) -> Vec<LibraryEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let events = library.poll();
            if !events.is_empty() {
                return events;
            }
            assert!(Instant::now() < deadline, "decoder produced no event");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_background_load_appends_clip() {
        let mut library = ClipLibrary::new(None);
        library.load_bytes("tone.wav", wav_bytes(&[0i16; 441]));

        let events = poll_until_event(&mut library);
        assert!(matches!(&events[0], LibraryEvent::ClipAdded(s) if s.name == "tone.wav"));
        assert_eq!(library.len(), 1);
        assert_eq!(library.summaries()[0].frames, 441);
    }

    #[test]
    fn test_failed_decode_reports_without_adding() {
        let mut library = ClipLibrary::new(None);
        library.load_bytes("bad.mp3", vec![1, 2, 3]);

        let events = poll_until_event(&mut library);
        assert!(matches!(&events[0], LibraryEvent::LoadFailed { name, .. } if name == "bad.mp3"));
        assert!(library.is_empty());
    }

    #[test]
    fn test_persist_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clips.yaml");

        let mut library = ClipLibrary::new(Some(path.clone()));
        library.load_bytes("a.wav", wav_bytes(&[100i16; 200]));
        poll_until_event(&mut library);
        library.load_bytes("b.wav", wav_bytes(&[-100i16; 300]));
        poll_until_event(&mut library);

        let mut reloaded = ClipLibrary::new(Some(path));
        reloaded.load_persisted();

        let summaries = reloaded.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "a.wav");
        assert_eq!(summaries[1].name, "b.wav");
        assert_eq!(summaries[0].frames, 200);
        assert_eq!(summaries[1].frames, 300);
    }

    #[test]
    fn test_remove_persists_and_ignores_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clips.yaml");

        let mut library = ClipLibrary::new(Some(path.clone()));
        library.load_bytes("gone.wav", wav_bytes(&[0i16; 100]));
        let events = poll_until_event(&mut library);
        let id = match &events[0] {
            LibraryEvent::ClipAdded(s) => s.id,
            _ => panic!("expected ClipAdded"),
        };

        assert!(library.remove(id));
        assert!(!library.remove(id));
        assert!(library.is_empty());

        let mut reloaded = ClipLibrary::new(Some(path));
        reloaded.load_persisted();
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_voice_tracking() {
        let mut library = ClipLibrary::new(None);
        library.load_bytes("clip.wav", wav_bytes(&[50i16; 100]));
        let events = poll_until_event(&mut library);
        let id = match &events[0] {
            LibraryEvent::ClipAdded(s) => s.id,
            _ => panic!("expected ClipAdded"),
        };

        let (v1, samples, rate) = library.begin_voice(id).unwrap();
        let (v2, _, _) = library.begin_voice(id).unwrap();
        assert_ne!(v1, v2);
        assert_eq!(samples.len(), 100);
        assert_eq!(rate, 44_100);

        let mut playing = library.voices_for(id);
        playing.sort_unstable();
        assert_eq!(playing, vec![v1, v2]);

        assert_eq!(library.clip_for_voice(v1).unwrap(), id);

        assert_eq!(library.end_voice(v1), Some(id));
        assert_eq!(library.end_voice(v1), None);
        assert_eq!(library.voices_for(id), vec![v2]);
        assert!(matches!(
            library.clip_for_voice(v1),
            Err(AudioError::UnknownVoice(_))
        ));
    }

    #[test]
    fn test_begin_voice_on_stale_clip_fails() {
        let mut library = ClipLibrary::new(None);
        let err = library.begin_voice(99).unwrap_err();
        assert!(matches!(err, AudioError::UnknownClip(99)));
    }

    #[test]
    fn test_removed_clip_frames_outlive_the_list() {
        let mut library = ClipLibrary::new(None);
        library.load_bytes("held.wav", wav_bytes(&[1000i16; 64]));
        let events = poll_until_event(&mut library);
        let id = match &events[0] {
            LibraryEvent::ClipAdded(s) => s.id,
            _ => panic!("expected ClipAdded"),
        };

        let (_voice, samples, _) = library.begin_voice(id).unwrap();
        library.remove(id);

        // The playing voice still owns the frames
        assert_eq!(samples.len(), 64);
        assert!(library.begin_voice(id).is_err());
    }
}
