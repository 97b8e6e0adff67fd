//! Clip persistence
//!
//! The clip list is saved as a YAML file of named base64 payloads. The
//! original compressed bytes are kept (not the decoded frames), so the
//! file stays small and clips re-decode on load.

use std::path::Path;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::{load_yaml, save_yaml};

/// One persisted clip: display name plus base64-encoded audio bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRecord {
    pub name: String,
    pub data: String,
}

impl ClipRecord {
    pub fn encode(name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(&self.data)?)
    }
}

/// Load the persisted clip list; missing or invalid file yields an empty list
pub fn load_records(path: &Path) -> Vec<ClipRecord> {
    load_yaml(path)
}

/// Save the clip list, creating parent directories as needed
pub fn save_records(records: &[ClipRecord], path: &Path) -> Result<()> {
    save_yaml(&records, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_encode_decode() {
        let bytes = vec![0u8, 1, 2, 250, 255];
        let record = ClipRecord::encode("airhorn.mp3", &bytes);

        assert_eq!(record.name, "airhorn.mp3");
        assert_eq!(record.decode_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_corrupt_base64_fails() {
        let record = ClipRecord {
            name: "bad".to_string(),
            data: "!!! not base64 !!!".to_string(),
        };
        assert!(record.decode_bytes().is_err());
    }

    #[test]
    fn test_records_roundtrip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clips.yaml");

        let records = vec![
            ClipRecord::encode("first.wav", b"aaaa"),
            ClipRecord::encode("second.wav", b"bbbb"),
            ClipRecord::encode("third.wav", b"cccc"),
        ];

        save_records(&records, &path).unwrap();
        let loaded = load_records(&path);

        assert_eq!(loaded, records);
    }

    #[test]
    fn test_missing_file_yields_empty_list() {
        let loaded = load_records(Path::new("/nonexistent/clips.yaml"));
        assert!(loaded.is_empty());
    }
}
