//! Generic configuration I/O utilities
//!
//! Provides generic YAML loading and saving that works with any
//! serializable configuration type. Both the settings file and the clip
//! list go through these helpers.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load a value from a YAML file
///
/// If the file doesn't exist, returns the default. If the file exists but
/// is invalid, logs a warning and returns the default.
pub fn load_yaml<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("load_yaml: {:?} doesn't exist, using defaults", path);
        return T::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<T>(&contents) {
            Ok(value) => {
                log::info!("load_yaml: loaded {:?}", path);
                value
            }
            Err(e) => {
                log::warn!("load_yaml: failed to parse {:?}: {}, using defaults", path, e);
                T::default()
            }
        },
        Err(e) => {
            log::warn!("load_yaml: failed to read {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Save a value to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_yaml<T>(value: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(value).context("Failed to serialize to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        value: i32,
        name: String,
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config: TestConfig = load_yaml(Path::new("/nonexistent/path/config.yaml"));
        assert_eq!(config, TestConfig::default());
    }

    #[test]
    fn test_load_invalid_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "value: [not an int").unwrap();

        let config: TestConfig = load_yaml(&path);
        assert_eq!(config, TestConfig::default());
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test-config.yaml");

        let config = TestConfig {
            value: 42,
            name: "test".to_string(),
        };

        save_yaml(&config, &path).unwrap();
        let loaded: TestConfig = load_yaml(&path);

        assert_eq!(loaded, config);
    }
}
