//! Engine configuration stored under `.installer/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::classifier::DEFAULT_BUFFER_THRESHOLD;
use crate::core::mode::SessionMode;
use crate::io::atomic::write_atomic;

/// Default config location relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".installer/config.toml";

/// Engine configuration (TOML).
///
/// Edited by humans; every section is optional and missing fields take their
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub media: MediaConfig,
    pub store: StoreConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Characters buffered before an undecided message is treated as prose.
    pub buffer_threshold_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            buffer_threshold_chars: DEFAULT_BUFFER_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MediaConfig {
    /// Handles substituted, round-robin, when an upload fails.
    pub fallback_handles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".installer/store.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: SessionMode,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.classifier.buffer_threshold_chars == 0 {
            return Err(anyhow!("classifier.buffer_threshold_chars must be > 0"));
        }
        if self
            .media
            .fallback_handles
            .iter()
            .any(|handle| handle.trim().is_empty())
        {
            return Err(anyhow!("media.fallback_handles must not contain empty entries"));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(anyhow!("store.path must not be empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, buf.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.classifier.buffer_threshold_chars, 500);
        assert_eq!(cfg.session.mode, SessionMode::Build);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".installer/config.toml");
        let mut cfg = EngineConfig::default();
        cfg.media.fallback_handles = vec!["media_fallback_1".to_string()];
        cfg.session.mode = SessionMode::Content;
        write_config(&path, &cfg).expect("write");
        assert_eq!(load_config(&path).expect("load"), cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[classifier]\nbuffer_threshold_chars = 64\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.classifier.buffer_threshold_chars, 64);
        assert_eq!(cfg.store, StoreConfig::default());
    }

    #[test]
    fn rejects_invalid_values() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[classifier]\nbuffer_threshold_chars = 0\n").expect("write");
        assert!(load_config(&path).is_err());

        let mut cfg = EngineConfig::default();
        cfg.media.fallback_handles = vec!["  ".to_string()];
        assert!(cfg.validate().is_err());
    }
}
