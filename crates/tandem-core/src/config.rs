//! Global configuration
//!
//! Configuration is stored as YAML in the platform config directory
//! (default: `<config dir>/tandem/config.yaml`). A missing or invalid file
//! falls back to defaults with a logged warning; only explicit saves fail
//! loudly.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Audio output settings
    pub audio: AudioSettings,
    /// Analysis settings (tempo detection range)
    pub analysis: AnalysisConfig,
}

/// Audio output section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Output buffer size in frames
    pub buffer_size: u32,
    /// Output device by name; None selects the default device
    pub device: Option<String>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            device: None,
        }
    }
}

/// Analysis section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Tempo detection settings
    pub bpm: BpmConfig,
}

/// Tempo detection configuration
///
/// Bounds the autocorrelation lag search: only periodicities between
/// `min_tempo` and `max_tempo` BPM become candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BpmConfig {
    /// Minimum expected tempo in BPM
    pub min_tempo: f64,
    /// Maximum expected tempo in BPM
    pub max_tempo: f64,
}

impl Default for BpmConfig {
    fn default() -> Self {
        Self {
            min_tempo: 60.0,
            max_tempo: 200.0,
        }
    }
}

impl BpmConfig {
    /// Clamp values to a usable search window
    pub fn validate(&mut self) {
        self.min_tempo = self.min_tempo.clamp(40.0, 180.0);
        self.max_tempo = self.max_tempo.clamp(60.0, 250.0);

        // Keep at least a 20 BPM window
        if self.min_tempo >= self.max_tempo {
            self.max_tempo = (self.min_tempo + 20.0).min(250.0);
        }
    }
}

/// Default config file path: `<config dir>/tandem/config.yaml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tandem")
        .join("config.yaml")
}

/// Load configuration from a YAML file
///
/// Missing file returns defaults; an invalid file logs a warning and
/// returns defaults.
pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        log::info!("no config at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
            Ok(mut config) => {
                config.analysis.bpm.validate();
                log::info!(
                    "loaded config - tempo range {:.0}-{:.0} BPM, buffer {} frames",
                    config.analysis.bpm.min_tempo,
                    config.analysis.bpm.max_tempo,
                    config.audio.buffer_size
                );
                config
            }
            Err(e) => {
                log::warn!("failed to parse config: {}, using defaults", e);
                Config::default()
            }
        },
        Err(e) => {
            log::warn!("failed to read config file: {}, using defaults", e);
            Config::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("failed to serialize config")?;
    std::fs::write(path, yaml).with_context(|| format!("failed to write config file: {:?}", path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analysis.bpm.min_tempo, 60.0);
        assert_eq!(config.analysis.bpm.max_tempo, 200.0);
        assert_eq!(config.audio.buffer_size, 256);
        assert!(config.audio.device.is_none());
    }

    #[test]
    fn test_bpm_validation_clamps_values() {
        let mut bpm = BpmConfig {
            min_tempo: 10.0,
            max_tempo: 400.0,
        };
        bpm.validate();
        assert_eq!(bpm.min_tempo, 40.0);
        assert_eq!(bpm.max_tempo, 250.0);
    }

    #[test]
    fn test_bpm_validation_preserves_window() {
        let mut bpm = BpmConfig {
            min_tempo: 170.0,
            max_tempo: 100.0,
        };
        bpm.validate();
        assert!(bpm.max_tempo > bpm.min_tempo);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config {
            audio: AudioSettings {
                buffer_size: 512,
                device: Some(String::from("USB Audio")),
            },
            analysis: AnalysisConfig {
                bpm: BpmConfig {
                    min_tempo: 80.0,
                    max_tempo: 180.0,
                },
            },
        };

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.audio.buffer_size, 512);
        assert_eq!(parsed.audio.device.as_deref(), Some("USB Audio"));
        assert_eq!(parsed.analysis.bpm.min_tempo, 80.0);
    }

    #[test]
    fn test_missing_file_returns_defaults() {
        let config = load_config(Path::new("/nonexistent/tandem-config.yaml"));
        assert_eq!(config.audio.buffer_size, 256);
    }
}
