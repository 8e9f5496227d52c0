//! Engine sizing and output settings.
//!
//! Every capacity here is fixed when the engine is built so the audio thread
//! never grows a buffer. A config file only needs the fields it changes:
//!
//! ```json
//! { "melodicPolyphony": 4, "masterGain": 0.6 }
//! ```

use std::{fs, path::Path};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Control → audio command ring.
    pub command_capacity: usize,
    /// Audio → control event ring.
    pub event_capacity: usize,
    /// Audio → control ring for retired voices and chains.
    pub return_capacity: usize,
    /// Triggers that may wait for their frame at once.
    pub pending_triggers: usize,
    /// Sub-voices per melodic track.
    pub melodic_polyphony: usize,
    /// Samples handed to the scope view.
    pub scope_window: usize,
    pub spectrum_bins: usize,
    pub master_gain: f32,
    /// Sample rate for offline rendering and export.
    pub offline_sample_rate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_capacity: 1024,
            event_capacity: 1024,
            return_capacity: 16,
            pending_triggers: 64,
            melodic_polyphony: 8,
            scope_window: 1024,
            spectrum_bins: 64,
            master_gain: 0.8,
            offline_sample_rate: 48_000,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path.as_ref())?;
        debug!("loading engine config from {}", path.as_ref().display());
        Self::from_json_str(&json)
    }

    /// Clamp every field into a usable range.
    pub fn validated(self) -> Self {
        let gain = if self.master_gain.is_finite() {
            self.master_gain.clamp(0.0, 2.0)
        } else {
            Self::default().master_gain
        };

        Self {
            command_capacity: self.command_capacity.clamp(16, 65_536),
            event_capacity: self.event_capacity.clamp(16, 65_536),
            return_capacity: self.return_capacity.clamp(4, 1024),
            pending_triggers: self.pending_triggers.clamp(8, 4096),
            melodic_polyphony: self.melodic_polyphony.clamp(1, 64),
            scope_window: self.scope_window.clamp(64, 16_384).next_power_of_two(),
            spectrum_bins: self.spectrum_bins.clamp(8, 512),
            master_gain: gain,
            offline_sample_rate: self.offline_sample_rate.clamp(8_000, 384_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_fields_take_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "melodicPolyphony": 4 }"#).expect("parse");
        assert_eq!(config.melodic_polyphony, 4);
        assert_eq!(config.command_capacity, 1024);
        assert_eq!(config.master_gain, 0.8);
    }

    #[test]
    fn validation_clamps_unusable_values() {
        let config = EngineConfig {
            melodic_polyphony: 0,
            scope_window: 1000,
            master_gain: f32::NAN,
            offline_sample_rate: 1,
            ..EngineConfig::default()
        }
        .validated();

        assert_eq!(config.melodic_polyphony, 1);
        assert_eq!(config.scope_window, 1024);
        assert_eq!(config.master_gain, 0.8);
        assert_eq!(config.offline_sample_rate, 8_000);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "masterGain": 0.5 }}"#).expect("write");

        let config = EngineConfig::from_json_file(file.path()).expect("load");
        assert_eq!(config.master_gain, 0.5);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{ nope"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            EngineConfig::from_json_file(dir.path().join("absent.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
