//! File configuration.
//!
//! Every section is optional and falls back to the values a device
//! would use out of the box.

use crate::analysis::QualityThresholds;
use crate::entropy::{
    JitterDigest, DEFAULT_CAPTURE_SAMPLES, DEFAULT_PER_BIT_BUDGET, MAX_CAPTURE_SAMPLES,
    MIN_CAPTURE_SAMPLES,
};
use crate::identity::{Addresses, OuiPrefix, IDENTITY_RECORD_NAME};
use crate::storage::{Persistable, RecordLayout};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("no analog channels configured")]
    NoChannels,
    #[error("per-bit budget must be positive")]
    ZeroBudget,
    #[error(
        "capture window of {0} samples outside {}..={}",
        MIN_CAPTURE_SAMPLES,
        MAX_CAPTURE_SAMPLES
    )]
    InvalidSamples(usize),
    #[error("record name must be non-empty ASCII, got {0:?}")]
    InvalidRecordName(String),
    #[error("identity record ends at {end} but the device holds {capacity} bytes")]
    RecordOutOfRange { end: usize, capacity: usize },
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Analog sampler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    /// Analog channels visited in round-robin order.
    pub channels: Vec<u8>,
    /// Raw reads allowed per debiased bit.
    pub per_bit_budget: u32,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            channels: vec![0, 1, 2, 3, 4, 5],
            per_bit_budget: DEFAULT_PER_BIT_BUDGET,
        }
    }
}

/// Timer-jitter sampler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    /// Interrupts captured per window.
    pub samples: usize,
    /// How a window is folded into a word.
    pub digest: JitterDigest,
    /// Longest wait for a window to fill.
    pub timeout_ms: u64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            samples: DEFAULT_CAPTURE_SAMPLES,
            digest: JitterDigest::default(),
            timeout_ms: 2000,
        }
    }
}

impl JitterConfig {
    /// Returns the capture timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Identity record placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Base address of the identity record.
    pub record_address: usize,
    /// Name tag of the identity record.
    pub record_name: String,
    /// Required MAC prefix, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oui: Option<OuiPrefix>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            record_address: 0,
            record_name: IDENTITY_RECORD_NAME.to_string(),
            oui: None,
        }
    }
}

impl IdentityConfig {
    /// Returns where the identity record lives.
    pub fn layout(&self) -> RecordLayout {
        RecordLayout::new(self.record_address, &self.record_name, Addresses::LEN)
    }
}

/// Non-volatile device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Device size in bytes.
    pub capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub entropy: EntropyConfig,
    #[serde(default)]
    pub jitter: JitterConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub survey: QualityThresholds,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-section constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entropy.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        if self.entropy.per_bit_budget == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if !(MIN_CAPTURE_SAMPLES..=MAX_CAPTURE_SAMPLES).contains(&self.jitter.samples) {
            return Err(ConfigError::InvalidSamples(self.jitter.samples));
        }

        let name = &self.identity.record_name;
        if name.is_empty() || !name.is_ascii() {
            return Err(ConfigError::InvalidRecordName(name.clone()));
        }

        let layout = self.identity.layout();
        if !layout.fits_within(self.storage.capacity) {
            return Err(ConfigError::RecordOutOfRange {
                end: layout.end(),
                capacity: self.storage.capacity,
            });
        }
        Ok(())
    }
}
