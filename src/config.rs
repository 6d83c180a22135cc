use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub spi: SpiConfig,
    pub crc: CrcConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiConfig {
    pub bus: u8,
    /// Chip-select index on the Raspberry Pi (the CE pin).
    pub device: u8,
    pub mode: u8,
    pub rate_hz: u32,
    pub bits_per_tx: u8,
    /// How many bits for a given word.
    pub word_length: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrcConfig {
    pub width: u32,
    /// Decimal or 0x-prefixed string, like the CLI word arguments.
    pub polynomial: String,
    pub initial_value: String,
    pub mismatch: MismatchPolicy,
}

/// What to do when a received CRC does not match the recomputed one.
/// `Warn` tolerates bus noise during bring-up; `Error` fails the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    #[default]
    Warn,
    Error,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            bus: 0,
            device: 0,
            mode: 0,
            rate_hz: 4_000_000,
            bits_per_tx: 8,
            word_length: 32,
        }
    }
}

impl Default for CrcConfig {
    fn default() -> Self {
        Self {
            width: 8,
            polynomial: "0x10".to_string(),
            initial_value: "0".to_string(),
            mismatch: MismatchPolicy::Warn,
        }
    }
}

impl SpiConfig {
    pub fn byte_count(&self) -> usize {
        (self.word_length / 8) as usize
    }
}

impl CrcConfig {
    pub fn byte_count(&self) -> usize {
        (self.width as usize + 7) / 8
    }
}

impl Config {
    /// Load the configuration, generating a default file first if none exists.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)
                    .context(format!("Failed to create config directory: {}", dir.display()))?;
            }
            let rendered = serde_yaml::to_string(&Config::default())
                .context("Failed to render default configuration")?;
            fs::write(path, rendered)
                .context(format!("Failed to write config file: {}", path.display()))?;
            info!("Generated default configuration at {}", path.display());
        }

        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_str(&content).context("Failed to parse configuration file")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.spi.word_length == 0 || self.spi.word_length % 8 != 0 {
            return Err(Error::Configuration(format!(
                "word_length must be a non-zero multiple of 8, got {}",
                self.spi.word_length
            )));
        }
        if self.spi.bits_per_tx != 8 {
            return Err(Error::Configuration(format!(
                "bits_per_tx must be 8, got {}",
                self.spi.bits_per_tx
            )));
        }
        if self.spi.mode > 3 {
            return Err(Error::Configuration(format!(
                "SPI mode must be 0-3, got {}",
                self.spi.mode
            )));
        }
        // Frame sizing is capped by the u128 word representation.
        if self.spi.byte_count() + self.crc.byte_count() > 16 {
            return Err(Error::Configuration(
                "word plus CRC field exceeds 128 bits".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default config location: `~/.spicli/config.yaml`.
pub fn default_path() -> PathBuf {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".spicli").join("config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_tool() {
        let config = Config::default();
        assert_eq!(config.spi.bus, 0);
        assert_eq!(config.spi.device, 0);
        assert_eq!(config.spi.mode, 0);
        assert_eq!(config.spi.rate_hz, 4_000_000);
        assert_eq!(config.spi.word_length, 32);
        assert_eq!(config.spi.byte_count(), 4);
        assert_eq!(config.crc.width, 8);
        assert_eq!(config.crc.polynomial, "0x10");
        assert_eq!(config.crc.initial_value, "0");
        assert_eq!(config.crc.mismatch, MismatchPolicy::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unaligned_word_length() {
        let mut config = Config::default();
        config.spi.word_length = 12;
        assert!(config.validate().is_err());
        config.spi.word_length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_byte_transfer_units() {
        let mut config = Config::default();
        config.spi.bits_per_tx = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_mode() {
        let mut config = Config::default();
        config.spi.mode = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversize_frame() {
        let mut config = Config::default();
        config.spi.word_length = 128;
        config.crc.width = 8;
        assert!(config.validate().is_err());

        // 15 payload bytes plus one CRC byte still fits.
        config.spi.word_length = 120;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_or_create_generates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = Config::load_or_create(&path).unwrap();
        assert!(path.is_file());
        assert_eq!(config.spi.word_length, 32);

        // A second load reads the generated file back.
        let reloaded = Config::load_or_create(&path).unwrap();
        assert_eq!(reloaded.crc.polynomial, config.crc.polynomial);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: Config = serde_yaml::from_str("spi:\n  word_length: 64\n").unwrap();
        assert_eq!(config.spi.word_length, 64);
        assert_eq!(config.spi.rate_hz, 4_000_000);
        assert_eq!(config.crc.width, 8);
    }

    #[test]
    fn mismatch_policy_parses_lowercase() {
        let crc: CrcConfig =
            serde_yaml::from_str("width: 8\npolynomial: \"0xA2\"\nmismatch: error\n").unwrap();
        assert_eq!(crc.mismatch, MismatchPolicy::Error);
    }
}
