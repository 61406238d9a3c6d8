//! Flashing session configuration
//!
//! `SessionConfig` carries everything the engine needs besides the image and
//! the console link. `ConsoleConfig` holds the bootloader-specific strings and
//! can be loaded from the `[console]` table of a TOML file.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FlashError, Result};

/// Default staged artifact name inside the TFTP root
pub const DEFAULT_CHUNK_FILE: &str = "chunk.bin.gz";

/// Default device memory address the chunk is loaded to
pub const DEFAULT_LOAD_ADDRESS: &str = "0x58000000";

/// Default raw chunk size (512 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 512 * 1024 * 1024;

/// Parameters of one flashing session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory served by the TFTP server
    pub tftp_root: PathBuf,
    /// Name of the staged chunk inside `tftp_root`
    pub chunk_file: String,
    /// U-Boot `loadaddr`, hex string
    pub load_address: String,
    /// U-Boot mmc device index
    pub mmc_device: u32,
    /// Raw bytes per chunk
    pub chunk_size: u64,
    /// Sets `serverip` on the device when present
    pub server_ip: Option<String>,
    /// Sets `ipaddr` on the device when present
    pub device_ip: Option<String>,
    /// Gzip level for staged chunks
    pub compression_level: u32,
    pub console: ConsoleConfig,
}

impl SessionConfig {
    pub fn new(tftp_root: impl Into<PathBuf>) -> Self {
        Self {
            tftp_root: tftp_root.into(),
            chunk_file: DEFAULT_CHUNK_FILE.to_string(),
            load_address: DEFAULT_LOAD_ADDRESS.to_string(),
            mmc_device: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            server_ip: None,
            device_ip: None,
            compression_level: 1,
            console: ConsoleConfig::default(),
        }
    }

    /// Full path of the staged artifact
    pub fn artifact_path(&self) -> PathBuf {
        self.tftp_root.join(&self.chunk_file)
    }

    /// Reject parameters the device would choke on
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(FlashError::InvalidConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }

        if self.chunk_file.is_empty()
            || Path::new(&self.chunk_file).file_name() != Some(OsStr::new(&self.chunk_file))
        {
            return Err(FlashError::InvalidConfig(format!(
                "chunk file must be a plain file name: {:?}",
                self.chunk_file
            )));
        }

        parse_hex(&self.load_address).ok_or_else(|| {
            FlashError::InvalidConfig(format!(
                "load address is not hexadecimal: {}",
                self.load_address
            ))
        })?;

        if self.compression_level > 9 {
            return Err(FlashError::InvalidConfig(format!(
                "compression level must be 0-9, got {}",
                self.compression_level
            )));
        }

        self.console.validate()
    }
}

/// Bootloader console strings and timing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Idle prompt marker
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Banner printed while autoboot counts down
    #[serde(default = "default_autoboot_banner")]
    pub autoboot_banner: String,
    /// Per-byte response timeout in milliseconds
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

fn default_prompt() -> String {
    "=>".to_string()
}

fn default_autoboot_banner() -> String {
    "Hit any key to stop autoboot:".to_string()
}

fn default_response_timeout_ms() -> u64 {
    20_000
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            autoboot_banner: default_autoboot_banner(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

impl ConsoleConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.prompt.is_empty() || self.autoboot_banner.is_empty() {
            return Err(FlashError::InvalidConfig(
                "prompt and autoboot banner must not be empty".to_string(),
            ));
        }
        if self.response_timeout_ms == 0 {
            return Err(FlashError::InvalidConfig(
                "response timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a hex string with optional `0x` prefix
pub fn parse_hex(value: &str) -> Option<u64> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
