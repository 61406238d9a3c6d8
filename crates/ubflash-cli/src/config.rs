//! Configuration file handling for ubflash

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use ubflash_core::config::{DEFAULT_CHUNK_SIZE, DEFAULT_LOAD_ADDRESS};
use ubflash_core::{ConsoleConfig, SessionConfig};

use crate::Cli;

pub const DEFAULT_SERIAL: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUD: u32 = 921_600;
pub const DEFAULT_TFTP_ROOT: &str = "/srv/tftp";

/// eMMC block size; chunk offsets must stay block aligned
const BLOCK_SIZE: u64 = 512;

/// Configuration for the CLI tool
///
/// Every field is optional; command-line arguments take precedence.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Serial console device
    pub serial: Option<String>,
    /// Serial baud rate
    pub baud: Option<u32>,
    /// TFTP root directory
    pub tftp: Option<PathBuf>,
    /// U-Boot load address (hex)
    pub loadaddr: Option<String>,
    /// U-Boot mmc device index
    pub mmc: Option<u32>,
    /// Raw chunk size in bytes
    pub buffersize: Option<u64>,
    /// TFTP server IP to set on the board
    pub serverip: Option<String>,
    /// Board IP to set
    pub ipaddr: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Bootloader prompt and timing
    pub console: Option<ConsoleConfig>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("ubflash");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, cli: &Cli) -> MergedConfig {
        let mut console = self.console.clone().unwrap_or_default();
        if let Some(secs) = cli.timeout {
            console.response_timeout_ms = secs.saturating_mul(1000);
        }

        MergedConfig {
            serial: cli
                .serial
                .clone()
                .or_else(|| self.serial.clone())
                .unwrap_or_else(|| DEFAULT_SERIAL.to_string()),
            baud: cli.baud.or(self.baud).unwrap_or(DEFAULT_BAUD),
            tftp_root: cli
                .tftp
                .clone()
                .or_else(|| self.tftp.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TFTP_ROOT)),
            load_address: cli
                .loadaddr
                .clone()
                .or_else(|| self.loadaddr.clone())
                .unwrap_or_else(|| DEFAULT_LOAD_ADDRESS.to_string()),
            mmc: cli.mmc.or(self.mmc).unwrap_or(0),
            buffer_size: cli
                .buffersize
                .or(self.buffersize)
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            server_ip: cli.serverip.clone().or_else(|| self.serverip.clone()),
            device_ip: cli.ipaddr.clone().or_else(|| self.ipaddr.clone()),
            no_color: cli.no_color || self.no_color.unwrap_or(false),
            console,
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub serial: String,
    pub baud: u32,
    pub tftp_root: PathBuf,
    pub load_address: String,
    pub mmc: u32,
    pub buffer_size: u64,
    pub server_ip: Option<String>,
    pub device_ip: Option<String>,
    pub no_color: bool,
    pub console: ConsoleConfig,
}

impl MergedConfig {
    /// Checks that belong to the operator surface rather than the session
    pub fn validate(&self) -> Result<()> {
        if !self.tftp_root.is_dir() {
            bail!("{} is not a directory", self.tftp_root.display());
        }
        if self.buffer_size == 0 || self.buffer_size % BLOCK_SIZE != 0 {
            bail!(
                "Buffer size must be a positive multiple of {} bytes, got {}",
                BLOCK_SIZE,
                self.buffer_size
            );
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(&self.tftp_root);
        config.load_address = self.load_address.clone();
        config.mmc_device = self.mmc;
        config.chunk_size = self.buffer_size;
        config.server_ip = self.server_ip.clone();
        config.device_ip = self.device_ip.clone();
        config.console = self.console.clone();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["ubflash", "disk.img"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_without_file_or_args() {
        let merged = Config::default().merge_with_args(&cli(&[]));
        assert_eq!(merged.serial, "/dev/ttyUSB0");
        assert_eq!(merged.baud, 921_600);
        assert_eq!(merged.tftp_root, PathBuf::from("/srv/tftp"));
        assert_eq!(merged.load_address, "0x58000000");
        assert_eq!(merged.mmc, 0);
        assert_eq!(merged.buffer_size, 512 * 1024 * 1024);
        assert!(merged.server_ip.is_none());
        assert_eq!(merged.console, ConsoleConfig::default());
    }

    #[test]
    fn test_args_override_file() {
        let config: Config = toml::from_str(
            r#"
            serial = "/dev/ttyACM0"
            baud = 115200
            mmc = 1
            serverip = "10.0.0.1"

            [console]
            prompt = "U-Boot>"
            "#,
        )
        .unwrap();

        let merged = config.merge_with_args(&cli(&["-s", "/dev/ttyUSB1", "--timeout", "5"]));
        assert_eq!(merged.serial, "/dev/ttyUSB1");
        assert_eq!(merged.baud, 115_200);
        assert_eq!(merged.mmc, 1);
        assert_eq!(merged.server_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(merged.console.prompt, "U-Boot>");
        assert_eq!(merged.console.response_timeout_ms, 5000);
    }

    #[test]
    fn test_validate_rejects_unaligned_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let tftp = dir.path().to_str().unwrap();
        let merged =
            Config::default().merge_with_args(&cli(&["-t", tftp, "--buffersize", "1000"]));
        assert!(merged.validate().is_err());

        let merged =
            Config::default().merge_with_args(&cli(&["-t", tftp, "--buffersize", "1024"]));
        merged.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_missing_tftp_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let merged = Config::default()
            .merge_with_args(&cli(&["-t", missing.to_str().unwrap()]));
        let err = merged.validate().unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }

    #[test]
    fn test_session_config_carries_values() {
        let merged = Config::default().merge_with_args(&cli(&[
            "-l",
            "0x40000000",
            "-m",
            "2",
            "--ipaddr",
            "10.0.0.2",
        ]));
        let session = merged.session_config();
        assert_eq!(session.load_address, "0x40000000");
        assert_eq!(session.mmc_device, 2);
        assert_eq!(session.device_ip.as_deref(), Some("10.0.0.2"));
        assert_eq!(session.artifact_path(), PathBuf::from("/srv/tftp/chunk.bin.gz"));
    }
}
