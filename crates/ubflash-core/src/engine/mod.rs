//! Chunked transfer engine
//!
//! A [`FlashSession`] runs one image through the bootloader:
//!
//! 1. Synchronize with the console, stopping autoboot if it is counting down
//! 2. Configure `serverip`, `ipaddr` and `loadaddr`
//! 3. For each chunk: gzip, stage in the TFTP root, `tftp` it into device
//!    memory, `gzwrite` it to eMMC, remove the staged file, report progress
//!
//! The staged file name and the load address are reused by every chunk, so a
//! chunk is only staged once the previous `gzwrite` has returned to the prompt.

pub mod commands;
pub mod staging;

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::channel::ByteChannel;
use crate::config::SessionConfig;
use crate::console::Console;
use crate::error::{FlashError, Result};
use crate::progress::ProgressReporter;

use self::staging::StagedArtifact;

/// Outcome of a successful session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashSummary {
    pub image_size: u64,
    pub bytes_transferred: u64,
    pub chunks: u64,
}

/// One end-to-end flashing operation over a console channel
pub struct FlashSession<C> {
    console: Console<C>,
    config: SessionConfig,
    progress: ProgressReporter,
}

impl<C: ByteChannel> FlashSession<C> {
    /// Create a session; the channel is released when the session ends
    ///
    /// # Arguments
    /// * `channel` - Open link to the bootloader console
    /// * `config` - Session parameters, validated here
    /// * `echo` - Where console output is copied, if anywhere
    /// * `progress` - Reporter fed after every chunk
    pub fn new(
        channel: C,
        config: SessionConfig,
        echo: Option<Box<dyn Write>>,
        progress: ProgressReporter,
    ) -> Result<Self> {
        config.validate()?;
        let console = Console::new(channel, config.console.response_timeout(), echo);
        Ok(Self {
            console,
            config,
            progress,
        })
    }

    /// Flash `image` to the configured mmc device
    ///
    /// Consumes the session: the console channel and the image file are
    /// closed on return, whether flashing succeeded or not.
    pub fn flash_image(mut self, image: &Path) -> Result<FlashSummary> {
        let result = self.run(image);
        self.progress.finish();
        result
    }

    fn run(&mut self, image: &Path) -> Result<FlashSummary> {
        info!(image = %image.display(), "Flashing image");

        let mut file = File::open(image).map_err(|e| FlashError::image_io(image, e))?;
        let image_size = file
            .metadata()
            .map_err(|e| FlashError::image_io(image, e))?
            .len();
        self.progress.set_total(image_size);

        // A leftover from a crashed run must not outlive this session either
        staging::clear_stale(&self.config.artifact_path())?;

        self.synchronize()?;
        self.configure()?;

        let mut bytes_sent: u64 = 0;
        let mut chunks: u64 = 0;
        loop {
            let raw = read_chunk(&mut file, self.config.chunk_size)
                .map_err(|e| FlashError::image_io(image, e))?;
            if raw.is_empty() {
                break;
            }

            self.transfer_chunk(&raw, bytes_sent)?;
            bytes_sent += raw.len() as u64;
            chunks += 1;
            self.progress.update(bytes_sent);
        }

        info!(bytes = bytes_sent, chunks, "Image was flashed successfully");
        Ok(FlashSummary {
            image_size,
            bytes_transferred: bytes_sent,
            chunks,
        })
    }

    /// Get to the idle prompt, interrupting autoboot if needed
    fn synchronize(&mut self) -> Result<()> {
        info!("Waiting for u-boot prompt...");
        let prompt = self.config.console.prompt.clone();
        let banner = self.config.console.autoboot_banner.clone();

        self.console.send("\r")?;
        let hit = self.console.wait_for_any(&[prompt.as_str(), banner.as_str()])?;
        if hit == 1 {
            debug!("Autoboot countdown detected, stopping it");
            self.console.send("\r")?;
            self.console.wait_for_any(&[prompt.as_str()])?;
        }
        Ok(())
    }

    fn configure(&mut self) -> Result<()> {
        if let Some(ip) = self.config.server_ip.clone() {
            self.command(&commands::env_set("serverip", &ip))?;
        }
        if let Some(ip) = self.config.device_ip.clone() {
            self.command(&commands::env_set("ipaddr", &ip))?;
        }
        let load_address = self.config.load_address.clone();
        self.command(&commands::env_set("loadaddr", &load_address))
    }

    /// Stage one chunk and have the device write it at `offset`
    ///
    /// The staged file is removed before returning, on every path.
    fn transfer_chunk(&mut self, raw: &[u8], offset: u64) -> Result<()> {
        let path = self.config.artifact_path();
        let payload = staging::compress_chunk(raw, self.config.compression_level)
            .map_err(|e| FlashError::staging_io(&path, e))?;
        debug!(
            offset,
            raw = raw.len(),
            compressed = payload.len(),
            "Staging chunk"
        );

        let artifact = StagedArtifact::create(&path, &payload)?;
        // On error the guard's drop removes the file
        self.persist_chunk(payload.len(), offset)?;
        artifact.remove()
    }

    fn persist_chunk(&mut self, compressed_len: usize, offset: u64) -> Result<()> {
        let prompt = self.config.console.prompt.clone();

        self.console.send(&commands::tftp(&self.config.chunk_file))?;
        let transferred = commands::bytes_transferred(compressed_len);
        self.console.wait_for_any(&[transferred.as_str()])?;
        self.console.wait_for_any(&[prompt.as_str()])?;

        self.command(&commands::gzwrite(self.config.mmc_device, offset))
    }

    /// Send a command and wait for the idle prompt
    fn command(&mut self, line: &str) -> Result<()> {
        let prompt = self.config.console.prompt.clone();
        self.console.send(line)?;
        self.console.wait_for_any(&[prompt.as_str()])?;
        Ok(())
    }
}

/// Read up to `limit` bytes, across short reads; empty at end of file
fn read_chunk<R: Read>(reader: &mut R, limit: u64) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.by_ref().take(limit).read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::{MockConfig, SimulatedBootloader};
    use crate::progress::ProgressMode;
    use std::io::Cursor;

    fn session(
        tftp_root: &Path,
        device: SimulatedBootloader,
        chunk_size: u64,
    ) -> FlashSession<SimulatedBootloader> {
        let mut config = SessionConfig::new(tftp_root);
        config.chunk_size = chunk_size;
        let progress = ProgressReporter::new(ProgressMode::Quiet, Box::new(std::io::sink()));
        FlashSession::new(device, config, None, progress).unwrap()
    }

    #[test]
    fn test_read_chunk_splits_at_limit() {
        let mut reader = Cursor::new(vec![7u8; 2500]);
        assert_eq!(read_chunk(&mut reader, 1024).unwrap().len(), 1024);
        assert_eq!(read_chunk(&mut reader, 1024).unwrap().len(), 1024);
        assert_eq!(read_chunk(&mut reader, 1024).unwrap().len(), 452);
        assert!(read_chunk(&mut reader, 1024).unwrap().is_empty());
    }

    #[test]
    fn test_read_chunk_exact_multiple_has_no_empty_chunk() {
        let mut reader = Cursor::new(vec![1u8; 2048]);
        assert_eq!(read_chunk(&mut reader, 1024).unwrap().len(), 1024);
        assert_eq!(read_chunk(&mut reader, 1024).unwrap().len(), 1024);
        assert!(read_chunk(&mut reader, 1024).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let device = SimulatedBootloader::new(MockConfig::new(dir.path()));
        let handle = device.handle();
        let mut config = SessionConfig::new(dir.path());
        config.chunk_size = 0;
        let progress = ProgressReporter::new(ProgressMode::Quiet, Box::new(std::io::sink()));

        let result = FlashSession::new(device, config, None, progress);
        assert!(matches!(result, Err(FlashError::InvalidConfig(_))));
        assert!(handle.commands().is_empty());
    }

    #[test]
    fn test_missing_image_fails_before_device_io() {
        let dir = tempfile::tempdir().unwrap();
        let device = SimulatedBootloader::new(MockConfig::new(dir.path()));
        let handle = device.handle();

        let err = session(dir.path(), device, 1024)
            .flash_image(&dir.path().join("missing.img"))
            .unwrap_err();
        assert!(matches!(err, FlashError::ImageIo { .. }));
        assert_eq!(handle.reads(), 0);
    }

    #[test]
    fn test_command_sequence() {
        let tftp = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let image = work.path().join("disk.img");
        std::fs::write(&image, vec![0xA5u8; 1500]).unwrap();

        let device = SimulatedBootloader::new(MockConfig::new(tftp.path()));
        let handle = device.handle();
        let mut config = SessionConfig::new(tftp.path());
        config.chunk_size = 1024;
        config.server_ip = Some("10.0.0.1".to_string());
        let progress = ProgressReporter::new(ProgressMode::Quiet, Box::new(std::io::sink()));
        let summary = FlashSession::new(device, config, None, progress)
            .unwrap()
            .flash_image(&image)
            .unwrap();

        assert_eq!(summary.chunks, 2);
        assert_eq!(
            handle.commands(),
            vec![
                "env set serverip 10.0.0.1",
                "env set loadaddr 0x58000000",
                "tftp ${loadaddr} chunk.bin.gz",
                "gzwrite mmc 0 ${loadaddr} ${filesize} 400000 0",
                "tftp ${loadaddr} chunk.bin.gz",
                "gzwrite mmc 0 ${loadaddr} ${filesize} 400000 400",
            ]
        );
    }

    #[test]
    fn test_silent_device_times_out_during_sync() {
        let tftp = tempfile::tempdir().unwrap();
        let image = tftp.path().join("disk.img");
        std::fs::write(&image, b"data").unwrap();

        let mut mock = MockConfig::new(tftp.path());
        mock.silent = true;
        let err = session(tftp.path(), SimulatedBootloader::new(mock), 1024)
            .flash_image(&image)
            .unwrap_err();
        match err {
            FlashError::ProtocolTimeout { expected } => {
                assert_eq!(expected, vec!["=>", "Hit any key to stop autoboot:"]);
            }
            other => panic!("Expected ProtocolTimeout, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_artifact_cleared_before_console_io() {
        let tftp = tempfile::tempdir().unwrap();
        let image = tftp.path().join("disk.img");
        std::fs::write(&image, b"data").unwrap();
        let stale = tftp.path().join("chunk.bin.gz");
        std::fs::write(&stale, b"left over").unwrap();

        let mut mock = MockConfig::new(tftp.path());
        mock.silent = true;
        let err = session(tftp.path(), SimulatedBootloader::new(mock), 1024)
            .flash_image(&image)
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(!stale.exists());
    }
}
