//! Test harness for ubflash end-to-end tests
//!
//! Sessions run against `SimulatedBootloader`, which serves TFTP straight
//! from a temporary directory and writes into an in-memory eMMC, so no board,
//! serial adapter or TFTP server is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ubflash-tests
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;
use ubflash_core::channel::mock::{DeviceHandle, MockConfig, SimulatedBootloader};
use ubflash_core::{
    FlashSession, FlashSummary, ProgressMode, ProgressReporter, Result, SessionConfig,
};

/// `Write` sink whose contents stay readable after it was handed off
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Deterministic, not-too-compressible image content
pub fn image_bytes(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x1234_5678;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

/// A TFTP root, an image and a simulated board
pub struct FlashHarness {
    pub tftp: TempDir,
    pub work: TempDir,
    pub image: PathBuf,
    pub data: Vec<u8>,
    pub mock: MockConfig,
    pub config: SessionConfig,
    pub mode: ProgressMode,
    pub progress: SharedBuffer,
    pub echo: Option<SharedBuffer>,
}

impl FlashHarness {
    pub fn new(image_len: usize, chunk_size: u64) -> io::Result<Self> {
        let tftp = tempfile::tempdir()?;
        let work = tempfile::tempdir()?;
        let data = image_bytes(image_len);
        let image = work.path().join("disk.img");
        std::fs::write(&image, &data)?;

        let mock = MockConfig::new(tftp.path());
        let mut config = SessionConfig::new(tftp.path());
        config.chunk_size = chunk_size;

        Ok(Self {
            tftp,
            work,
            image,
            data,
            mock,
            config,
            mode: ProgressMode::Quiet,
            progress: SharedBuffer::default(),
            echo: None,
        })
    }

    /// Copy console output into a buffer and switch progress to echo mode
    pub fn with_echo(mut self) -> Self {
        self.echo = Some(SharedBuffer::default());
        self.mode = ProgressMode::Echo;
        self
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.config.artifact_path()
    }

    pub fn tftp_root(&self) -> &Path {
        self.tftp.path()
    }

    /// Build the device, run one session, and hand back the device view
    pub fn run(&self) -> (Result<FlashSummary>, DeviceHandle) {
        let device = SimulatedBootloader::new(self.mock.clone());
        let handle = device.handle();
        let echo = self
            .echo
            .clone()
            .map(|buf| Box::new(buf) as Box<dyn Write>);
        let progress = ProgressReporter::new(self.mode, Box::new(self.progress.clone()));

        let result = FlashSession::new(device, self.config.clone(), echo, progress)
            .and_then(|session| session.flash_image(&self.image));
        (result, handle)
    }
}
