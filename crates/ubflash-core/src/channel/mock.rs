//! Simulated U-Boot console for testing
//!
//! `SimulatedBootloader` answers the handful of commands the flasher issues
//! (`env set`, `tftp`, `gzwrite`) the way U-Boot does, pulling "TFTP" files
//! straight from a local directory and writing into an in-memory eMMC.
//! Responses are queued synchronously when a command line is completed, and
//! `read_byte` returns `None` immediately once the queue is empty, so a
//! missing response shows up as an instant timeout.

use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use parking_lot::Mutex;

use super::{ByteChannel, ChannelError};

/// Banner U-Boot prints while counting down to autoboot
pub const AUTOBOOT_BANNER: &str = "Hit any key to stop autoboot:";

const BOOT_LOG: &str = "\r\nU-Boot 2023.04 (Jan 01 2024 - 00:00:00 +0000)\r\n\r\n\
Model: Simulated Board\r\nDRAM:  4 GiB\r\nMMC:   mmc@ee140000: 0\r\n";

/// Behaviour knobs for the simulated device
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Directory served as the TFTP root
    pub tftp_root: PathBuf,
    /// Idle prompt, printed after every command
    pub prompt: String,
    /// Start in the autoboot countdown instead of at the prompt
    pub autoboot: bool,
    /// Fail the n-th `tftp` command (0-based) with a TFTP error
    pub fail_tftp_at: Option<usize>,
    /// Never answer anything (wrong baud rate, dead board)
    pub silent: bool,
}

impl MockConfig {
    pub fn new(tftp_root: impl Into<PathBuf>) -> Self {
        Self {
            tftp_root: tftp_root.into(),
            prompt: "=> ".to_string(),
            autoboot: false,
            fail_tftp_at: None,
            silent: false,
        }
    }
}

/// Record of one `tftp` command as seen by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TftpRecord {
    pub file: String,
    /// Size of the file served, `None` if it was missing
    pub size: Option<usize>,
}

/// Record of one `gzwrite` command as seen by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzwriteRecord {
    pub mmc: String,
    pub granularity: String,
    /// Offset argument exactly as typed
    pub offset_arg: String,
    /// Number of decompressed bytes written
    pub written: usize,
}

#[derive(Debug, Default)]
struct DeviceState {
    pending: VecDeque<u8>,
    line: String,
    in_autoboot: bool,
    connected: bool,
    commands: Vec<String>,
    env: HashMap<String, String>,
    memory: Vec<u8>,
    storage: Vec<u8>,
    tftp: Vec<TftpRecord>,
    gzwrite: Vec<GzwriteRecord>,
    reads: usize,
    released: bool,
}

impl DeviceState {
    fn push(&mut self, text: &str) {
        self.pending.extend(text.bytes());
    }
}

/// Shared view of the simulated device, usable after the channel is consumed
#[derive(Clone)]
pub struct DeviceHandle {
    state: Arc<Mutex<DeviceState>>,
}

impl DeviceHandle {
    /// Every command line received, without the trailing carriage return
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    /// Simulated eMMC content
    pub fn storage(&self) -> Vec<u8> {
        self.state.lock().storage.clone()
    }

    pub fn env(&self, name: &str) -> Option<String> {
        self.state.lock().env.get(name).cloned()
    }

    pub fn tftp_records(&self) -> Vec<TftpRecord> {
        self.state.lock().tftp.clone()
    }

    pub fn gzwrite_records(&self) -> Vec<GzwriteRecord> {
        self.state.lock().gzwrite.clone()
    }

    /// Number of `read_byte` calls made so far
    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }

    /// Whether the session has dropped its end of the channel
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Simulate the link going away
    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    /// Queue raw console output, as if the device printed it unprompted
    pub fn inject(&self, text: &str) {
        self.state.lock().push(text);
    }
}

/// In-process U-Boot stand-in implementing [`ByteChannel`]
pub struct SimulatedBootloader {
    config: MockConfig,
    state: Arc<Mutex<DeviceState>>,
}

impl SimulatedBootloader {
    pub fn new(config: MockConfig) -> Self {
        let mut state = DeviceState {
            connected: true,
            ..Default::default()
        };
        if config.autoboot && !config.silent {
            state.in_autoboot = true;
            state.push(BOOT_LOG);
            state.push(AUTOBOOT_BANNER);
            state.push("  3 ");
        }
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn handle(&self) -> DeviceHandle {
        DeviceHandle {
            state: self.state.clone(),
        }
    }

    fn execute(&self, state: &mut DeviceState, line: &str) {
        let line = line.trim();
        if !line.is_empty() {
            state.commands.push(line.to_string());
        }

        let args: Vec<&str> = line.split_whitespace().collect();
        match args.as_slice() {
            [] => {}
            ["env", "set", name, value] => {
                state.env.insert(name.to_string(), value.to_string());
            }
            ["tftp", _addr, file] => self.tftp(state, file),
            ["gzwrite", "mmc", mmc, _addr, _size, granularity, offset] => {
                self.gzwrite(state, mmc, granularity, offset)
            }
            [cmd, ..] => {
                let msg = format!("Unknown command '{}' - try 'help'\r\n", cmd);
                state.push(&msg);
            }
        }

        state.push(&self.config.prompt);
    }

    fn tftp(&self, state: &mut DeviceState, file: &str) {
        let attempt = state.tftp.len();
        let data = std::fs::read(self.config.tftp_root.join(file)).ok();
        state.tftp.push(TftpRecord {
            file: file.to_string(),
            size: data.as_ref().map(Vec::len),
        });

        state.push("Using ethernet@e6800000 device\r\n");
        state.push(&format!("Filename '{}'.\r\n", file));
        let data = match data {
            Some(data) if self.config.fail_tftp_at != Some(attempt) => data,
            _ => {
                state.push("TFTP error: 'File not found' (1)\r\nNot retrying...\r\n");
                return;
            }
        };

        state.push("Loading: ##################################################\r\n");
        state.push("done\r\n");
        state.push(&format!(
            "Bytes transferred = {} ({:x} hex)\r\n",
            data.len(),
            data.len()
        ));
        state
            .env
            .insert("filesize".to_string(), format!("{:x}", data.len()));
        state.memory = data;
    }

    fn gzwrite(&self, state: &mut DeviceState, mmc: &str, granularity: &str, offset_arg: &str) {
        let offset = match usize::from_str_radix(offset_arg, 16) {
            Ok(offset) => offset,
            Err(_) => {
                state.push("Usage:\r\ngzwrite <interface> <dev> <addr> length [wbuf=1M [offs=0]]\r\n");
                return;
            }
        };

        let mut raw = Vec::new();
        if GzDecoder::new(state.memory.as_slice())
            .read_to_end(&mut raw)
            .is_err()
        {
            state.push("Error: invalid gzip header\r\n");
            return;
        }

        let end = offset + raw.len();
        if state.storage.len() < end {
            state.storage.resize(end, 0);
        }
        state.storage[offset..end].copy_from_slice(&raw);
        state.gzwrite.push(GzwriteRecord {
            mmc: mmc.to_string(),
            granularity: granularity.to_string(),
            offset_arg: offset_arg.to_string(),
            written: raw.len(),
        });
        state.push(&format!("\t{} bytes, 42 MiB/s\r\n", raw.len()));
    }
}

impl ByteChannel for SimulatedBootloader {
    fn send(&mut self, text: &str) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(ChannelError::ConnectionClosed);
        }
        if self.config.silent {
            return Ok(());
        }

        for c in text.chars() {
            if state.in_autoboot {
                // Any key stops the countdown and drops to the prompt
                state.in_autoboot = false;
                state.push("\u{8}\u{8}\u{8} 0 \r\n");
                state.push(&self.config.prompt);
                continue;
            }
            if c == '\r' {
                state.push("\r\n");
                let line = std::mem::take(&mut state.line);
                self.execute(&mut state, &line);
            } else {
                state.line.push(c);
                let mut echo = [0u8; 4];
                state.push(c.encode_utf8(&mut echo));
            }
        }
        Ok(())
    }

    fn read_byte(&mut self, _timeout: Duration) -> Result<Option<u8>, ChannelError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(ChannelError::ConnectionClosed);
        }
        state.reads += 1;
        Ok(state.pending.pop_front())
    }
}

impl Drop for SimulatedBootloader {
    fn drop(&mut self) {
        self.state.lock().released = true;
    }
}
