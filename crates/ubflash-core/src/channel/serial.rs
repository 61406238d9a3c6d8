//! Serial console adapter

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use super::{ByteChannel, ChannelError};

/// Timeout used until the first read sets its own
const OPEN_TIMEOUT: Duration = Duration::from_secs(20);

/// U-Boot console reached over a UART
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
    path: String,
    timeout: Duration,
}

impl SerialChannel {
    /// Open `path` at `baud_rate` (8N1, no flow control)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, ChannelError> {
        let port = serialport::new(path, baud_rate)
            .timeout(OPEN_TIMEOUT)
            .open()
            .map_err(|e| ChannelError::ConnectionFailed(format!("{}: {}", path, e)))?;

        tracing::debug!(path, baud_rate, "Opened serial console");

        Ok(Self {
            port,
            path: path.to_string(),
            timeout: OPEN_TIMEOUT,
        })
    }

    /// Device path this channel was opened on
    pub fn path(&self) -> &str {
        &self.path
    }

    fn apply_timeout(&mut self, timeout: Duration) -> Result<(), ChannelError> {
        if self.timeout != timeout {
            self.port
                .set_timeout(timeout)
                .map_err(|e| ChannelError::ReceiveFailed(e.to_string()))?;
            self.timeout = timeout;
        }
        Ok(())
    }
}

impl ByteChannel for SerialChannel {
    fn send(&mut self, text: &str) -> Result<(), ChannelError> {
        if !text.is_ascii() {
            return Err(ChannelError::InvalidCommand(text.to_string()));
        }

        self.port
            .write_all(text.as_bytes())
            .and_then(|_| self.port.flush())
            .map_err(|e| match e.kind() {
                ErrorKind::BrokenPipe | ErrorKind::NotConnected => ChannelError::ConnectionClosed,
                _ => ChannelError::SendFailed(e.to_string()),
            })
    }

    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, ChannelError> {
        self.apply_timeout(timeout)?;

        let mut buf = [0u8; 1];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(None),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ChannelError::ReceiveFailed(e.to_string())),
            }
        }
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path, "Closing serial console");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_fails() {
        let err = SerialChannel::open("/dev/ubflash-does-not-exist", 115200)
            .err()
            .expect("opening a missing device must fail");
        match err {
            ChannelError::ConnectionFailed(msg) => {
                assert!(msg.starts_with("/dev/ubflash-does-not-exist"));
            }
            other => panic!("Expected ConnectionFailed, got {:?}", other),
        }
    }
}
