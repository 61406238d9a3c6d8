//! Byte channel to the bootloader console
//!
//! This module provides the raw link used to talk to U-Boot:
//! - Serial adapter for a UART console (`serialport`)
//! - Simulated bootloader for testing
//!
//! # Example
//!
//! ```ignore
//! use ubflash_core::channel::{ByteChannel, SerialChannel};
//!
//! let mut channel = SerialChannel::open("/dev/ttyUSB0", 921600)?;
//! channel.send("\r")?;
//! let byte = channel.read_byte(Duration::from_secs(20))?;
//! ```

pub mod error;
pub mod mock;
mod serial;

pub use error::ChannelError;
pub use serial::SerialChannel;

use std::time::Duration;

/// Duplex byte link to a device console
///
/// No framing or buffering is done on top of the raw bytes. Implementations
/// release the underlying link when dropped.
pub trait ByteChannel {
    /// Write `text` to the device as single-byte characters
    ///
    /// Returns once the transport has accepted the whole write.
    fn send(&mut self, text: &str) -> Result<(), ChannelError>;

    /// Block until one byte arrives or `timeout` elapses
    ///
    /// # Returns
    /// `Ok(Some(byte))` on data, `Ok(None)` when the timeout elapsed first
    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, ChannelError>;
}

impl<C: ByteChannel + ?Sized> ByteChannel for Box<C> {
    fn send(&mut self, text: &str) -> Result<(), ChannelError> {
        (**self).send(text)
    }

    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, ChannelError> {
        (**self).read_byte(timeout)
    }
}
