//! Expect-style driver for the bootloader console
//!
//! [`Console`] sends command lines and waits until one of a set of expected
//! strings shows up in the console output. The timeout applies to each byte
//! read, not to the whole wait: output that keeps trickling in without ever
//! matching keeps the wait alive.

use std::io::Write;
use std::time::Duration;

use tracing::debug;

use crate::channel::ByteChannel;
use crate::error::{FlashError, Result};

/// Received text kept around for diagnostics when a wait times out
const TAIL_LEN: usize = 256;

const BACKSPACE: u8 = 0x08;

/// Command/response dialogue over a [`ByteChannel`]
pub struct Console<C> {
    channel: C,
    timeout: Duration,
    echo: Option<Box<dyn Write>>,
}

impl<C: ByteChannel> Console<C> {
    /// Create a console with a per-byte `timeout` and an optional echo sink
    ///
    /// When `echo` is set, printable console output is copied to it byte by
    /// byte as it arrives.
    pub fn new(channel: C, timeout: Duration, echo: Option<Box<dyn Write>>) -> Self {
        Self {
            channel,
            timeout,
            echo,
        }
    }

    /// Send a command line (callers include the trailing `\r`)
    pub fn send(&mut self, command: &str) -> Result<()> {
        debug!(command = command.trim_end(), "Console send");
        self.channel.send(command)?;
        Ok(())
    }

    /// Read until any of `expect` appears in the output
    ///
    /// # Returns
    /// Index into `expect` of the string that appeared first in the stream,
    /// regardless of its position in the list
    pub fn wait_for_any(&mut self, expect: &[&str]) -> Result<usize> {
        let longest = expect.iter().map(|e| e.len()).max().unwrap_or(0);
        let window = longest.max(TAIL_LEN);
        let mut received: Vec<u8> = Vec::with_capacity(window);

        loop {
            let Some(byte) = self.channel.read_byte(self.timeout)? else {
                debug!(
                    expected = ?expect,
                    tail = %String::from_utf8_lossy(&received),
                    "Console wait timed out"
                );
                return Err(FlashError::ProtocolTimeout {
                    expected: expect.iter().map(|e| e.to_string()).collect(),
                });
            };

            self.echo_byte(byte);

            // Any new occurrence ends at the newest byte, so only the last
            // `longest` bytes matter for matching.
            if received.len() == window {
                received.remove(0);
            }
            received.push(byte);

            if let Some(index) = expect
                .iter()
                .position(|e| !e.is_empty() && received.ends_with(e.as_bytes()))
            {
                debug!(matched = expect[index], "Console wait satisfied");
                return Ok(index);
            }
        }
    }

    /// Release the console and hand back the channel
    pub fn into_inner(self) -> C {
        self.channel
    }

    fn echo_byte(&mut self, byte: u8) {
        if let Some(out) = self.echo.as_mut() {
            if is_echoable(byte) {
                // Echo write errors are ignored
                let _ = out.write_all(&[byte]).and_then(|_| out.flush());
            }
        }
    }
}

/// Printable ASCII, whitespace or backspace
fn is_echoable(byte: u8) -> bool {
    byte.is_ascii_graphic()
        || matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c | BACKSPACE)
}
