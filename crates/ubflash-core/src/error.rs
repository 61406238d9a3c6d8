//! Flashing session errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::channel::ChannelError;

/// Errors that abort a flashing session
///
/// Every variant is fatal: nothing is retried and no partial success is
/// reported.
#[derive(Debug, Error)]
pub enum FlashError {
    /// An expected console response did not appear in time
    #[error("Timeout waiting for {expected:?} from the device")]
    ProtocolTimeout { expected: Vec<String> },

    /// The console link could not be opened or failed mid-operation
    #[error("Transport error: {0}")]
    Transport(#[from] ChannelError),

    /// The source image could not be opened or read
    #[error("Failed to read image {}: {source}", .path.display())]
    ImageIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The staged chunk could not be written to or removed from the TFTP root
    #[error("Failed to stage chunk at {}: {source}", .path.display())]
    StagingIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Session parameters were rejected before touching the device
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FlashError {
    pub(crate) fn image_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ImageIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn staging_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::StagingIo {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from a console wait running out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ProtocolTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, FlashError>;
