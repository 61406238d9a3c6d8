//! Staged chunk in the TFTP root

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{FlashError, Result};

/// Gzip a raw chunk
pub fn compress_chunk(raw: &[u8], level: u32) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::new(level));
    encoder.write_all(raw)?;
    encoder.finish()
}

/// Remove an artifact left behind by an earlier run
pub fn clear_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::warn!(path = %path.display(), "Removed stale staged chunk");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FlashError::staging_io(path, e)),
    }
}

/// The chunk file the device is about to fetch
///
/// The file is deleted by [`StagedArtifact::remove`], or on drop if the
/// chunk is abandoned halfway.
#[derive(Debug)]
pub struct StagedArtifact {
    path: PathBuf,
    armed: bool,
}

impl StagedArtifact {
    /// Write `payload` to `path`, replacing any previous content
    pub fn create(path: &Path, payload: &[u8]) -> Result<Self> {
        // Armed before writing so a partial file is cleaned up too
        let artifact = Self {
            path: path.to_path_buf(),
            armed: true,
        };
        fs::write(path, payload).map_err(|e| FlashError::staging_io(path, e))?;
        Ok(artifact)
    }

    pub fn remove(mut self) -> Result<()> {
        self.armed = false;
        fs::remove_file(&self.path).map_err(|e| FlashError::staging_io(&self.path, e))
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove staged chunk");
            }
        }
    }
}
