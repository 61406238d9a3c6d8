//! Flash command - write a disk image through U-Boot

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use ubflash_core::{FlashSession, ProgressMode, ProgressReporter, SerialChannel};

use crate::config::MergedConfig;
use crate::output::OutputContext;

/// Flash `image` to the board on the configured serial console
pub fn flash(image: &Path, config: &MergedConfig, ctx: &OutputContext) -> Result<()> {
    tracing::info!("Use {} as a TFTP root.", config.tftp_root.display());

    let channel = SerialChannel::open(&config.serial, config.baud)
        .with_context(|| format!("Failed to open serial console {}", config.serial))?;
    tracing::info!("Use {} at {} baud as the u-boot console.", channel.path(), config.baud);

    let (mode, echo) = if ctx.verbose {
        let echo = Box::new(std::io::stdout()) as Box<dyn Write>;
        (ProgressMode::Echo, Some(echo))
    } else {
        (ProgressMode::Quiet, None)
    };

    let session = FlashSession::new(
        channel,
        config.session_config(),
        echo,
        ProgressReporter::stdout(mode),
    )?;

    let summary = session
        .flash_image(image)
        .with_context(|| format!("Failed to flash {}", image.display()))?;

    ctx.success(&format!(
        "Flashed {} bytes in {} chunk(s) to mmc {}",
        summary.bytes_transferred, summary.chunks, config.mmc
    ));
    Ok(())
}
