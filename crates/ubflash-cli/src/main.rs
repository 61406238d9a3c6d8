//! ubflash - flash raw disk images to eMMC through U-Boot and TFTP
//!
//! The image is cut into chunks that are gzipped into the TFTP root one at a
//! time; U-Boot fetches each with `tftp` and writes it with `gzwrite`.

mod config;
mod flash;
mod output;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::output::OutputContext;

#[derive(Parser, Debug)]
#[command(name = "ubflash")]
#[command(author, version, about = "Flash image files through u-boot and tftp")]
pub struct Cli {
    /// Image file to flash
    pub image: PathBuf,

    /// Serial console to use [default: /dev/ttyUSB0]
    #[arg(short, long, env = "UBFLASH_SERIAL")]
    pub serial: Option<String>,

    /// Baud rate [default: 921600]
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// TFTP root directory [default: /srv/tftp]
    #[arg(short, long)]
    pub tftp: Option<PathBuf>,

    /// U-Boot loadaddr, 0x.. format [default: 0x58000000]
    #[arg(short, long)]
    pub loadaddr: Option<String>,

    /// MMC device in U-Boot [default: 0]
    #[arg(short, long)]
    pub mmc: Option<u32>,

    /// Chunk size in bytes, 512-byte aligned [default: 536870912]
    #[arg(long)]
    pub buffersize: Option<u64>,

    /// IP of the host serving TFTP
    #[arg(long)]
    pub serverip: Option<String>,

    /// IP of the board for the TFTP transfer
    #[arg(long)]
    pub ipaddr: Option<String>,

    /// Seconds to wait for each byte of console output [default: 20]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Configuration file path
    #[arg(short, long, env = "UBFLASH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Print the output from the serial console
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging; stdout is reserved for console echo and progress
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    let merged = config.merge_with_args(&cli);
    merged.validate()?;

    let ctx = OutputContext::new(merged.no_color, cli.verbose);

    if let Err(e) = flash::flash(&cli.image, &merged, &ctx) {
        ctx.error(&output::failure_message(&e));
        std::process::exit(1);
    }
    Ok(())
}
