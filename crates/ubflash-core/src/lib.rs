//! ubflash-core - U-Boot console driver for chunked eMMC flashing
//!
//! This crate drives a U-Boot command console over a serial link and uses a
//! TFTP-served staging directory as the bulk transport. The image is cut into
//! fixed-size chunks; each chunk is gzipped, staged in the TFTP root, pulled by
//! the device with `tftp` and written to eMMC with `gzwrite`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        FlashSession                         │
//! │  synchronize → configure → chunk loop → finish              │
//! │                                                             │
//! │  ┌──────────────┐ ┌──────────────┐ ┌─────────────────────┐  │
//! │  │SessionConfig │ │StagedArtifact│ │ ProgressReporter    │  │
//! │  │ (params)     │ │ (tftp root)  │ │ (echo / quiet)      │  │
//! │  └──────────────┘ └──────────────┘ └─────────────────────┘  │
//! │                          │                                  │
//! │                    ┌─────┴─────┐                            │
//! │                    │  Console  │                            │
//! │                    │ (matcher) │                            │
//! │                    └─────┬─────┘                            │
//! │                          │                                  │
//! │                 ┌────────┴────────┐                         │
//! │                 │  ByteChannel    │                         │
//! │                 │ (serial / mock) │                         │
//! │                 └─────────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod channel;
pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod progress;

pub use channel::{ByteChannel, ChannelError, SerialChannel};
pub use config::{ConsoleConfig, SessionConfig};
pub use console::Console;
pub use engine::{FlashSession, FlashSummary};
pub use error::{FlashError, Result};
pub use progress::{ProgressMode, ProgressReporter};
