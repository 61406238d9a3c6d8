//! U-Boot command lines issued by the flasher

/// `gzwrite` write-buffer size argument, hex
pub const GZWRITE_GRANULARITY: &str = "400000";

/// `env set <name> <value>`
pub fn env_set(name: &str, value: &str) -> String {
    format!("env set {} {}\r", name, value)
}

/// Fetch `file` from the TFTP server to `${loadaddr}`
pub fn tftp(file: &str) -> String {
    format!("tftp ${{loadaddr}} {}\r", file)
}

/// Gunzip `${loadaddr}` onto mmc `mmc` at byte `offset`
///
/// The offset is rendered in uppercase hex without padding.
pub fn gzwrite(mmc: u32, offset: u64) -> String {
    format!(
        "gzwrite mmc {} ${{loadaddr}} ${{filesize}} {} {:X}\r",
        mmc, GZWRITE_GRANULARITY, offset
    )
}

/// What `tftp` prints once `len` bytes arrived
pub fn bytes_transferred(len: usize) -> String {
    format!("Bytes transferred = {}", len)
}
