//! Transfer progress rendering

use std::io::{self, Write};

/// How progress lines are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Console output is echoed; each update gets its own line
    Echo,
    /// Updates overwrite a single line
    Quiet,
}

/// Prints progress after every chunk
pub struct ProgressReporter {
    mode: ProgressMode,
    total: u64,
    out: Box<dyn Write>,
    finished: bool,
}

impl ProgressReporter {
    /// The total starts unknown; see [`ProgressReporter::set_total`]
    pub fn new(mode: ProgressMode, out: Box<dyn Write>) -> Self {
        Self {
            mode,
            total: 0,
            out,
            finished: false,
        }
    }

    pub fn stdout(mode: ProgressMode) -> Self {
        Self::new(mode, Box::new(io::stdout()))
    }

    /// Total is usually only known once the image is opened
    pub fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    pub fn update(&mut self, transferred: u64) {
        let line = render(transferred, self.total);
        let _ = match self.mode {
            ProgressMode::Echo => write!(self.out, "\n{}\n", line),
            ProgressMode::Quiet => write!(self.out, "{}\r", line),
        }
        .and_then(|_| self.out.flush());
    }

    /// Move below the progress line; only the first call has any effect
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if self.mode == ProgressMode::Quiet {
            let _ = writeln!(self.out).and_then(|_| self.out.flush());
        }
    }
}

/// Completed percentage, truncated; `None` when the total is unknown
pub fn percent(transferred: u64, total: u64) -> Option<u64> {
    if total == 0 {
        return None;
    }
    Some((transferred as u128 * 100 / total as u128) as u64)
}

/// `Progress: 333/1_000 (33%)`, or just the count when the total is unknown
pub fn render(transferred: u64, total: u64) -> String {
    match percent(transferred, total) {
        Some(pct) => format!(
            "Progress: {}/{} ({}%)",
            group_digits(transferred),
            group_digits(total),
            pct
        ),
        None => format!("Progress: {}", group_digits(transferred)),
    }
}

/// Group decimal digits in threes with `_`
fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('_');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl SharedSink {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_percent_truncates() {
        assert_eq!(percent(333, 1000), Some(33));
        assert_eq!(percent(999, 1000), Some(99));
        assert_eq!(percent(1000, 1000), Some(100));
        assert_eq!(percent(5, 0), None);
    }

    #[test]
    fn test_percent_does_not_overflow() {
        assert_eq!(percent(u64::MAX / 2, u64::MAX), Some(49));
    }

    #[test]
    fn test_render() {
        assert_eq!(render(333, 1000), "Progress: 333/1_000 (33%)");
        assert_eq!(render(1024, 1500), "Progress: 1_024/1_500 (68%)");
        assert_eq!(render(2048, 0), "Progress: 2_048");
    }

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(536_870_912), "536_870_912");
        assert_eq!(group_digits(1_234_567), "1_234_567");
    }

    #[test]
    fn test_quiet_mode_overwrites_line() {
        let sink = SharedSink::default();
        let mut reporter = ProgressReporter::new(ProgressMode::Quiet, Box::new(sink.clone()));
        reporter.set_total(1000);
        reporter.update(500);
        reporter.update(1000);
        reporter.finish();
        reporter.finish();
        assert_eq!(
            sink.text(),
            "Progress: 500/1_000 (50%)\rProgress: 1_000/1_000 (100%)\r\n"
        );
    }

    #[test]
    fn test_echo_mode_separates_lines() {
        let sink = SharedSink::default();
        let mut reporter = ProgressReporter::new(ProgressMode::Echo, Box::new(sink.clone()));
        reporter.set_total(1000);
        reporter.update(333);
        reporter.finish();
        assert_eq!(sink.text(), "\nProgress: 333/1_000 (33%)\n");
    }

    #[test]
    fn test_unknown_total_until_set() {
        let sink = SharedSink::default();
        let mut reporter = ProgressReporter::new(ProgressMode::Quiet, Box::new(sink.clone()));
        reporter.update(2048);
        assert_eq!(sink.text(), "Progress: 2_048\r");
    }
}
