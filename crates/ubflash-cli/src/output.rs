//! Operator-facing messages for ubflash

use colored::Colorize;

/// Context for output rendering
pub struct OutputContext {
    pub verbose: bool,
}

impl OutputContext {
    pub fn new(no_color: bool, verbose: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { verbose }
    }

    /// Print a success message
    pub fn success(&self, msg: &str) {
        println!("{}", msg.green());
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }
}

/// One-line rendering of an error and its causes
pub fn failure_message(err: &anyhow::Error) -> String {
    format!("Error: {:#}", err)
}
