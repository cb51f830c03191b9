use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Setting this variable to any value turns verbose output on.
pub const VERBOSE_ENV: &str = "DMM_VERBOSE";

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn enable() {
    VERBOSE.store(true, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    VERBOSE.load(Ordering::Relaxed) || std::env::var_os(VERBOSE_ENV).is_some()
}

/// Print a diagnostic line to stderr when verbose output is on.
pub fn log(message: impl AsRef<str>) {
    if is_enabled() {
        eprintln!("{} {}", "[VERBOSE]".dimmed(), message.as_ref());
    }
}
