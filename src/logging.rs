//! File-backed tracing setup. The terminal belongs to the UI, so nothing is
//! ever written to stdout or stderr.

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceLock<Option<PathBuf>> = OnceLock::new();

#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    pub verbose: bool,
    pub disabled: bool,
}

pub fn log_path() -> PathBuf {
    env::var("AETHER_LOG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("aether_shell.log"))
}

fn filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env("AETHER_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber once. Returns the log file path when
/// logging is active.
pub fn init(options: LogOptions) -> Option<PathBuf> {
    if options.disabled {
        return None;
    }
    TRACING_INIT
        .get_or_init(|| {
            let path = log_path();
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .ok()?;
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter(options.verbose))
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok()?;
            Some(path)
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_logging_installs_nothing() {
        assert_eq!(
            init(LogOptions {
                verbose: true,
                disabled: true
            }),
            None
        );
    }

    #[test]
    fn verbose_forces_debug() {
        assert_eq!(filter(true).to_string(), "debug");
    }
}
