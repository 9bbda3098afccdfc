//! Tracing subscriber setup
//!
//! Logs go to stderr so report output on stdout stays machine readable.

use tracing_subscriber::EnvFilter;

fn filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Human-readable logging, `RUST_LOG` overrides `default_level`
pub fn init_dev_logging(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_or(default_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .try_init();
}

/// JSON logging for collection by log shippers
pub fn init_prod_logging(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_or(default_level))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .json()
        .try_init();
}

/// Logging with an explicit filter directive, ignoring `RUST_LOG`
pub fn init_logging_with_filter(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .try_init();
}

/// Map a `-v` count onto a level directive
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for_verbosity(0), "warn");
        assert_eq!(level_for_verbosity(2), "debug");
        assert_eq!(level_for_verbosity(9), "trace");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging_with_filter("jk_probe=debug");
        init_dev_logging("info");
        tracing::debug!("subscriber already installed");
    }
}
