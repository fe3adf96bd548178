//! Log subscriber setup

use tracing_subscriber::EnvFilter;

/// Filter for the requested verbosity
///
/// `--verbose` forces `debug`; otherwise `RUST_LOG` applies, falling back
/// to `info`.
#[must_use]
pub fn filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber, writing to stderr
///
/// Does nothing if a subscriber is already installed.
pub fn init(verbose: bool, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_target(false)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_is_debug() {
        assert_eq!(filter(true).to_string(), "debug");
    }

    #[test]
    fn init_twice_is_harmless() {
        init(false, false);
        init(true, true);
    }
}
