//! Log subscriber setup for the `jvmcompat` binary.
//!
//! Log lines always go to stderr: stdout carries command output (verdicts,
//! fleet reports) that callers pipe into other tools.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: our crates at `level`, everything
/// else at warn.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!("warn,jvmcompat_core={level},jvmcompat={level}")
}

/// Install the global subscriber. Later calls in the same process are no-ops.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_our_crates() {
        assert_eq!(
            default_directives(Level::DEBUG),
            "warn,jvmcompat_core=debug,jvmcompat=debug"
        );
        assert!(default_directives(Level::INFO).parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::DEBUG);
        init_tracing(true, Level::INFO);
        tracing::debug!("still alive");
    }
}
