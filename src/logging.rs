//! Logging setup for the command-line driver
//!
//! Initializes a `tracing-subscriber` writing to stderr, so that stdout only
//! carries records.
//!
//! ## Level priority
//!
//! 1. `--log-level` flag / `logging.level` in the config file
//! 2. `RUST_LOG` environment variable
//! 3. Default: `warn`

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Filter directive for a configured level, or `None` when logging is off
fn filter_directive(level: &str) -> Option<String> {
    if level.eq_ignore_ascii_case("off") {
        return None;
    }
    Some(format!("splitstream={}", level.to_lowercase()))
}

/// Initialize the tracing subscriber once per process
pub fn init_logging(config: &LoggingConfig) {
    LOGGING_INITIALIZED.get_or_init(|| {
        let filter = match config.level.as_deref() {
            Some(level) => match filter_directive(level) {
                Some(directive) => EnvFilter::new(directive),
                None => return,
            },
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("splitstream=warn")),
        };

        if config.json {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .ok();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false),
                )
                .try_init()
                .ok();
        }
    });
}
