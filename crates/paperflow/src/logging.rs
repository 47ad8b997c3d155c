//! Process-wide tracing setup.
//!
//! Pipeline and worker code log through `tracing`; the database layer uses
//! `log` macros, which are bridged into the same subscriber.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;

static LOGGER_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// Builds the level filter: `RUST_LOG` when set, otherwise the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs the global subscriber once. Later calls are no-ops.
///
/// Returns `false` if another subscriber was already installed by the host
/// process; logging then goes to that subscriber.
pub fn init(config: &LoggingConfig) -> bool {
    *LOGGER_INITIALIZED.get_or_init(|| {
        let fmt_layer = if config.json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .boxed()
        } else {
            fmt::layer().with_target(true).boxed()
        };

        let subscriber = Registry::default()
            .with(fmt_layer)
            .with(env_filter(config));

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            return false;
        }

        if let Err(e) = tracing_log::LogTracer::init() {
            tracing::debug!("log bridge already installed: {}", e);
        }

        tracing::info!(level = %config.level, json = config.json, "Logging initialized");
        true
    })
}
