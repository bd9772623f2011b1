//! Tracing initialization for production binaries.
//!
//! The state machine itself emits spans and events through `tracing`; this
//! module wires up the subscriber that collects them. Instrumentation lives
//! at the runner boundary so the state machine stays deterministic.

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to set global subscriber: {0}")]
    SetSubscriber(#[from] tracing_subscriber::util::TryInitError),

    #[error("Invalid filter directive: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Configuration for telemetry.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Emit compact single-line output instead of the full formatter.
    pub compact: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_filter: "info,racecontrol_node=debug".to_string(),
            compact: false,
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured default filter. Returns
/// an error if a subscriber is already installed, so tests that set their
/// own subscriber can call this safely and ignore the result.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))?;

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry().with(filter);

    if config.compact {
        registry.with(fmt_layer.compact()).try_init()?;
    } else {
        registry.with(fmt_layer).try_init()?;
    }

    Ok(())
}
