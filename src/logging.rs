//! Structured logging setup.
//!
//! Every component logs through `tracing`; nothing is printed until the host
//! installs a subscriber. [`init_logging`] installs the usual one: an
//! `EnvFilter` (the configured level, overridable by `RUST_LOG`) feeding a
//! JSON or pretty `fmt` layer.
//!
//! ```rust,no_run
//! use waypoint::logging::{init_logging, LoggingSettings};
//!
//! init_logging(&LoggingSettings::default()).expect("logging");
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace/debug/info/warn/error
    pub level: String,
    pub format: LogFormat,
    /// Extra comma-separated directives, e.g. `waypoint::router=debug`
    pub target_filter: Option<String>,
    /// Include file:line (dev only)
    pub include_location: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            target_filter: None,
            include_location: false,
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Build the filter: `RUST_LOG` when set, otherwise the configured level,
/// plus any extra directives.
///
/// # Errors
///
/// When an extra directive does not parse.
pub fn build_filter(settings: &LoggingSettings) -> Result<EnvFilter> {
    let level = parse_level(&settings.level);
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if let Some(targets) = &settings.target_filter {
        for directive in targets.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            let parsed = directive
                .parse::<Directive>()
                .with_context(|| format!("invalid log filter directive `{directive}`"))?;
            filter = filter.add_directive(parsed);
        }
    }
    Ok(filter)
}

/// Install the global subscriber.
///
/// # Errors
///
/// When a filter directive is invalid or a global subscriber is already set.
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = build_filter(settings)?;

    let fmt_layer = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(settings.include_location)
            .with_line_number(settings.include_location)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(settings.include_location)
            .with_line_number(settings.include_location)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}
