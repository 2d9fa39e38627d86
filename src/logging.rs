//! Logging initialization for the `metadata-ingest` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left to the binary (or
//! to any embedding application). Logs go to stderr so that stdout stays free for JSON-lines
//! catalog output.
//!
//! `RUST_LOG` overrides the configured level when set, e.g.
//! `RUST_LOG=metadata_ingest=debug,mongodb=warn`.

use std::fmt;
use std::io::IsTerminal;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::{fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Minimum level of emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(anyhow::anyhow!("invalid log level: {s}")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// Human-readable text or one JSON object per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Extra comma-separated filter directives, e.g. `object_store=warn`.
    pub filter_directives: Option<String>,
}

impl LogConfig {
    /// Level from the binary's `-v`/`--debug` style flags.
    pub fn from_flags(verbose: bool, debug: bool, json: bool) -> Self {
        let level = if debug {
            LogLevel::Trace
        } else if verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };
        Self {
            level,
            format: if json { LogFormat::Json } else { LogFormat::Text },
            filter_directives: None,
        }
    }

    fn filter(&self) -> Result<EnvFilter> {
        let mut filter = match EnvFilter::try_from_default_env() {
            Ok(from_env) => from_env,
            Err(_) => EnvFilter::default().add_directive(self.level.to_tracing_level().into()),
        };
        if let Some(directives) = self.filter_directives.as_deref() {
            for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
                filter = filter.add_directive(
                    directive
                        .trim()
                        .parse()
                        .with_context(|| format!("invalid log filter directive '{directive}'"))?,
                );
            }
        }
        Ok(filter)
    }
}

/// Install the global subscriber. Call once, at startup.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = config.filter()?;
    let layer = tfmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi(config.format, std::io::stderr().is_terminal()))
        .with_target(matches!(config.level, LogLevel::Trace | LogLevel::Debug));

    match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .context("failed to install log subscriber")?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()
            .context("failed to install log subscriber")?,
    }
    Ok(())
}

/// Colour only human-readable output going to a terminal.
fn use_ansi(format: LogFormat, stderr_is_terminal: bool) -> bool {
    format == LogFormat::Text && stderr_is_terminal
}
