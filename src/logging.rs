//! Logging setup for programs that run a pipeline.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the binary. [`init`] is a ready-made one.
//!
//! Forked workers inherit the subscriber installed in the master, so one call
//! before [`Supervisor::run`](crate::Supervisor::run) covers every process.
//!
//! # Environment variables
//!
//! - `PIPEVISOR_LOG`: filter directives (overrides `RUST_LOG`)
//! - `PIPEVISOR_LOG_FORMAT`: `pretty`, `compact` or `json`
//! - `RUST_LOG`: fallback filter
//!
//! # Example
//!
//! ```no_run
//! use pipevisor::logging::{LogConfig, LogFormat, init};
//!
//! init(LogConfig::default().with_format(LogFormat::Compact).with_env_overrides());
//! ```

use std::fmt;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable.
    #[default]
    Pretty,
    /// Single line per event.
    Compact,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "full" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "unknown log format '{s}', expected pretty, compact or json"
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        })
    }
}

/// Logging configuration for [`init`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base level when no filter is set (default: INFO).
    pub level: Level,
    /// Output format (default: Pretty).
    pub format: LogFormat,
    /// Filter directives; take precedence over `level`.
    pub filter: Option<String>,
    /// Print the event target (default: true).
    pub show_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            filter: None,
            show_target: true,
        }
    }
}

impl LogConfig {
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    /// Applies `PIPEVISOR_LOG` / `RUST_LOG` and `PIPEVISOR_LOG_FORMAT`.
    ///
    /// An explicitly set filter is kept.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if self.filter.is_none() {
            self.filter = var("PIPEVISOR_LOG").or_else(|| var("RUST_LOG"));
        }
        if let Some(format) = var("PIPEVISOR_LOG_FORMAT") {
            match format.parse() {
                Ok(f) => self.format = f,
                Err(e) => eprintln!("warning: {e}"),
            }
        }
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.to_string().to_lowercase());
        match &self.filter {
            Some(filter) => EnvFilter::try_new(filter).unwrap_or_else(|_| {
                eprintln!("warning: invalid log filter '{filter}', using default");
                fallback()
            }),
            None => fallback(),
        }
    }
}

/// Installs the global subscriber on stderr. Later calls are ignored.
pub fn init(config: LogConfig) {
    let filter = config.build_filter();
    let layer = tracing_subscriber::fmt::layer()
        .with_target(config.show_target)
        .with_writer(std::io::stderr);

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(layer.compact())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init(),
    };
    let _ = result;
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("full".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Compact.to_string(), "compact");
    }

    #[test]
    fn pipevisor_log_wins_over_rust_log() {
        let cfg = LogConfig::default().with_overrides_from(env(&[
            ("PIPEVISOR_LOG", "pipevisor=debug"),
            ("RUST_LOG", "warn"),
            ("PIPEVISOR_LOG_FORMAT", "json"),
        ]));
        assert_eq!(cfg.filter.as_deref(), Some("pipevisor=debug"));
        assert_eq!(cfg.format, LogFormat::Json);
    }

    #[test]
    fn explicit_filter_is_kept() {
        let cfg = LogConfig::default()
            .with_filter("error")
            .with_overrides_from(env(&[("RUST_LOG", "trace"), ("PIPEVISOR_LOG_FORMAT", "bogus")]));
        assert_eq!(cfg.filter.as_deref(), Some("error"));
        assert_eq!(cfg.format, LogFormat::Pretty);
    }
}
