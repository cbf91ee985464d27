//! Tracing subscriber setup for the `bgremove` binary
//!
//! The library only emits events and spans. `log` records from the I/O
//! services reach the same subscriber through `tracing-subscriber`'s log bridge.

use std::str::FromStr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable selecting the log format (`console`, `compact`, `json`)
pub const LOG_FORMAT_ENV: &str = "BGREMOVE_LOG_FORMAT";

/// Output format of the subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Coloured, human-readable lines
    #[default]
    Console,
    /// Plain lines with targets, for CI and log collectors
    Compact,
    /// One JSON object per event, with span context
    #[cfg(feature = "tracing-json")]
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" | "pretty" => Ok(Self::Console),
            "compact" | "plain" => Ok(Self::Compact),
            #[cfg(feature = "tracing-json")]
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl LogFormat {
    /// Format named by `BGREMOVE_LOG_FORMAT`, falling back to `Console`
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }
}

/// Subscriber settings derived from `-v` flags and the environment
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Number of `-v` flags
    pub verbosity: u8,
    pub format: LogFormat,
    /// Explicit filter directives; wins over `RUST_LOG` and verbosity
    pub directives: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new(verbosity: u8) -> Self {
        Self {
            verbosity,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_directives<S: Into<String>>(mut self, directives: S) -> Self {
        self.directives = Some(directives.into());
        self
    }

    /// Default directives for a verbosity level.
    ///
    /// Request traces from `tower_http` follow the crate's own level so
    /// `-v` shows per-request spans while serving.
    #[must_use]
    pub fn default_directives(verbosity: u8) -> &'static str {
        match verbosity {
            0 => "info,tower_http=info",
            1 => "info,bgremove_service=debug,tower_http=debug",
            _ => "debug,bgremove_service=trace,tower_http=trace",
        }
    }

    /// Explicit directives, then `RUST_LOG` (only without `-v`), then verbosity
    fn filter(&self) -> anyhow::Result<EnvFilter> {
        if let Some(directives) = &self.directives {
            return Ok(EnvFilter::try_new(directives)?);
        }
        if self.verbosity == 0 {
            if let Ok(from_env) = EnvFilter::try_from_default_env() {
                return Ok(from_env);
            }
        }
        Ok(EnvFilter::try_new(Self::default_directives(self.verbosity))?)
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// Invalid filter directives, or a subscriber already being installed
    pub fn init(self) -> anyhow::Result<()> {
        let registry = Registry::default().with(self.filter()?);

        match self.format {
            LogFormat::Console => registry
                .with(fmt::layer().with_target(false).compact())
                .try_init()?,
            LogFormat::Compact => registry
                .with(fmt::layer().with_ansi(false).with_target(true).compact())
                .try_init()?,
            #[cfg(feature = "tracing-json")]
            LogFormat::Json => registry
                .with(fmt::layer().json().with_current_span(true).with_span_list(false))
                .try_init()?,
        }

        tracing::debug!(verbosity = self.verbosity, format = ?self.format, "Tracing initialized");
        Ok(())
    }
}
