//! Shared tracing configuration for the tessera workspace.
//!
//! Every binary, benchmark and integration test installs its `tracing`
//! subscriber through this crate so the log surface stays the same across
//! the workspace. Transfer timing lives in [`transfer`].

pub mod transfer;

use std::env;
use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Registry};

pub use transfer::TransferSpan;

/// Log surface settings for tessera binaries, benches and tests
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// `EnvFilter` directives such as `tessera_core=debug,info`; overrides `RUST_LOG`
    pub directives: Option<String>,
    /// Filter used when neither `directives` nor `RUST_LOG` is set
    pub default_directive: String,
    /// Print module paths next to each event
    pub include_targets: bool,
    /// Colour escapes; ignored for JSON
    pub ansi: bool,
    pub span_events: FmtSpan,
    pub output: TracingOutput,
    /// `transfer_complete` events are dropped for faster transfers
    pub transfer_threshold_us: Option<u64>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_local()
    }
}

/// Non-blank value of an environment variable
fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

impl TracingConfig {
    /// Pretty, coloured output at `info`
    pub fn for_local() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: true,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Pretty,
            transfer_threshold_us: None,
        }
    }

    /// JSON lines without colour, for log collectors
    pub fn for_ci() -> Self {
        Self {
            ansi: false,
            output: TracingOutput::Json,
            ..Self::for_local()
        }
    }

    /// Start from a preset and apply overrides from the environment
    ///
    /// | variable                        | effect                              |
    /// |---------------------------------|-------------------------------------|
    /// | `TESSERA_TRACING_PROFILE`       | `ci` selects [`for_ci`](Self::for_ci) |
    /// | `TESSERA_TRACING_DIRECTIVES`    | sets `directives`                   |
    /// | `TESSERA_TRACING_FORMAT`        | `pretty`, `compact` or `json`       |
    /// | `TESSERA_TRANSFER_THRESHOLD_US` | sets `transfer_threshold_us`        |
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let ci = env_value("TESSERA_TRACING_PROFILE").map_or(false, |p| p.trim().eq_ignore_ascii_case("ci"));
        let mut config = if ci { Self::for_ci() } else { Self::for_local() };

        config.directives = env_value("TESSERA_TRACING_DIRECTIVES").or(config.directives);
        if let Some(output) = env_value("TESSERA_TRACING_FORMAT").and_then(|v| TracingOutput::from_env_value(&v)) {
            config.output = output;
            config.ansi &= output != TracingOutput::Json;
        }
        if let Some(threshold_us) = env_value("TESSERA_TRANSFER_THRESHOLD_US").and_then(|v| v.trim().parse().ok()) {
            config.transfer_threshold_us = Some(threshold_us);
        }
        config
    }

    fn resolve_filter(&self) -> Result<EnvFilter, TracingSetupError> {
        match &self.directives {
            Some(directives) => {
                EnvFilter::try_new(directives).map_err(|err| TracingSetupError::InvalidFilter(err.to_string()))
            }
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_directive))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    /// `directives` is not a valid `EnvFilter`
    #[error("invalid tracing directive: {0}")]
    InvalidFilter(String),
    /// Another global subscriber got there first
    #[error("failed to install global tracing subscriber: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingOutput {
    Compact,
    Pretty,
    Json,
}

impl TracingOutput {
    fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Subscriber for `config`, without installing it
///
/// Tests use this with [`tracing::subscriber::with_default`].
pub fn build_subscriber(config: &TracingConfig) -> Result<impl Subscriber + Send + Sync, TracingSetupError> {
    let filter = config.resolve_filter()?;
    Ok(Registry::default().with(fmt_layer(config)).with(filter))
}

fn fmt_layer(config: &TracingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let base = tracing_fmt::layer()
        .with_target(config.include_targets)
        .with_span_events(config.span_events.clone());

    match config.output {
        TracingOutput::Compact => Box::new(base.compact().with_ansi(config.ansi)),
        TracingOutput::Pretty => Box::new(base.pretty().with_ansi(config.ansi)),
        TracingOutput::Json => Box::new(base.json().with_ansi(false)),
    }
}

/// Install the subscriber for the whole process and set the transfer threshold
pub fn init_global_tracing(config: &TracingConfig) -> Result<(), TracingSetupError> {
    build_subscriber(config)?.try_init()?;
    transfer::set_transfer_threshold(config.transfer_threshold_us);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: [&str; 5] = [
        "TESSERA_TRACING_PROFILE",
        "TESSERA_TRACING_DIRECTIVES",
        "TESSERA_TRACING_FORMAT",
        "TESSERA_TRANSFER_THRESHOLD_US",
        "RUST_LOG",
    ];

    fn reset_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn rejects_invalid_directive() {
        reset_env();
        let config = TracingConfig {
            directives: Some("=::invalid".to_string()),
            ..TracingConfig::default()
        };
        let result = build_subscriber(&config);
        assert!(matches!(result, Err(TracingSetupError::InvalidFilter(_))));
    }

    #[test]
    #[serial]
    fn builds_with_defaults() {
        reset_env();
        assert!(build_subscriber(&TracingConfig::default()).is_ok());
        assert!(build_subscriber(&TracingConfig::for_ci()).is_ok());
    }

    #[test]
    #[serial]
    fn from_env_defaults_to_local() {
        reset_env();
        let config = TracingConfig::from_env();
        assert_eq!(config.output, TracingOutput::Pretty);
        assert!(config.ansi);
        assert_eq!(config.directives, None);
        assert_eq!(config.transfer_threshold_us, None);
    }

    #[test]
    #[serial]
    fn from_env_respects_profile_and_format() {
        reset_env();
        env::set_var("TESSERA_TRACING_PROFILE", "ci");
        env::set_var("TESSERA_TRACING_FORMAT", "compact");
        env::set_var("TESSERA_TRACING_DIRECTIVES", "tessera_core=debug");

        let config = TracingConfig::from_env();
        assert_eq!(config.directives.as_deref(), Some("tessera_core=debug"));
        assert!(!config.ansi);
        assert_eq!(config.output, TracingOutput::Compact);
        reset_env();
    }

    #[test]
    #[serial]
    fn from_env_reads_transfer_threshold() {
        reset_env();
        env::set_var("TESSERA_TRANSFER_THRESHOLD_US", "500");
        assert_eq!(TracingConfig::from_env().transfer_threshold_us, Some(500));

        env::set_var("TESSERA_TRANSFER_THRESHOLD_US", "soon");
        assert_eq!(TracingConfig::from_env().transfer_threshold_us, None);
        reset_env();
    }

    #[test]
    #[serial]
    fn json_format_disables_ansi() {
        reset_env();
        env::set_var("TESSERA_TRACING_FORMAT", "JSON");
        let config = TracingConfig::from_env();
        assert_eq!(config.output, TracingOutput::Json);
        assert!(!config.ansi);

        env::set_var("TESSERA_TRACING_FORMAT", "xml");
        env::set_var("TESSERA_TRACING_DIRECTIVES", "   ");
        let config = TracingConfig::from_env();
        assert_eq!(config.output, TracingOutput::Pretty);
        assert_eq!(config.directives, None);
        reset_env();
    }
}
