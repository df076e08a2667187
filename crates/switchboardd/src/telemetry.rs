//! Process-wide `tracing` subscriber.
//!
//! Logs go to stderr as flattened JSON objects or compact text lines with
//! RFC 3339 UTC timestamps. Only the first successful call installs a
//! subscriber; later calls report the format already in force.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::filter::{EnvFilter, ParseError};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{Layer, Registry, fmt};

use switchboard_config::{Config, LogFormat};

static INSTALLED: OnceCell<LogFormat> = OnceCell::new();

/// Witness that logging is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
}

impl TelemetryHandle {
    /// Output format of the installed subscriber.
    #[must_use]
    pub const fn format(self) -> LogFormat {
        self.format
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// `log_filter` is not a valid directive list.
    #[error("invalid log filter '{filter}': {source}")]
    Filter {
        /// Rejected expression.
        filter: String,
        /// Parser diagnostic.
        #[source]
        source: ParseError,
    },
    /// A subscriber from elsewhere was installed first.
    #[error("failed to install telemetry subscriber: {0}")]
    Install(#[from] TryInitError),
}

/// Installs the global subscriber described by `config`.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter does not parse or another
/// subscriber already owns the global default.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let format = INSTALLED.get_or_try_init(|| {
        let filter = parse_filter(config.log_filter())?;
        Registry::default()
            .with(output_layer(config.log_format()).with_filter(filter))
            .try_init()?;
        Ok::<_, TelemetryError>(config.log_format())
    })?;
    Ok(TelemetryHandle { format: *format })
}

fn parse_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::builder()
        .parse(expression)
        .map_err(|source| TelemetryError::Filter {
            filter: expression.to_owned(),
            source,
        })
}

fn output_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(true)
        .with_timer(UtcTime::rfc_3339());
    match format {
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::unclosed_span("[")]
    #[case::bad_level("switchboardd=loud")]
    fn malformed_filters_are_rejected(#[case] expression: &str) {
        let error = parse_filter(expression).expect_err("filter should fail");
        assert!(error.to_string().starts_with("invalid log filter"));
    }

    #[test]
    fn directive_lists_parse() {
        parse_filter("info,switchboardd::dispatch=debug").expect("valid filter");
    }
}
