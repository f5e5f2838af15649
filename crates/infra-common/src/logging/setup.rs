use crate::errors::types::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

/// How the process-wide `tracing` subscriber is installed.
///
/// Deserialises from a `[logging]` table:
///
/// ```toml
/// filter = "sipwire_transaction_core=debug,info"
/// json = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives. `RUST_LOG` takes precedence when set.
    pub filter: String,
    /// Emit one JSON object per event
    pub json: bool,
    /// Include file and line information
    pub file_info: bool,
    /// Log span enter/exit events
    pub log_spans: bool,
    /// Write through the test harness so output is captured per test
    #[serde(skip)]
    pub test_writer: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
            json: false,
            file_info: false,
            log_spans: false,
            test_writer: false,
        }
    }
}

impl LoggingConfig {
    pub fn new(filter: impl Into<String>) -> Self {
        LoggingConfig {
            filter: filter.into(),
            ..Default::default()
        }
    }

    /// Enable JSON formatting
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Enable file and line information in logs
    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    /// Enable span logging
    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }

    pub fn with_test_writer(mut self) -> Self {
        self.test_writer = true;
        self
    }

    /// Check that [`filter`](Self::filter) parses.
    pub fn validate(&self) -> Result<()> {
        self.configured_filter().map(|_| ())
    }

    fn configured_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.filter)
            .map_err(|e| Error::Config(format!("invalid log filter '{}': {}", self.filter, e)))
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
                .map_err(|e| Error::Config(format!("invalid RUST_LOG '{}': {}", directives, e))),
            _ => self.configured_filter(),
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// Fails with [`Error::Logging`] when a global subscriber is already set.
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(config.env_filter()?)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let result = match (config.json, config.test_writer) {
        (true, true) => builder.json().with_test_writer().try_init(),
        (true, false) => builder.json().try_init(),
        (false, true) => builder.with_test_writer().try_init(),
        (false, false) => builder.try_init(),
    };
    result.map_err(|e| Error::Logging(e.to_string()))?;

    tracing::debug!(filter = %config.filter, json = config.json, "Logging initialised");
    Ok(())
}

/// Install a test-captured subscriber for `filter`, once per test binary.
/// Later calls are no-ops.
pub fn init_test_logging(filter: &str) {
    let _ = setup_logging(&LoggingConfig::new(filter).with_test_writer());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_filter_validation() {
        assert!(LoggingConfig::new("sipwire_transaction_core=debug,info")
            .validate()
            .is_ok());
        assert!(matches!(
            LoggingConfig::new("sipwire=loud").validate(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_builder_flags() {
        let config = LoggingConfig::new("trace")
            .with_json()
            .with_file_info()
            .with_spans()
            .with_test_writer();
        assert!(config.json && config.file_info && config.log_spans && config.test_writer);
        assert_eq!(config.filter, "trace");
    }

    #[test]
    #[serial]
    fn test_second_setup_reports_error() {
        init_test_logging("debug");
        assert!(matches!(
            setup_logging(&LoggingConfig::default().with_test_writer()),
            Err(Error::Logging(_))
        ));
    }
}
