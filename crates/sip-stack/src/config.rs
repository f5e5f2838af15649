//! Stack configuration, loadable from TOML.
//!
//! ```toml
//! discard_stray_responses = true
//!
//! [timers]
//! t1 = 500
//! t2 = 4000
//!
//! [logging]
//! filter = "sipwire_transaction_core=debug,info"
//!
//! [[transports]]
//! kind = "udp"
//! bind = "0.0.0.0:5060"
//! ```
//!
//! Every field is optional; missing timers keep their RFC 3261 defaults.

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sipwire_infra_common::{setup_logging, LoggingConfig};
use sipwire_sip_core::TransportType;
use sipwire_transaction_core::TimerSettings;

use tracing::info;

use crate::error::{Error, Result};

/// Transports that can be created from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Udp,
}

impl TransportKind {
    pub fn transport_type(self) -> TransportType {
        match self {
            TransportKind::Udp => TransportType::Udp,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.transport_type(), f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub bind: SocketAddr,
}

impl TransportConfig {
    pub fn udp(bind: SocketAddr) -> Self {
        TransportConfig {
            kind: TransportKind::Udp,
            bind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Drop responses that match no client transaction
    pub discard_stray_responses: bool,
    /// Rewrite response CSeq numbers to match the request
    pub fix_bad_cseq_numbers: bool,
    pub timers: TimerSettings,
    pub logging: LoggingConfig,
    pub transports: Vec<TransportConfig>,
}

impl Default for StackConfig {
    fn default() -> Self {
        StackConfig {
            discard_stray_responses: true,
            fix_bad_cseq_numbers: false,
            timers: TimerSettings::default(),
            logging: LoggingConfig::default(),
            transports: Vec::new(),
        }
    }
}

impl StackConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: StackConfig = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transports.push(transport);
        self
    }

    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Reject timer values and log filters the stack cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.timers
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        self.logging
            .validate()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Install the global `tracing` subscriber from the `[logging]` table.
    pub fn init_logging(&self) -> Result<()> {
        setup_logging(&self.logging)?;
        info!(version = env!("CARGO_PKG_VERSION"), "Starting sipwire");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = StackConfig::from_toml_str("").unwrap();
        assert_eq!(config, StackConfig::default());
        assert_eq!(config.timers.t1, Duration::from_millis(500));
        assert!(config.discard_stray_responses);
        assert!(!config.fix_bad_cseq_numbers);
    }

    #[test]
    fn test_parse_full_config() {
        let config = StackConfig::from_toml_str(
            r#"
            fix_bad_cseq_numbers = true

            [timers]
            t1 = 250
            t100 = 100

            [[transports]]
            kind = "udp"
            bind = "127.0.0.1:5070"
            "#,
        )
        .unwrap();

        assert!(config.fix_bad_cseq_numbers);
        assert_eq!(config.timers.t1, Duration::from_millis(250));
        assert_eq!(config.timers.t100, Duration::from_millis(100));
        assert_eq!(config.timers.t2, Duration::from_secs(4));
        assert_eq!(
            config.transports,
            vec![TransportConfig::udp("127.0.0.1:5070".parse().unwrap())]
        );
    }

    #[test]
    fn test_rejects_unknown_transport() {
        let err = StackConfig::from_toml_str(
            r#"
            [[transports]]
            kind = "sctp"
            bind = "127.0.0.1:5060"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_zero_t1() {
        let err = StackConfig::from_toml_str("[timers]\nt1 = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("t1")));
    }

    #[test]
    fn test_rejects_t2_below_t1() {
        let err = StackConfig::from_toml_str("[timers]\nt1 = 500\nt2 = 100\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_logging_table() {
        let config = StackConfig::from_toml_str(
            r#"
            [logging]
            filter = "sipwire_stack=trace,warn"
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(config.logging.filter, "sipwire_stack=trace,warn");
        assert!(config.logging.json);
        assert!(!config.logging.file_info);

        let err = StackConfig::from_toml_str("[logging]\nfilter = \"sipwire=loud\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = StackConfig::default().with_transport(TransportConfig::udp(
            "0.0.0.0:5060".parse().unwrap(),
        ));
        let text = config.to_toml_string().unwrap();
        assert_eq!(StackConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            StackConfig::from_file("/nonexistent/sipwire.toml"),
            Err(Error::Config(_))
        ));
    }
}
