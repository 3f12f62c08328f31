//! Supervisor configuration
//!
//! Every field has a default that reproduces the stock behavior: `PROV_`
//! service names, an unbounded `connect()` wait and immediate reconnects.

use std::time::Duration;

use serde::Deserialize;
use wifiprov_proto::{MacAddress, SERVICE_NAME_PREFIX, ServiceName, ServiceNameError};

use crate::policy::{ExponentialBackoff, Immediate, ReconnectPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Prefix of the provisioning service name
    pub service_name_prefix: String,
    /// Upper bound on `connect()`; unbounded when absent
    pub connect_timeout_ms: Option<u64>,
    pub reconnect: ReconnectConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            service_name_prefix: SERVICE_NAME_PREFIX.to_string(),
            connect_timeout_ms: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ReconnectConfig {
    #[default]
    Immediate,
    Backoff { initial_ms: u64, max_ms: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    ServiceName(#[from] ServiceNameError),
    #[error("backoff initial delay must be non-zero")]
    ZeroBackoff,
}

impl SupervisorConfig {
    /// Parse and validate a JSON config
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let config: SupervisorConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Any MAC will do, only the prefix length is checked
        ServiceName::with_prefix(&self.service_name_prefix, &MacAddress::default())?;
        if let ReconnectConfig::Backoff { initial_ms: 0, .. } = self.reconnect {
            return Err(ConfigError::ZeroBackoff);
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn service_name(&self, mac: &MacAddress) -> Result<ServiceName, ServiceNameError> {
        ServiceName::with_prefix(&self.service_name_prefix, mac)
    }
}

impl ReconnectConfig {
    pub fn build(&self) -> Box<dyn ReconnectPolicy> {
        match *self {
            ReconnectConfig::Immediate => Box::new(Immediate),
            ReconnectConfig::Backoff { initial_ms, max_ms } => Box::new(ExponentialBackoff::new(
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        let config = SupervisorConfig::from_json("{}").unwrap();
        assert_eq!(config, SupervisorConfig::default());
        assert_eq!(config.connect_timeout(), None);
        assert_eq!(config.reconnect, ReconnectConfig::Immediate);
    }

    #[test]
    fn full_config() {
        let config = SupervisorConfig::from_json(
            r#"{
                "service_name_prefix": "WIFI_",
                "connect_timeout_ms": 30000,
                "reconnect": { "strategy": "backoff", "initial_ms": 500, "max_ms": 8000 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(
            config.reconnect,
            ReconnectConfig::Backoff {
                initial_ms: 500,
                max_ms: 8000
            }
        );
        let mac = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(config.service_name(&mac).unwrap().as_str(), "WIFI_DDEEFF");
    }

    #[test]
    fn rejects_bad_prefix() {
        let err = SupervisorConfig::from_json(r#"{ "service_name_prefix": "PROVISION_" }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::ServiceName(_)), "{err}");
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(matches!(
            SupervisorConfig::from_json(r#"{ "retries": 5 }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_zero_backoff() {
        assert!(matches!(
            SupervisorConfig::from_json(
                r#"{ "reconnect": { "strategy": "backoff", "initial_ms": 0, "max_ms": 10 } }"#
            ),
            Err(ConfigError::ZeroBackoff)
        ));
    }
}
