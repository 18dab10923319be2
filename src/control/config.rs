//! Configuration loading for the control module.

use anyhow::Context;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::common::error::{Error, Result};

/// Well-known port of the enforcement process's control socket.
pub const DEFAULT_CONTROL_PORT: u16 = 1217;

/// Executable started on activation.
pub const DEFAULT_EXECUTABLE: &str = "hmac_userspace_daemon";

/// Configuration for the MAC program controller and the CSI collector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ControllerConfig {
    /// Address of the enforcement process's ZeroMQ REP socket (loopback)
    pub control_host: IpAddr,
    /// Port of the enforcement process's control socket
    pub control_port: u16,
    /// Path or name of the enforcement executable
    pub executable: String,
    /// Value of the `-d` flag passed to the enforcement executable
    pub debug_level: u8,
    /// Upper bound for one send or receive on the control channel (ms)
    pub request_timeout_ms: u64,
    /// Upper bound for establishing the control connection (ms)
    pub connect_timeout_ms: u64,
    /// Wait between opening the medium and terminating enforcement (ms)
    pub settle_delay_ms: u64,
    /// Default interval between CSI samples (ms)
    pub csi_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            control_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            control_port: DEFAULT_CONTROL_PORT,
            executable: DEFAULT_EXECUTABLE.to_string(),
            debug_level: 0,
            request_timeout_ms: 5_000,
            connect_timeout_ms: 2_000,
            settle_delay_ms: 1_000,
            csi_interval_ms: 1_000,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Missing keys take their default values; the result is validated.
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))
            .map_err(|e| Error::Config(format!("{:#}", e)))?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ControllerConfig = toml::from_str(content)
            .context("Failed to parse config file")
            .map_err(|e| Error::Config(format!("{:#}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.control_port == 0 {
            return Err(Error::Config("control-port must be non-zero".to_string()));
        }
        if self.executable.trim().is_empty() {
            return Err(Error::Config("executable must not be empty".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("request-timeout-ms must be non-zero".to_string()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(Error::Config("connect-timeout-ms must be non-zero".to_string()));
        }
        Ok(())
    }

    /// ZeroMQ endpoint of the control socket, e.g. `tcp://127.0.0.1:1217`.
    pub fn control_endpoint(&self) -> String {
        format!("tcp://{}", SocketAddr::new(self.control_host, self.control_port))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn csi_interval(&self) -> Duration {
        Duration::from_millis(self.csi_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ControllerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.control_endpoint(), "tcp://127.0.0.1:1217");
        assert_eq!(config.settle_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_kebab_case_keys() {
        let config = ControllerConfig::from_toml_str(
            r#"
            control-port = 5555
            executable = "/opt/hmac/bin/hybrid_tdma_csma_mac"
            debug-level = 2
            settle-delay-ms = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.control_port, 5555);
        assert_eq!(config.executable, "/opt/hmac/bin/hybrid_tdma_csma_mac");
        assert_eq!(config.debug_level, 2);
        assert_eq!(config.settle_delay_ms, 10);
        assert_eq!(config.request_timeout_ms, 5_000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(ControllerConfig::from_toml_str("control-port = 0"), Err(Error::Config(_))));
        assert!(matches!(ControllerConfig::from_toml_str("executable = \" \""), Err(Error::Config(_))));
        assert!(matches!(ControllerConfig::from_toml_str("request-timeout-ms = 0"), Err(Error::Config(_))));
        assert!(matches!(ControllerConfig::from_toml_str("control-port = \"x\""), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = ControllerConfig::load(Path::new("/nonexistent/hmac/config.toml"));
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("Failed to read config file")),
            other => panic!("expected config error, got {:?}", other),
        }
    }
}
