//! gNMI client configuration

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use fp_common::LoggingConfig;
use serde::{Deserialize, Serialize};

use crate::error::{GnmiError, Result};
use crate::gnmi;

/// Top-level configuration for the gNMI client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GnmiConfig {
    /// gNMI settings
    pub gnmi: GnmiSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// gNMI-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GnmiSettings {
    /// Devices under test
    pub targets: Vec<GnmiTarget>,
}

/// A gNMI target device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GnmiTarget {
    /// Name used in logs and emitted telemetry
    pub name: String,

    /// gRPC endpoint (e.g., "192.168.1.1:9339")
    pub address: String,

    /// Authentication credentials
    #[serde(default)]
    pub credentials: Option<Credentials>,

    /// TLS configuration
    #[serde(default)]
    pub tls: TlsConfig,

    /// Subscription paths
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,

    /// Subscription list mode
    #[serde(default)]
    pub list_mode: ListMode,

    /// gNMI encoding for requests
    #[serde(default)]
    pub encoding: GnmiEncoding,

    /// Latency to inject on every call, as a Go duration string ("250ms")
    #[serde(default)]
    pub latency: Option<String>,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Delay before reconnecting a failed subscription, in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

/// Authentication credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Username for authentication
    pub username: String,

    /// Password for authentication
    pub password: String,
}

/// TLS configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Enable TLS
    #[serde(default)]
    pub enabled: bool,

    /// Server name to verify instead of the address host
    #[serde(default)]
    pub server_name: Option<String>,

    /// Path to CA certificate file
    #[serde(default)]
    pub ca_cert: Option<String>,

    /// Path to client certificate file
    #[serde(default)]
    pub client_cert: Option<String>,

    /// Path to client key file
    #[serde(default)]
    pub client_key: Option<String>,
}

/// A gNMI subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// XPath or gNMI path to subscribe to
    pub path: String,

    /// Subscription mode
    #[serde(default)]
    pub mode: SubscriptionMode,

    /// Sample interval in milliseconds (for SAMPLE mode)
    #[serde(default = "default_sample_interval")]
    pub sample_interval_ms: u64,

    /// Suppress redundant updates
    #[serde(default)]
    pub suppress_redundant: bool,

    /// Heartbeat interval in milliseconds
    #[serde(default)]
    pub heartbeat_interval_ms: u64,
}

/// Subscription mode
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionMode {
    /// Stream updates as they occur
    #[default]
    OnChange,

    /// Sample at fixed intervals
    Sample,

    /// Target determines update timing
    TargetDefined,
}

/// Subscription list mode
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListMode {
    /// Long-lived stream
    #[default]
    Stream,

    /// Single snapshot followed by sync_response, then the target closes
    Once,
}

/// gNMI encoding format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GnmiEncoding {
    /// JSON encoding
    Json,

    /// JSON with IETF formatting
    #[default]
    JsonIetf,

    /// Protocol Buffers
    Proto,

    /// ASCII text
    Ascii,
}

fn default_sample_interval() -> u64 {
    10000 // 10 seconds
}

fn default_connect_timeout() -> u64 {
    10000
}

fn default_reconnect_delay() -> u64 {
    5000
}

impl GnmiConfig {
    /// Load configuration from a JSON5 file and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = fp_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string and validate it
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = fp_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.gnmi.targets.is_empty() {
            return Err(GnmiError::Validation(
                "at least one target is required".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for target in &self.gnmi.targets {
            if target.name.is_empty() {
                return Err(GnmiError::Validation("target name is empty".to_string()));
            }
            if target.address.is_empty() {
                return Err(GnmiError::Validation(format!(
                    "target '{}' has no address",
                    target.name
                )));
            }
            if !names.insert(target.name.as_str()) {
                return Err(GnmiError::Validation(format!(
                    "duplicate target name '{}'",
                    target.name
                )));
            }
            if target.tls.client_cert.is_some() != target.tls.client_key.is_some() {
                return Err(GnmiError::Validation(format!(
                    "target '{}': client_cert and client_key must be set together",
                    target.name
                )));
            }
        }

        Ok(())
    }

    /// Look up a target by name, or the first target when `name` is `None`
    pub fn target(&self, name: Option<&str>) -> Result<&GnmiTarget> {
        match name {
            Some(name) => self
                .gnmi
                .targets
                .iter()
                .find(|t| t.name == name)
                .ok_or_else(|| GnmiError::UnknownTarget(name.to_string())),
            None => self
                .gnmi
                .targets
                .first()
                .ok_or_else(|| GnmiError::Validation("no targets configured".to_string())),
        }
    }
}

impl GnmiTarget {
    /// Minimal plaintext target, mostly useful for tests and ad-hoc use
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            credentials: None,
            tls: TlsConfig::default(),
            subscriptions: Vec::new(),
            list_mode: ListMode::default(),
            encoding: GnmiEncoding::default(),
            latency: None,
            connect_timeout_ms: default_connect_timeout(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl GnmiEncoding {
    /// Convert to gNMI proto encoding value
    pub fn to_proto(&self) -> i32 {
        match self {
            GnmiEncoding::Json => gnmi::Encoding::Json as i32,
            GnmiEncoding::JsonIetf => gnmi::Encoding::JsonIetf as i32,
            GnmiEncoding::Proto => gnmi::Encoding::Proto as i32,
            GnmiEncoding::Ascii => gnmi::Encoding::Ascii as i32,
        }
    }
}

impl SubscriptionMode {
    pub fn to_proto(&self) -> i32 {
        match self {
            SubscriptionMode::OnChange => gnmi::SubscriptionMode::OnChange as i32,
            SubscriptionMode::Sample => gnmi::SubscriptionMode::Sample as i32,
            SubscriptionMode::TargetDefined => gnmi::SubscriptionMode::TargetDefined as i32,
        }
    }
}

impl ListMode {
    pub fn to_proto(&self) -> i32 {
        match self {
            ListMode::Stream => gnmi::subscription_list::Mode::Stream as i32,
            ListMode::Once => gnmi::subscription_list::Mode::Once as i32,
        }
    }
}
