//! Configuration structures
//!
//! Every section has a `Default` matching the behaviour the client ships
//! with, so a partially specified file or environment is enough to start.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CONNECTIVITY_POLL_SECS, DEFAULT_DEFERRAL_KEY, DEFAULT_HANDSHAKE_TIMEOUT_SECS,
    DEFAULT_HEARTBEAT_SECS, DEFAULT_KEEPALIVE_PAYLOAD, DEFAULT_MAX_CONCURRENT,
    DEFAULT_MAX_RETRIES, DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_TIER_COUNT, DEFAULT_TIMEOUT_SECS,
};
use crate::errors::{Result, TidelinkError};
use crate::types::LinkQuality;

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the deferral store and device identifier.
    pub data_dir: PathBuf,
    pub scheduler: SchedulerConfig,
    pub deferral: DeferralConfig,
    pub session: SessionConfig,
    pub connectivity: ConnectivityConfig,
    pub signing: SigningConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Rejects settings the runtime cannot honour.
    ///
    /// # Errors
    /// Returns [`TidelinkError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.tier_count == 0 {
            return Err(TidelinkError::Config("scheduler.tier_count must be at least 1".into()));
        }
        if self.scheduler.max_concurrent == 0 {
            return Err(TidelinkError::Config(
                "scheduler.max_concurrent must be at least 1".into(),
            ));
        }
        if self.session.heartbeat_base_secs == 0 {
            return Err(TidelinkError::Config(
                "session.heartbeat_base_secs must be positive".into(),
            ));
        }
        if self.connectivity.poll_interval_secs == 0 {
            return Err(TidelinkError::Config(
                "connectivity.poll_interval_secs must be positive".into(),
            ));
        }
        if self.http.default_timeout_secs == 0 {
            return Err(TidelinkError::Config("http.default_timeout_secs must be positive".into()));
        }
        if self.deferral.storage_key.trim().is_empty() {
            return Err(TidelinkError::Config("deferral.storage_key must not be empty".into()));
        }
        if self.signing.secret_key.is_empty() {
            return Err(TidelinkError::Config("signing.secret_key must be set".into()));
        }
        Ok(())
    }
}

/// Priority tiers and execution slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tier_count: usize,
    pub max_concurrent: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tier_count: DEFAULT_TIER_COUNT, max_concurrent: DEFAULT_MAX_CONCURRENT }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeferralConfig {
    /// Logical name of the persisted pending set.
    pub storage_key: String,
}

impl Default for DeferralConfig {
    fn default() -> Self {
        Self { storage_key: DEFAULT_DEFERRAL_KEY.to_string() }
    }
}

/// Duplex session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Endpoint for the duplex connection; no session is created without it.
    pub url: Option<String>,
    pub heartbeat_base_secs: u64,
    pub keepalive_payload: String,
    pub handshake_timeout_secs: u64,
    /// Connect as part of client start-up.
    pub auto_connect: bool,
}

impl SessionConfig {
    #[must_use]
    pub const fn heartbeat_base(&self) -> Duration {
        Duration::from_secs(self.heartbeat_base_secs)
    }

    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: None,
            heartbeat_base_secs: DEFAULT_HEARTBEAT_SECS,
            keepalive_payload: DEFAULT_KEEPALIVE_PAYLOAD.to_string(),
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            auto_connect: false,
        }
    }
}

/// Reachability sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub poll_interval_secs: u64,
    /// `host:port` dialled by the TCP probe.
    pub probe_address: String,
    pub probe_timeout_ms: u64,
    /// Quality reported while the probe target is reachable.
    pub reachable_quality: LinkQuality,
}

impl ConnectivityConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_CONNECTIVITY_POLL_SECS,
            probe_address: "1.1.1.1:443".to_string(),
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            reachable_quality: LinkQuality::HighQuality,
        }
    }
}

/// Request signing material.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    #[serde(skip_serializing)]
    pub secret_key: String,
    /// Overrides the persisted device identifier when set.
    pub device_id: Option<String>,
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("secret_key", &"<redacted>")
            .field("device_id", &self.device_id)
            .finish()
    }
}

/// Defaults applied to requests built from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: Option<String>,
    pub default_timeout_secs: u64,
    pub default_max_retries: u32,
    pub user_agent: String,
}

impl HttpConfig {
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_max_retries: DEFAULT_MAX_RETRIES,
            user_agent: format!("tidelink/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
