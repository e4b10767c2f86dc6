//! Duplex session state and link quality.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::impl_domain_enum_conversions;

/// Lifecycle of the duplex connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl_domain_enum_conversions!(SessionState {
    Disconnected => "disconnected",
    Connecting => "connecting",
    Connected => "connected",
    Closing => "closing",
});

/// Observed quality of the device's network link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkQuality {
    /// Local network or Wi-Fi class link.
    #[default]
    HighQuality,
    /// Cellular or otherwise metered link.
    Metered,
    /// Reachable but unclassified or poor.
    Degraded,
    Unreachable,
}

impl_domain_enum_conversions!(LinkQuality {
    HighQuality => "high_quality",
    Metered => "metered",
    Degraded => "degraded",
    Unreachable => "unreachable",
});

impl LinkQuality {
    #[must_use]
    pub const fn is_reachable(self) -> bool {
        !matches!(self, Self::Unreachable)
    }

    /// Factor applied to the base heartbeat interval.
    #[must_use]
    pub const fn heartbeat_multiplier(self) -> u32 {
        match self {
            Self::HighQuality => 1,
            Self::Metered => 3,
            Self::Degraded | Self::Unreachable => 12,
        }
    }

    /// Heartbeat interval for this link given the configured base.
    #[must_use]
    pub fn heartbeat_interval(self, base: Duration) -> Duration {
        base.saturating_mul(self.heartbeat_multiplier())
    }
}

/// Handle returned by a session subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriberId(u64);

impl SubscriberId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}
