//! HMAC-SHA256 request signing and response verification.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tidelink_common::testing::{Clock, SystemClock};
use tidelink_core::PayloadSigner;
use tidelink_domain::constants::SIGNATURE_TIMESTAMP_FORMAT;
use tidelink_domain::{Result, TidelinkError};

type HmacSha256 = Hmac<Sha256>;

/// Shared-secret signer.
///
/// Outgoing bodies are signed together with a UTC second-resolution
/// timestamp and the device identifier: `body|yyyyMMddHHmmss|device_id`.
/// Incoming bodies are verified over the raw bytes alone.
#[derive(Clone)]
pub struct HmacSigner {
    keyed: HmacSha256,
    device_id: String,
    clock: Arc<dyn Clock>,
}

impl HmacSigner {
    /// # Errors
    /// [`TidelinkError::Config`] for an empty secret.
    pub fn new(secret: impl Into<Vec<u8>>, device_id: impl Into<String>) -> Result<Self> {
        Self::with_clock(secret, device_id, Arc::new(SystemClock))
    }

    /// # Errors
    /// [`TidelinkError::Config`] for an empty secret.
    pub fn with_clock(
        secret: impl Into<Vec<u8>>,
        device_id: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(TidelinkError::Config("signing secret must not be empty".into()));
        }
        let keyed = HmacSha256::new_from_slice(&secret)
            .map_err(|err| TidelinkError::Config(format!("invalid signing secret: {err}")))?;
        Ok(Self { keyed, device_id: device_id.into(), clock })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl PayloadSigner for HmacSigner {
    fn sign(&self, payload: &[u8]) -> String {
        let timestamp = self.clock.utc_now().format(SIGNATURE_TIMESTAMP_FORMAT).to_string();

        let mut mac = self.keyed.clone();
        mac.update(payload);
        mac.update(b"|");
        mac.update(timestamp.as_bytes());
        mac.update(b"|");
        mac.update(self.device_id.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    fn verify(&self, payload: &[u8], signature: Option<&str>) -> bool {
        let Some(signature) = signature.filter(|s| !s.is_empty()) else {
            return false;
        };
        let Ok(expected) = STANDARD.decode(signature.trim()) else {
            return false;
        };

        let mut mac = self.keyed.clone();
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner")
            .field("secret", &"<redacted>")
            .field("device_id", &self.device_id)
            .finish()
    }
}
