//! Request descriptors and the fluent builder that produces them.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CONTENT_TYPE_HEADER, DEFAULT_CONTENT_TYPE, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS,
    LINEAR_RETRY_DELAY_SECS,
};
use crate::errors::{Result, TidelinkError};

/// HTTP verb of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Canonical upper-case verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            _ => Err(format!("Invalid HttpMethod: {s}")),
        }
    }
}

/// How a failed attempt is rescheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// Fail on the first error.
    #[default]
    None,
    /// Fixed two second delay between attempts.
    Linear,
    /// `2^retry_count` seconds between attempts.
    ExponentialBackoff,
}

impl RetryPolicy {
    /// Delay before the attempt numbered `retry_count` (1 for the first
    /// retry). Returns `None` for [`RetryPolicy::None`].
    #[must_use]
    pub fn delay_for(self, retry_count: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Linear => Some(Duration::from_secs(LINEAR_RETRY_DELAY_SECS)),
            Self::ExponentialBackoff => {
                let secs = 2u64.checked_pow(retry_count).unwrap_or(u64::MAX);
                Some(Duration::from_secs(secs))
            }
        }
    }
}

/// Opaque caller value carried from a descriptor to its [`Response`].
///
/// It never leaves the process and is skipped when a descriptor is persisted.
///
/// [`Response`]: crate::types::Response
#[derive(Clone)]
pub struct RequestContext(Arc<dyn Any + Send + Sync>);

impl RequestContext {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrows the wrapped value when it has type `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestContext(..)")
    }
}

/// Everything needed to perform one outbound call.
///
/// Submitting a descriptor moves it into the scheduler, after which nothing
/// outside the scheduler can change it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: String,
    #[serde(with = "crate::utils::serde::base64_bytes")]
    pub body: Vec<u8>,
    #[serde(with = "crate::utils::serde::duration_secs_f64")]
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_policy: RetryPolicy,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(skip)]
    pub context: Option<RequestContext>,
}

impl RequestDescriptor {
    /// Starts a builder for `method`.
    #[must_use]
    pub fn builder(method: HttpMethod) -> RequestBuilder {
        RequestBuilder::new(method)
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Fluent builder for [`RequestDescriptor`].
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use tidelink_domain::{HttpMethod, RequestBuilder, RetryPolicy};
///
/// let request = RequestBuilder::new(HttpMethod::Post)
///     .url("https://api.example.com/orders")
///     .body(b"payload".to_vec())
///     .timeout(Duration::from_secs(5))
///     .retry(RetryPolicy::ExponentialBackoff, 3)
///     .build()
///     .unwrap();
///
/// assert_eq!(request.max_retries, 3);
/// assert_eq!(request.header("content-type"), Some("application/x-protobuf"));
/// ```
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: HttpMethod,
    url: Option<String>,
    base_url: Option<String>,
    body: Vec<u8>,
    timeout: Duration,
    max_retries: u32,
    retry_policy: RetryPolicy,
    headers: BTreeMap<String, String>,
    context: Option<RequestContext>,
}

impl RequestBuilder {
    #[must_use]
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            url: None,
            base_url: None,
            body: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_policy: RetryPolicy::None,
            headers: BTreeMap::new(),
            context: None,
        }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get).url(url)
    }

    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post).url(url)
    }

    /// Base used to derive `<base>/<method>` when no explicit URL is set.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Encodes `value` as JSON and uses it as the body.
    ///
    /// # Errors
    /// Returns [`TidelinkError::InvalidInput`] if `value` cannot be encoded.
    pub fn json_body<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = serde_json::to_vec(value)
            .map_err(|e| TidelinkError::InvalidInput(format!("Failed to encode body: {e}")))?;
        self.headers.insert(CONTENT_TYPE_HEADER.to_string(), "application/json".to_string());
        Ok(self)
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy, max_retries: u32) -> Self {
        self.retry_policy = policy;
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn context<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.context = Some(RequestContext::new(value));
        self
    }

    /// Finalises the descriptor.
    ///
    /// # Errors
    /// Returns [`TidelinkError::InvalidInput`] when the timeout is zero or
    /// neither a URL nor a base URL was supplied.
    pub fn build(mut self) -> Result<RequestDescriptor> {
        if self.timeout.is_zero() {
            return Err(TidelinkError::InvalidInput("timeout must be positive".into()));
        }

        let url = match (self.url, self.base_url) {
            (Some(url), _) => url,
            (None, Some(base)) => {
                format!("{}/{}", base.trim_end_matches('/'), self.method.as_str().to_lowercase())
            }
            (None, None) => {
                return Err(TidelinkError::InvalidInput("request has no URL".into()));
            }
        };

        let has_content_type =
            self.headers.keys().any(|key| key.eq_ignore_ascii_case(CONTENT_TYPE_HEADER));
        if !has_content_type {
            self.headers.insert(CONTENT_TYPE_HEADER.to_string(), DEFAULT_CONTENT_TYPE.to_string());
        }

        Ok(RequestDescriptor {
            method: self.method,
            url,
            body: self.body,
            timeout: self.timeout,
            max_retries: self.max_retries,
            retry_policy: self.retry_policy,
            headers: self.headers,
            context: self.context,
        })
    }
}
