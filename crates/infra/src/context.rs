//! Wiring of the concrete adapters into a running [`NetworkClient`].

use std::sync::Arc;

use anyhow::Context as _;
use tidelink_common::testing::SystemClock;
use tidelink_core::{
    ConnectivityMonitorConfig, ConnectivityProbe, DeferralStore, DuplexSession, NetworkClient,
    RequestScheduler, SessionSettings,
};
use tidelink_domain::{Config, HttpMethod, RequestBuilder, RetryPolicy};
use tracing::{info, instrument, warn};

use crate::connectivity::TcpReachabilityProbe;
use crate::http::HttpClient;
use crate::realtime::WebSocketTransport;
use crate::security::{device_id, HmacSigner};
use crate::storage::FileDeferralStorage;

/// A started client plus the adapters it was built from.
pub struct ClientContext {
    config: Config,
    device_id: String,
    probe: Arc<TcpReachabilityProbe>,
    client: NetworkClient,
}

impl ClientContext {
    /// Builds and starts every component described by `config`.
    ///
    /// Must be called inside a Tokio runtime. A session configured with
    /// `auto_connect` that fails to connect is logged, not fatal.
    ///
    /// # Errors
    /// Invalid configuration, an unwritable data directory, or a component
    /// that cannot be constructed.
    #[instrument(skip(config), fields(data_dir = %config.data_dir.display()))]
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;

        let device_id = match &config.signing.device_id {
            Some(id) => id.clone(),
            None => device_id::load_or_create(&config.data_dir)
                .await
                .context("failed to load device id")?,
        };

        let signer = HmacSigner::new(config.signing.secret_key.as_bytes(), device_id.clone())
            .context("failed to create signer")?;
        let http = HttpClient::from_config(&config.http).context("failed to create HTTP client")?;
        let scheduler = RequestScheduler::new(Arc::new(http), Arc::new(signer), &config.scheduler)
            .context("failed to create scheduler")?;

        let storage = Arc::new(FileDeferralStorage::new(config.data_dir.clone()));
        let deferrals =
            DeferralStore::open(storage, &config.deferral.storage_key, Arc::new(SystemClock)).await;

        let probe = Arc::new(TcpReachabilityProbe::new(&config.connectivity));
        probe.start().await;
        let shared_probe: Arc<dyn ConnectivityProbe> = probe.clone();

        let session = match &config.session.url {
            Some(url) => Some(
                DuplexSession::new(
                    Arc::new(WebSocketTransport::new(url.clone())),
                    Arc::clone(&shared_probe),
                    SessionSettings::from(&config.session),
                )
                .context("failed to create duplex session")?,
            ),
            None => None,
        };

        let client = NetworkClient::new(
            scheduler,
            deferrals,
            shared_probe,
            session,
            ConnectivityMonitorConfig::from(&config.connectivity),
        );
        client.start().await.context("failed to start network client")?;

        if config.session.auto_connect && config.session.url.is_some() {
            if let Err(err) = client.connect_session().await {
                warn!(error = %err, "Duplex session did not connect at start-up");
            }
        }

        info!(device_id = %device_id, "Network client ready");
        Ok(Self { config, device_id, probe, client })
    }

    pub fn client(&self) -> &NetworkClient {
        &self.client
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Request builder carrying the configured base URL, timeout and retry
    /// budget.
    pub fn request_builder(&self, method: HttpMethod) -> RequestBuilder {
        let http = &self.config.http;
        let mut builder = RequestBuilder::new(method)
            .timeout(http.default_timeout())
            .retry(RetryPolicy::default(), http.default_max_retries);
        if let Some(base_url) = &http.base_url {
            builder = builder.base_url(base_url.clone());
        }
        builder
    }

    /// Shuts the client down and stops the reachability probe.
    pub async fn shutdown(&self) {
        self.client.shutdown().await;
        self.probe.stop().await;
    }
}
