//! Periodic HTTP client that fetches remote policy and pushes updates into
//! the [`SettingsStore`], plus the companion expiry sweep.
//!
//! Each timer is a single spawned task driven by a ticker merged with a
//! shutdown signal in one `tokio::select!` loop; no unbounded re-entrancy,
//! a bare `reqwest::Client` wired straight into the periodic updater.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::watch;

use crate::config::AgentConfig;
use crate::error::SamplerError;
use crate::settings::{BucketArgs, RemotePolicy, Settings};
use crate::store::SettingsStore;

const UPDATE_INTERVAL: Duration = Duration::from_secs(30);
const TIMEOUT_INTERVAL: Duration = Duration::from_secs(10);
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// `arguments` object of the settings-fetch wire format. Missing or
/// unparsable numeric fields fall back to `0.0`: `serde` leaves them at
/// the type's default rather than failing the whole deserialize.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireArguments {
    #[serde(default)]
    bucket_capacity: f64,
    #[serde(default)]
    bucket_rate: f64,
    #[serde(default)]
    trigger_relaxed_bucket_capacity: f64,
    #[serde(default)]
    trigger_relaxed_bucket_rate: f64,
    #[serde(default)]
    trigger_strict_bucket_capacity: f64,
    #[serde(default)]
    trigger_strict_bucket_rate: f64,
    #[serde(default)]
    signature_key: Option<String>,
}

/// Top-level settings-fetch response body.
#[derive(Debug, Clone, Default, serde::Deserialize)]
struct WireSettings {
    flags: String,
    value: i64,
    ttl: i64,
    #[serde(default)]
    arguments: WireArguments,
}

impl WireSettings {
    fn into_remote_policy(self) -> RemotePolicy {
        RemotePolicy {
            flags_csv: self.flags,
            rate: self.value,
            ttl: Duration::from_secs(self.ttl.max(0) as u64),
            bucket: BucketArgs {
                rate: self.arguments.bucket_rate,
                capacity: self.arguments.bucket_capacity,
            },
            trigger_relaxed_bucket: BucketArgs {
                rate: self.arguments.trigger_relaxed_bucket_rate,
                capacity: self.arguments.trigger_relaxed_bucket_capacity,
            },
            trigger_strict_bucket: BucketArgs {
                rate: self.arguments.trigger_strict_bucket_rate,
                capacity: self.arguments.trigger_strict_bucket_capacity,
            },
            signature_key: self
                .arguments
                .signature_key
                .map(|s| s.into_bytes())
                .unwrap_or_default(),
        }
    }
}

/// Periodic fetcher for remote sampling policy. Owns the HTTP client and
/// its connection pool for its lifetime; both are dropped on `stop`.
pub struct SettingsFetcher {
    client: reqwest::Client,
    base_url: String,
    service_name: String,
    host_name: String,
    token: String,
    store: Arc<SettingsStore>,
    local: crate::config::LocalSamplingConfig,
    /// Single-slot re-entrancy guard: if a previous tick is still running,
    /// the next one is dropped rather than queued.
    update_guard: AsyncMutex<()>,
    expiry_guard: AsyncMutex<()>,
    /// Set by `start`; used by the update tick itself to self-shutdown on
    /// an auth error, since retrying with a rejected key is pointless.
    self_shutdown: AsyncMutex<Option<watch::Sender<bool>>>,
}

/// Handle returned by [`SettingsFetcher::start`]. Dropping or calling
/// [`FetcherHandle::stop`] requests shutdown for both background timers;
/// calling `stop` twice is a no-op. In-flight fetches are not aborted —
/// they observe the cancellation only at their next `select!` point.
pub struct FetcherHandle {
    shutdown: Option<watch::Sender<bool>>,
}

impl FetcherHandle {
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
    }
}

impl SettingsFetcher {
    /// Builds a fetcher for `config`, bound to `store`. Returns `Ok(None)`
    /// without touching the network if `config.enabled` is `false` — the
    /// caller simply has no fetcher to start. Otherwise fails fast (before
    /// any background task is spawned) if the endpoint or service key are
    /// unusable — treated as a fatal configuration error.
    pub fn new(config: &AgentConfig, store: Arc<SettingsStore>) -> Result<Option<Self>, SamplerError> {
        if !config.enabled {
            return Ok(None);
        }
        if config.service_key.token.is_empty() {
            return Err(SamplerError::Config("service key is empty".to_string()));
        }
        if config.collector.is_empty() {
            return Err(SamplerError::Config("collector endpoint is empty".to_string()));
        }

        let base_url = strip_port(&config.collector);
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|err| SamplerError::Config(err.to_string()))?;

        Ok(Some(SettingsFetcher {
            client,
            base_url,
            service_name: config.service_key.service_name.clone(),
            host_name: config.host_name.clone(),
            token: config.service_key.token.clone(),
            store,
            local: config.local_sampling.clone(),
            update_guard: AsyncMutex::new(()),
            expiry_guard: AsyncMutex::new(()),
            self_shutdown: AsyncMutex::new(None),
        }))
    }

    fn fetch_url(&self) -> String {
        let path = format!(
            "v1/settings/{}/{}",
            url_escape(&self.service_name),
            url_escape(&self.host_name),
        );
        url::Url::parse(&self.base_url)
            .and_then(|base| base.join(&path))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}/{}", self.base_url, path))
    }

    async fn fetch_once(&self) -> Result<RemotePolicy, SamplerError> {
        let response = self
            .client
            .get(self.fetch_url())
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| SamplerError::Fetch(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SamplerError::Auth(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(SamplerError::Fetch(format!("unexpected status {status}")));
        }

        let body: WireSettings = response
            .json()
            .await
            .map_err(|err| SamplerError::Fetch(err.to_string()))?;
        Ok(body.into_remote_policy())
    }

    /// Runs one fetch-and-install cycle outside the periodic ticker. Useful
    /// for an initial blocking fetch at startup, before `start` begins the
    /// 30s/10s background cadence, and for tests.
    pub async fn poll_once(&self) -> Result<(), SamplerError> {
        let Ok(_guard) = self.update_guard.try_lock() else {
            return Ok(());
        };
        let remote = self.fetch_once().await?;
        let settings = Settings::from_remote(remote, Some(&self.local));
        self.store.install(settings);
        Ok(())
    }

    async fn run_update_tick(&self) {
        match self.poll_once().await {
            Ok(()) => {}
            Err(SamplerError::Auth(reason)) => {
                tracing::warn!(reason = %reason, "settings fetch rejected, service key is invalid, stopping fetcher");
                if let Some(tx) = self.self_shutdown.lock().await.as_ref() {
                    let _ = tx.send(true);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "settings fetch failed, retaining previous snapshot");
            }
        }
    }

    async fn run_expiry_tick(&self) {
        let Ok(_guard) = self.expiry_guard.try_lock() else {
            return;
        };
        self.store.check_expiry();
        if !self.store.has_default() {
            tracing::warn!("no settings snapshot installed");
        }
    }

    /// Starts the two background timers on the current Tokio runtime.
    /// Returns a handle whose `stop` cancels both; in-flight fetches are
    /// allowed to finish since they don't hold the shutdown channel.
    pub async fn start(self: Arc<Self>) -> FetcherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.self_shutdown.lock().await = Some(shutdown_tx.clone());

        {
            let fetcher = self.clone();
            let mut shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(UPDATE_INTERVAL);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => fetcher.run_update_tick().await,
                        _ = shutdown_rx.changed() => break,
                    }
                }
            });
        }

        {
            let fetcher = self.clone();
            let mut shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(TIMEOUT_INTERVAL);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => fetcher.run_expiry_tick().await,
                        _ = shutdown_rx.changed() => break,
                    }
                }
            });
        }

        FetcherHandle {
            shutdown: Some(shutdown_tx),
        }
    }
}

/// Test-only seam: real deployments always derive `base_url` from
/// `AgentConfig::collector` via [`strip_port`], but that discards the port
/// a mock HTTP server binds to. Mirrors the `test-util` feature pattern
/// `tokio` itself uses to expose test-only API surface.
#[cfg(feature = "test-util")]
impl SettingsFetcher {
    pub fn with_base_url_override(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

fn strip_port(collector: &str) -> String {
    let host = collector.split(':').next().unwrap_or(collector);
    format!("https://{host}")
}

fn url_escape(segment: &str) -> String {
    percent_encoding::utf8_percent_encode(segment, percent_encoding::NON_ALPHANUMERIC).to_string()
}
