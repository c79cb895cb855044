//! Shapes handed in by the (out-of-scope) process-wide configuration
//! loader. This crate never reads env vars or files itself; it only
//! defines what the loader must hand it.

use crate::flags::TracingMode;
use crate::url_filter::UrlFilterEntry;

/// The service key as split by the (out-of-scope) config loader into an
/// HMAC/bearer token and the service name used in the fetch URL.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ServiceKey {
    pub token: String,
    pub service_name: String,
}

/// Local overrides for sampling/trigger-trace, layered onto remote policy
/// by `Settings::from_remote`'s merge precedence.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LocalSamplingConfig {
    /// Whether `sample_rate`/`tracing_mode` below should be applied at all.
    #[serde(default)]
    pub sampling_configured: bool,
    /// Parts-per-million, interpreted the same as the remote rate.
    #[serde(default)]
    pub sample_rate: i64,
    #[serde(default)]
    pub tracing_mode: TracingMode,
    /// `false` disables trigger-trace locally regardless of remote policy.
    #[serde(default = "default_true")]
    pub trigger_trace: bool,
}

impl Default for LocalSamplingConfig {
    /// Matches the `serde` missing-field defaults above field for field.
    /// `#[derive(Default)]` would give `trigger_trace: false` here, since
    /// `bool::default()` disagrees with `default_true`.
    fn default() -> Self {
        LocalSamplingConfig {
            sampling_configured: false,
            sample_rate: 0,
            tracing_mode: TracingMode::default(),
            trigger_trace: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Full agent-facing configuration this crate consumes.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AgentConfig {
    /// `host:port` of the control plane; the fetcher strips the port to
    /// form the base URL used in `GET {base}/v1/settings/{service}/{host}`.
    pub collector: String,
    pub service_key: ServiceKey,
    /// Disables the fetcher entirely when `false`.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub local_sampling: LocalSamplingConfig,
    #[serde(default)]
    pub transaction_filtering: Vec<UrlFilterEntry>,
    /// Local hostname reported to the control plane in the fetch path.
    pub host_name: String,
}

impl Default for AgentConfig {
    /// Matches the `serde` missing-field default for `enabled` (`true`);
    /// see `LocalSamplingConfig::default` for the same concern on
    /// `trigger_trace`.
    fn default() -> Self {
        AgentConfig {
            collector: String::new(),
            service_key: ServiceKey::default(),
            enabled: true,
            local_sampling: LocalSamplingConfig::default(),
            transaction_filtering: Vec::new(),
            host_name: String::new(),
        }
    }
}
