//! Adaptive sampling decision core for a distributed-tracing agent.
//!
//! This crate answers one question on the hot path — `sample_request` — and
//! owns the plumbing that keeps its inputs current: a token-bucket rate
//! limiter per sampling path, an immutable `Settings` snapshot published via
//! atomic pointer swap, a per-URL policy overlay, and a background fetcher
//! that polls a control plane for updated policy and expires stale snapshots.
//!
//! Nothing in this crate does its own process configuration loading or
//! metrics export; `AgentConfig` and `RateSummarySnapshot` are the seams
//! where a host application plugs those in.

pub mod bucket;
pub mod config;
pub mod decision;
pub mod error;
pub mod fetcher;
pub mod flags;
pub mod response;
pub mod settings;
pub mod store;
pub mod summary;
pub mod url_filter;

pub use bucket::{BucketCounts, TokenBucket};
pub use config::{AgentConfig, LocalSamplingConfig, ServiceKey};
pub use decision::{DecisionEngine, SampleDecision};
pub use error::{SamplerError, SamplerResult};
pub use fetcher::{FetcherHandle, SettingsFetcher};
pub use flags::{Flags, SettingsSource, TracingMode, TriggerTraceMode};
pub use settings::{BucketArgs, RemotePolicy, Settings, MAX_SAMPLE_RATE};
pub use store::SettingsStore;
pub use summary::{RateSummary, RateSummarySnapshot};
pub use url_filter::{UrlFilter, UrlFilterEntry};
