use thiserror::Error;

/// Errors surfaced by the sampling core's configuration and fetch paths.
///
/// The decision path (`DecisionEngine::sample_request`) never returns this
/// type: per-request failures are reported as a populated `SampleDecision`
/// with a specific response string instead. `SamplerError` is only produced
/// at fetcher construction and during background polling.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SamplerError {
    /// Invalid configuration discovered at fetcher construction: empty
    /// service key, empty collector endpoint, or an unparsable base URL.
    /// Fatal — the fetcher refuses to start.
    #[error("invalid sampler configuration: {0}")]
    Config(String),

    /// A remote fetch failed for a transient reason (network error,
    /// non-2xx/non-40x status, unparsable response body). Logged and
    /// retried on the next tick; never fatal.
    #[error("settings fetch failed: {0}")]
    Fetch(String),

    /// The control plane rejected the service key (401/403). Terminal for
    /// the fetcher: retrying with the same key cannot succeed.
    #[error("settings fetch rejected by authorization (401/403): {0}")]
    Auth(String),
}

pub type SamplerResult<T> = Result<T, SamplerError>;
