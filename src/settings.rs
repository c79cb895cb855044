//! Immutable policy snapshot and the local-config merge that produces it.

use std::time::{Duration, Instant};

use crate::bucket::TokenBucket;
use crate::config::LocalSamplingConfig;
use crate::flags::{Flags, SettingsSource};
use crate::url_filter::UrlFilter;

pub const MAX_SAMPLE_RATE: i64 = 1_000_000;

/// Raw bucket rate/capacity pair as decoded from the wire `arguments`
/// object. Missing or unparsable values fall back to `0.0` rather than
/// failing the whole fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketArgs {
    pub rate: f64,
    pub capacity: f64,
}

/// Everything a freshly-fetched remote policy carries, already parsed out
/// of the wire JSON (see `fetcher::SettingsResponse`). Kept separate from
/// the wire struct so `Settings::from_remote` has no `serde` dependency.
#[derive(Debug, Clone, Default)]
pub struct RemotePolicy {
    pub flags_csv: String,
    pub rate: i64,
    pub ttl: Duration,
    pub bucket: BucketArgs,
    pub trigger_relaxed_bucket: BucketArgs,
    pub trigger_strict_bucket: BucketArgs,
    pub signature_key: Vec<u8>,
}

/// Immutable policy snapshot. Constructed once per remote fetch (or once at
/// startup if only local config is present — callers choose whether that
/// case produces a `Settings` at all; this crate doesn't synthesize one).
/// `flags` is set once during the local-config merge and never mutated
/// again; `original_flags` is preserved verbatim for the `Override`
/// precedence rule and is never mutated after construction.
pub struct Settings {
    pub timestamp: Instant,
    pub ttl: Duration,
    flags: Flags,
    original_flags: Flags,
    sample_rate: i64,
    source: SettingsSource,
    pub trigger_token: Vec<u8>,
    pub bucket: TokenBucket,
    pub trigger_relaxed_bucket: TokenBucket,
    pub trigger_strict_bucket: TokenBucket,
}

fn clamp_rate(rate: i64) -> i64 {
    rate.clamp(0, MAX_SAMPLE_RATE)
}

impl Settings {
    /// Builds a snapshot from remote policy and applies the local-config
    /// merge precedence (override / local-replace / trigger-trace-disable).
    /// `local` is `None` when the agent has no local sampling overrides
    /// configured at all.
    pub fn from_remote(remote: RemotePolicy, local: Option<&LocalSamplingConfig>) -> Settings {
        let original_flags = Flags::parse_csv(&remote.flags_csv);
        let mut flags = original_flags;
        let mut rate = clamp_rate(remote.rate);
        let mut source = SettingsSource::Default;

        if let Some(local) = local {
            if original_flags.contains(Flags::OVERRIDE) && local.sampling_configured {
                // Override: remote policy wins unless local is stricter.
                let local_rate = clamp_rate(local.sample_rate);
                if local_rate < rate {
                    rate = local_rate;
                    source = SettingsSource::File;
                }
                flags = flags & local.tracing_mode.to_flags();
            } else if local.sampling_configured {
                rate = clamp_rate(local.sample_rate);
                flags = local.tracing_mode.to_flags();
                source = SettingsSource::File;
            }

            if !local.trigger_trace {
                flags.remove(Flags::TRIGGER_TRACE);
            }
        }

        Settings {
            timestamp: Instant::now(),
            ttl: remote.ttl,
            flags,
            original_flags,
            sample_rate: rate,
            source,
            trigger_token: remote.signature_key,
            bucket: TokenBucket::new(remote.bucket.rate, remote.bucket.capacity),
            trigger_relaxed_bucket: TokenBucket::new(
                remote.trigger_relaxed_bucket.rate,
                remote.trigger_relaxed_bucket.capacity,
            ),
            trigger_strict_bucket: TokenBucket::new(
                remote.trigger_strict_bucket.rate,
                remote.trigger_strict_bucket.capacity,
            ),
        }
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn original_flags(&self) -> Flags {
        self.original_flags
    }

    pub fn sample_rate(&self) -> i64 {
        self.sample_rate
    }

    pub fn source(&self) -> SettingsSource {
        self.source
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.timestamp) > self.ttl
    }

    /// Per-request URL overlay. Never mutates `self` — the overlay is
    /// computed fresh on every call and the stored snapshot is untouched.
    pub fn merge_url_setting(&self, url: &str, url_filter: &UrlFilter) -> (i64, Flags, SettingsSource) {
        if url.is_empty() {
            return (self.sample_rate, self.flags, self.source);
        }

        let url_mode = url_filter.get_tracing_mode(url);
        if url_mode == crate::flags::TracingMode::Unknown {
            return (self.sample_rate, self.flags, self.source);
        }

        let mut url_flags = url_mode.to_flags();
        if self.original_flags.contains(Flags::OVERRIDE) {
            url_flags = url_flags & self.original_flags;
        }
        (self.sample_rate, url_flags, SettingsSource::File)
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("ttl", &self.ttl)
            .field("flags", &self.flags)
            .field("original_flags", &self.original_flags)
            .field("sample_rate", &self.sample_rate)
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::TracingMode;

    fn remote(flags_csv: &str, rate: i64) -> RemotePolicy {
        RemotePolicy {
            flags_csv: flags_csv.to_string(),
            rate,
            ttl: Duration::from_secs(120),
            bucket: BucketArgs { rate: 1_000_000.0, capacity: 1_000_000.0 },
            trigger_relaxed_bucket: BucketArgs { rate: 100.0, capacity: 100.0 },
            trigger_strict_bucket: BucketArgs { rate: 10.0, capacity: 10.0 },
            signature_key: b"token".to_vec(),
        }
    }

    #[test]
    fn no_local_config_keeps_remote_as_default_source() {
        let settings = Settings::from_remote(remote("SAMPLE_START", 500_000), None);
        assert_eq!(settings.sample_rate(), 500_000);
        assert_eq!(settings.source(), SettingsSource::Default);
        assert!(settings.flags().contains(Flags::SAMPLE_START));
    }

    #[test]
    fn rate_is_clamped_at_construction() {
        let settings = Settings::from_remote(remote("SAMPLE_START", 2_000_000), None);
        assert_eq!(settings.sample_rate(), MAX_SAMPLE_RATE);

        let settings = Settings::from_remote(remote("SAMPLE_START", -5), None);
        assert_eq!(settings.sample_rate(), 0);
    }

    #[test]
    fn override_caps_at_the_stricter_rate() {
        let local = LocalSamplingConfig {
            sampling_configured: true,
            sample_rate: 100_000,
            tracing_mode: TracingMode::Enabled,
            trigger_trace: true,
        };
        let settings = Settings::from_remote(remote("OVERRIDE,SAMPLE_START", 900_000), Some(&local));
        assert_eq!(settings.sample_rate(), 100_000);
        assert_eq!(settings.source(), SettingsSource::File);
    }

    #[test]
    fn override_keeps_remote_rate_when_local_is_laxer() {
        let local = LocalSamplingConfig {
            sampling_configured: true,
            sample_rate: 900_000,
            tracing_mode: TracingMode::Enabled,
            trigger_trace: true,
        };
        let settings = Settings::from_remote(remote("OVERRIDE,SAMPLE_START", 100_000), Some(&local));
        assert_eq!(settings.sample_rate(), 100_000);
        assert_eq!(settings.source(), SettingsSource::Default);
    }

    #[test]
    fn local_without_override_replaces_rate_and_flags() {
        let local = LocalSamplingConfig {
            sampling_configured: true,
            sample_rate: 42,
            tracing_mode: TracingMode::Disabled,
            trigger_trace: true,
        };
        let settings = Settings::from_remote(remote("SAMPLE_START", 900_000), Some(&local));
        assert_eq!(settings.sample_rate(), 42);
        assert_eq!(settings.source(), SettingsSource::File);
        assert!(settings.flags().is_empty());
    }

    #[test]
    fn local_trigger_trace_false_clears_the_bit_even_without_sampling_override() {
        let local = LocalSamplingConfig {
            sampling_configured: false,
            sample_rate: 0,
            tracing_mode: TracingMode::Unknown,
            trigger_trace: false,
        };
        let settings = Settings::from_remote(remote("SAMPLE_START,TRIGGER_TRACE", 900_000), Some(&local));
        assert!(!settings.flags().contains(Flags::TRIGGER_TRACE));
        assert!(settings.flags().contains(Flags::SAMPLE_START));
    }

    #[test]
    fn url_overlay_keeps_settings_level_values_when_unknown() {
        let settings = Settings::from_remote(remote("SAMPLE_START", 500_000), None);
        let filter = UrlFilter::empty();
        let (rate, flags, source) = settings.merge_url_setting("/anything", &filter);
        assert_eq!(rate, 500_000);
        assert_eq!(flags, settings.flags());
        assert_eq!(source, settings.source());
    }

    #[test]
    fn url_overlay_never_mutates_the_stored_snapshot() {
        let settings = Settings::from_remote(remote("SAMPLE_START", 500_000), None);
        let filter = UrlFilter::new(&[crate::url_filter::UrlFilterEntry {
            regex: "^/off$".to_string(),
            extensions: Vec::new(),
            tracing_mode: TracingMode::Disabled,
        }]);
        let _ = settings.merge_url_setting("/off", &filter);
        assert!(settings.flags().contains(Flags::SAMPLE_START));
    }
}
