//! The main `sample_request` entry point.

use rand::Rng;

use crate::bucket::TokenBucket;
use crate::flags::{Flags, SettingsSource, TriggerTraceMode};
use crate::response;
use crate::settings::{Settings, MAX_SAMPLE_RATE};
use crate::store::SettingsStore;
use crate::url_filter::UrlFilter;

/// Value returned to the caller on every request, carrying both the
/// decision and enough context to populate the `X-Trace-Options-Response`
/// header and OpenTelemetry-style sampling metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleDecision {
    pub trace: bool,
    /// Parts-per-million, or `-1` for the explicit "unset" cases (the
    /// trigger-trace branch, and `SampleThroughAlways` continuations).
    pub sample_rate: i64,
    pub source: SettingsSource,
    pub enabled: bool,
    pub response_message: &'static str,
    pub bucket_cap: f64,
    pub bucket_rate: f64,
    pub dice_rolled: bool,
}

impl SampleDecision {
    fn settings_not_available() -> SampleDecision {
        SampleDecision {
            trace: false,
            sample_rate: 0,
            source: SettingsSource::None,
            enabled: false,
            response_message: response::SETTINGS_NOT_AVAILABLE,
            bucket_cap: 0.0,
            bucket_rate: 0.0,
            dice_rolled: false,
        }
    }
}

/// `true` iff `rate == 1_000_000` or a uniform draw from `[0, 1_000_000)`
/// falls at or below `rate`. Preserves the observed behavior that `rate ==
/// 0` still has a (vanishingly small) chance to sample, rather than being
/// special-cased to never sample.
fn should_sample(rate: i64) -> bool {
    if rate == MAX_SAMPLE_RATE {
        return true;
    }
    let draw = rand::rng().random_range(0..MAX_SAMPLE_RATE);
    draw <= rate
}

/// The bucket a request debits: the relaxed/strict trigger-trace bucket
/// when `tt_mode` names one, the regular bucket otherwise. Computed once
/// per request and shared by both the trigger-trace and regular branches,
/// since which bucket applies never depends on which of those branches a
/// request takes.
fn select_bucket(settings: &Settings, tt_mode: TriggerTraceMode) -> &TokenBucket {
    match tt_mode {
        TriggerTraceMode::Relaxed => &settings.trigger_relaxed_bucket,
        TriggerTraceMode::Strict => &settings.trigger_strict_bucket,
        TriggerTraceMode::Invalid | TriggerTraceMode::NotPresent => &settings.bucket,
    }
}

/// Entry point for every inbound request's sampling decision. Reads the
/// currently installed `Settings` snapshot (if any) and never blocks: no
/// I/O, no lock held across the whole call beyond the buckets' own short
/// critical sections.
pub struct DecisionEngine<'a> {
    store: &'a SettingsStore,
    url_filter: &'a UrlFilter,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(store: &'a SettingsStore, url_filter: &'a UrlFilter) -> Self {
        DecisionEngine { store, url_filter }
    }

    /// `continued`: the inbound request already carries upstream trace
    /// context. `upstream_sampled`: the upstream's sampled flag, extracted
    /// from upstream state; `None` when no valid upstream state was found.
    pub fn sample_request(
        &self,
        continued: bool,
        url: &str,
        tt_mode: TriggerTraceMode,
        upstream_sampled: Option<bool>,
    ) -> SampleDecision {
        let Some(settings) = self.store.get() else {
            return SampleDecision::settings_not_available();
        };

        let (rate, flags, source) = settings.merge_url_setting(url, self.url_filter);
        let bucket = select_bucket(&settings, tt_mode);

        if tt_mode.requested() && !continued {
            return self.trigger_trace_branch(bucket, tt_mode, flags);
        }

        self.regular_branch(bucket, rate, flags, source, continued, upstream_sampled, tt_mode)
    }

    fn trigger_trace_branch(
        &self,
        bucket: &TokenBucket,
        tt_mode: TriggerTraceMode,
        flags: Flags,
    ) -> SampleDecision {
        let sampled_guess = tt_mode != TriggerTraceMode::Invalid && flags.trigger_trace_enabled();
        let result = bucket.count(sampled_guess, false, true);

        let response_message = if flags.trigger_trace_enabled() && tt_mode.enabled() {
            if result {
                response::OK
            } else {
                response::RATE_EXCEEDED
            }
        } else if tt_mode == TriggerTraceMode::Invalid {
            response::INVALID
        } else if !flags.enabled() {
            response::TRACING_DISABLED
        } else {
            response::TRIGGER_TRACING_DISABLED
        };

        SampleDecision {
            trace: result,
            sample_rate: -1,
            source: SettingsSource::Unset,
            enabled: flags.enabled(),
            response_message,
            bucket_cap: bucket.capacity(),
            bucket_rate: bucket.rate(),
            dice_rolled: false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn regular_branch(
        &self,
        bucket: &TokenBucket,
        rate: i64,
        flags: Flags,
        source: SettingsSource,
        continued: bool,
        upstream_sampled: Option<bool>,
        tt_mode: TriggerTraceMode,
    ) -> SampleDecision {
        let mut dice_rolled = false;
        let mut decision = false;
        let mut do_rate_limit = false;
        let mut unset = false;

        if !continued {
            if flags.contains(Flags::SAMPLE_START) {
                dice_rolled = true;
                decision = should_sample(rate);
                if decision {
                    do_rate_limit = true;
                }
            }
        } else if let Some(upstream_sampled) = upstream_sampled {
            if upstream_sampled {
                if flags.contains(Flags::SAMPLE_THROUGH_ALWAYS) {
                    decision = true;
                    unset = true;
                } else if flags.contains(Flags::SAMPLE_THROUGH) {
                    dice_rolled = true;
                    decision = should_sample(rate);
                }
            } else {
                decision = false;
            }
        }

        let decision = bucket.count(decision, continued, do_rate_limit);

        let response_message = if tt_mode.requested() {
            response::IGNORED
        } else {
            response::NOT_REQUESTED
        };

        if unset {
            return SampleDecision {
                trace: decision,
                sample_rate: -1,
                source: SettingsSource::Unset,
                enabled: flags.enabled(),
                response_message,
                bucket_cap: -1.0,
                bucket_rate: -1.0,
                dice_rolled,
            };
        }

        SampleDecision {
            trace: decision,
            sample_rate: rate,
            source,
            enabled: flags.enabled(),
            response_message,
            bucket_cap: bucket.capacity(),
            bucket_rate: bucket.rate(),
            dice_rolled,
        }
    }
}
