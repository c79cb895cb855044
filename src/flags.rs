//! Policy bitset and the small enums that travel alongside it.

use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Bitset over the five sampling-policy switches a `Settings` snapshot
/// carries. Backed by a `u8`; the set is small and closed, so a hand-rolled
/// bitset reads clearer at call sites than pulling in a bitflags macro for
/// five bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    pub const EMPTY: Flags = Flags(0);
    pub const OVERRIDE: Flags = Flags(1 << 0);
    pub const SAMPLE_START: Flags = Flags(1 << 1);
    pub const SAMPLE_THROUGH: Flags = Flags(1 << 2);
    pub const SAMPLE_THROUGH_ALWAYS: Flags = Flags(1 << 3);
    pub const TRIGGER_TRACE: Flags = Flags(1 << 4);

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `Enabled` shorthand used throughout the decision engine: any of the
    /// three sampling-path bits being set means the policy is not fully off.
    pub fn enabled(self) -> bool {
        self.contains(Flags::SAMPLE_START)
            || self.contains(Flags::SAMPLE_THROUGH)
            || self.contains(Flags::SAMPLE_THROUGH_ALWAYS)
    }

    pub fn trigger_trace_enabled(self) -> bool {
        self.contains(Flags::TRIGGER_TRACE)
    }

    /// Parse the CSV wire format: `OVERRIDE,SAMPLE_START,...`. Unknown
    /// tokens are silently ignored.
    pub fn parse_csv(csv: &str) -> Flags {
        let mut flags = Flags::EMPTY;
        for token in csv.split(',') {
            match token.trim() {
                "OVERRIDE" => flags.insert(Flags::OVERRIDE),
                "SAMPLE_START" => flags.insert(Flags::SAMPLE_START),
                "SAMPLE_THROUGH" => flags.insert(Flags::SAMPLE_THROUGH),
                "SAMPLE_THROUGH_ALWAYS" => flags.insert(Flags::SAMPLE_THROUGH_ALWAYS),
                "TRIGGER_TRACE" => flags.insert(Flags::TRIGGER_TRACE),
                _ => {}
            }
        }
        flags
    }
}

impl BitAnd for Flags {
    type Output = Flags;
    fn bitand(self, rhs: Flags) -> Flags {
        Flags(self.0 & rhs.0)
    }
}

impl BitOr for Flags {
    type Output = Flags;
    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

/// Where a `Settings` snapshot's effective sample rate/flags ultimately
/// came from. Distinct from [`TracingMode`]: this labels provenance, not a
/// per-URL decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingsSource {
    #[default]
    Unset,
    None,
    File,
    Default,
}

/// Per-URL or locally-configured tracing mode. `Unknown` means "no opinion,
/// fall back to the settings-level value" — it never overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TracingMode {
    Enabled,
    Disabled,
    #[default]
    Unknown,
}

impl TracingMode {
    /// Flag overlay applied when a local or per-URL tracing mode replaces
    /// the remote flags outright.
    pub fn to_flags(self) -> Flags {
        match self {
            TracingMode::Enabled => {
                Flags::SAMPLE_START | Flags::SAMPLE_THROUGH_ALWAYS | Flags::TRIGGER_TRACE
            }
            TracingMode::Disabled => Flags::EMPTY,
            TracingMode::Unknown => Flags::EMPTY,
        }
    }
}

/// Trigger-trace mode carried on an inbound request, as decoded by the
/// (out-of-scope) `x-trace-options` parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerTraceMode {
    #[default]
    NotPresent,
    Invalid,
    Relaxed,
    Strict,
}

impl TriggerTraceMode {
    /// Any of {Invalid, Relaxed, Strict}: the caller asked for a trigger
    /// trace, whether or not the request was well-formed.
    pub fn requested(self) -> bool {
        !matches!(self, TriggerTraceMode::NotPresent)
    }

    /// Any of {Relaxed, Strict}: a well-formed trigger-trace request.
    pub fn enabled(self) -> bool {
        matches!(self, TriggerTraceMode::Relaxed | TriggerTraceMode::Strict)
    }
}
