//! Bit-exact response-message tokens expected by downstream consumers.
//! Callers surface these in the `X-Trace-Options-Response` header.

pub const OK: &str = "ok";
pub const RATE_EXCEEDED: &str = "rate-exceeded";
pub const TRACING_DISABLED: &str = "tracing-disabled";
pub const TRIGGER_TRACING_DISABLED: &str = "trigger-tracing-disabled";
pub const NOT_REQUESTED: &str = "not-requested";
pub const IGNORED: &str = "ignored";
pub const SETTINGS_NOT_AVAILABLE: &str = "settings-not-available";
pub const INVALID: &str = "";
