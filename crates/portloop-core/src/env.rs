//! Environment variable helpers
//!
//! Used by `LooperConfig::from_env()` and the log module. Unset or
//! unparsable variables fall back to the caller's default; nothing here
//! panics or errors.
//!
//! ```ignore
//! let capacity: usize = env_get("PORTLOOP_QUEUE_CAPACITY", 5000);
//! let mask: Option<LineMask> = env_get_opt("PORTLOOP_LINE_MASK");
//! ```

use std::str::FromStr;

/// Parse `key` as `T`, or return `default`.
#[inline]
pub fn env_get<T: FromStr>(key: &str, default: T) -> T {
    env_get_opt(key).unwrap_or(default)
}

/// Parse `key` as `T` if it is set and valid.
#[inline]
pub fn env_get_opt<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// `1`, `true`, `yes`, `on` (any case) are true; any other set value is false.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => is_truthy(&val),
        Err(_) => default,
    }
}

#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var_os(key).is_some()
}

fn is_truthy(val: &str) -> bool {
    matches!(val.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
