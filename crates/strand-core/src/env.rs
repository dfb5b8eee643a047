//! Environment variable utilities
//!
//! Typed lookups for `STRAND_*` configuration variables. A variable
//! that is set but does not parse is reported once at warn level and
//! the default wins, so a typo in a deployment environment shows up in
//! the logs instead of being silently ignored.
//!
//! ```ignore
//! use strand_core::{env_get, env_get_bool, env_get_opt};
//!
//! let workers: usize = env_get("STRAND_WORKERS", 4);
//! let flush: bool = env_get_bool("STRAND_LOG_FLUSH", false);
//! let port: Option<u16> = env_get_opt("STRAND_PORT");
//! ```

use crate::log_warn;

use std::str::FromStr;

/// Interpret a human switch value. `Some(true)` for 1/true/yes/on,
/// `Some(false)` for 0/false/no/off, `None` for anything else.
pub fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Get environment variable as optional value.
///
/// Returns `None` when unset. A set-but-unparseable value also returns
/// `None`, after logging which variable was rejected.
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log_warn!("ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}

/// Get environment variable parsed as type T, or return default.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as a boolean switch.
///
/// Unset or unrecognized values return the default.
pub fn env_get_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_switch(&v))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_switch() {
        assert_eq!(parse_switch("1"), Some(true));
        assert_eq!(parse_switch("YES"), Some(true));
        assert_eq!(parse_switch(" on "), Some(true));
        assert_eq!(parse_switch("0"), Some(false));
        assert_eq!(parse_switch("off"), Some(false));
        assert_eq!(parse_switch("maybe"), None);
        assert_eq!(parse_switch(""), None);
    }

    #[test]
    fn test_env_get_unset_uses_default() {
        let v: usize = env_get("STRAND_TEST_UNSET_VAR", 7);
        assert_eq!(v, 7);
    }

    #[test]
    fn test_env_get_set_value_wins() {
        std::env::set_var("STRAND_TEST_SET_VAR", "42");
        let v: u64 = env_get("STRAND_TEST_SET_VAR", 0);
        assert_eq!(v, 42);
    }

    #[test]
    fn test_env_get_bad_value_falls_back() {
        std::env::set_var("STRAND_TEST_BAD_VAR", "not-a-number");
        let v: u16 = env_get("STRAND_TEST_BAD_VAR", 31);
        assert_eq!(v, 31);
        assert_eq!(env_get_opt::<u16>("STRAND_TEST_BAD_VAR"), None);
    }

    #[test]
    fn test_env_get_bool_switch_forms() {
        std::env::set_var("STRAND_TEST_SWITCH_VAR", "on");
        assert!(env_get_bool("STRAND_TEST_SWITCH_VAR", false));
        std::env::set_var("STRAND_TEST_SWITCH_VAR", "no");
        assert!(!env_get_bool("STRAND_TEST_SWITCH_VAR", true));
        // Unrecognized text keeps the caller's default
        std::env::set_var("STRAND_TEST_SWITCH_VAR", "sometimes");
        assert!(env_get_bool("STRAND_TEST_SWITCH_VAR", true));
        assert!(!env_get_bool("STRAND_TEST_SWITCH_VAR", false));
    }

    #[test]
    fn test_env_get_opt() {
        assert_eq!(env_get_opt::<u16>("STRAND_TEST_OPT_UNSET"), None);
        std::env::set_var("STRAND_TEST_OPT_VAR", "8080");
        assert_eq!(env_get_opt::<u16>("STRAND_TEST_OPT_VAR"), Some(8080));
    }
}
