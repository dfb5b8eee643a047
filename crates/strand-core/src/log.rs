//! Leveled stderr logging for strand
//!
//! Each log call renders its whole line into one buffer and hands it to
//! stderr in a single locked write, so lines from different workers
//! never interleave. The threshold lives in an atomic; filtered-out
//! calls cost one load.
//!
//! # Environment Variables
//!
//! - `STRAND_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace
//!   (names or 0-5)
//! - `STRAND_LOG_FLUSH=1` - Flush stderr after each line
//!
//! # Usage
//!
//! ```ignore
//! use strand_core::{log_error, log_info, log_trace};
//!
//! log_info!("worker {} started", id);
//! log_trace!("[+] new client connection on socket {}", fd);
//! log_error!("epoll_ctl ADD failed for fd {}", fd);
//! ```

use std::fmt::Write as _;
use std::io::Write as _;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Once;

/// Verbosity threshold; a message is emitted when its level is at or
/// below the configured one.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

/// Index-ordered for lookup by stored threshold value
const LEVELS: [LogLevel; 6] = [
    LogLevel::Off,
    LogLevel::Error,
    LogLevel::Warn,
    LogLevel::Info,
    LogLevel::Debug,
    LogLevel::Trace,
];

impl LogLevel {
    /// Tag printed at the start of each line
    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = &'static str;

    /// Accepts level names or their numeric values.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(n) = s.trim().parse::<usize>() {
            return LEVELS.get(n).copied().ok_or("log level out of range");
        }
        LEVELS
            .iter()
            .find(|l| l.label().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or("unknown log level")
    }
}

static THRESHOLD: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static FLUSH: AtomicBool = AtomicBool::new(false);
static INIT: Once = Once::new();

/// Read `STRAND_LOG_LEVEL` and `STRAND_LOG_FLUSH` once.
///
/// Runs implicitly on the first log call; call from `main` for
/// deterministic startup. Unparseable values keep the defaults.
pub fn init() {
    INIT.call_once(|| {
        let level = std::env::var("STRAND_LOG_LEVEL")
            .ok()
            .and_then(|v| v.parse::<LogLevel>().ok());
        if let Some(level) = level {
            THRESHOLD.store(level as u8, Ordering::Relaxed);
        }

        let flush = std::env::var("STRAND_LOG_FLUSH")
            .map(|v| crate::env::parse_switch(&v).unwrap_or(false))
            .unwrap_or(false);
        FLUSH.store(flush, Ordering::Relaxed);
    });
}

/// Override the threshold, bypassing the environment.
pub fn set_log_level(level: LogLevel) {
    init();
    THRESHOLD.store(level as u8, Ordering::Relaxed);
}

/// Whether messages at `level` currently pass the threshold.
#[inline]
pub fn enabled(level: LogLevel) -> bool {
    init();
    level as u8 <= THRESHOLD.load(Ordering::Relaxed)
}

/// Internal: render and emit one line.
#[doc(hidden)]
pub fn _emit(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !enabled(level) {
        return;
    }

    let mut line = String::with_capacity(96);
    let _ = write!(line, "{:>5}: ", level.label());
    let _ = line.write_fmt(args);
    line.push('\n');

    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = handle.write_all(line.as_bytes());
    if FLUSH.load(Ordering::Relaxed) {
        let _ = handle.flush();
    }
}

/// Core logging macro; the leveled macros below delegate here.
#[macro_export]
macro_rules! strand_log {
    ($level:expr, $($arg:tt)*) => {
        $crate::log::_emit($level, format_args!($($arg)*))
    };
}

/// Error level log
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::strand_log!($crate::log::LogLevel::Error, $($arg)*) };
}

/// Warning level log
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::strand_log!($crate::log::LogLevel::Warn, $($arg)*) };
}

/// Info level log
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::strand_log!($crate::log::LogLevel::Info, $($arg)*) };
}

/// Debug level log
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::strand_log!($crate::log::LogLevel::Debug, $($arg)*) };
}

/// Trace level log (most verbose)
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => { $crate::strand_log!($crate::log::LogLevel::Trace, $($arg)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_and_numbers() {
        assert_eq!("error".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert_eq!("TRACE".parse::<LogLevel>(), Ok(LogLevel::Trace));
        assert_eq!(" info ".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!("0".parse::<LogLevel>(), Ok(LogLevel::Off));
        assert_eq!("4".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("9".parse::<LogLevel>().is_err());
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    // One test owns the global threshold; parallel mutation would race
    #[test]
    fn test_threshold_gating_and_macros() {
        set_log_level(LogLevel::Warn);
        assert!(enabled(LogLevel::Error));
        assert!(enabled(LogLevel::Warn));
        assert!(!enabled(LogLevel::Info));
        assert!(!enabled(LogLevel::Trace));

        set_log_level(LogLevel::Off);
        assert!(!enabled(LogLevel::Error));

        log_error!("error {}", "msg");
        log_warn!("warn");
        log_info!("info {}", 42);
        log_debug!("debug");
        log_trace!("trace");
    }

    #[test]
    fn test_labels_round_trip() {
        for level in LEVELS.iter().skip(1) {
            assert_eq!(level.label().parse::<LogLevel>().as_ref(), Ok(level));
        }
    }
}
