//! # strand-core
//!
//! Leaf crate shared by the strand engine and its HTTP layer.
//!
//! Provides:
//! - Error types (`EngineError`, `IoError`)
//! - Leveled logging macros (`log_error!` .. `log_trace!`)
//! - Environment variable helpers (`env_get`, `env_get_bool`, `env_get_opt`)

pub mod env;
pub mod error;
pub mod log;

pub use env::{env_get, env_get_bool, env_get_opt, parse_switch};
pub use error::{EngineError, EngineResult, IoError, IoResult};
pub use log::LogLevel;
