//! Response middleware
//!
//! Runs after the parser reports a complete request: URI decoding, then
//! static file routing. All socket output goes through the engine's
//! async send primitives, so middleware can stall on a slow client
//! without blocking the worker.

pub mod http_utils;
pub mod static_files;
pub mod uri_decoder;

pub use http_utils::{mime_type, reason_phrase, send_error, send_redirect, serve_file};
pub use static_files::handle_static_file;
pub use uri_decoder::decode_uri;
