//! HTTP server configuration

use std::path::PathBuf;

/// Default receive buffer per connection
pub const DEFAULT_RECV_BUF_SIZE: usize = 4096;

/// Configuration for the HTTP connection handler
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Document root for static files
    pub root: PathBuf,

    /// Receive buffer size per connection
    pub recv_buf_size: usize,

    /// How long a kept-alive connection may sit idle before the next
    /// request, in milliseconds
    pub idle_timeout_ms: u64,

    /// How long a partially received request may stall between
    /// segments, in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./public"),
            recv_buf_size: DEFAULT_RECV_BUF_SIZE,
            idle_timeout_ms: 5000,
            read_timeout_ms: 5000,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the document root
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set the per-connection receive buffer size
    pub fn recv_buf_size(mut self, n: usize) -> Self {
        self.recv_buf_size = n;
        self
    }

    /// Set the keep-alive idle timeout
    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.idle_timeout_ms = ms;
        self
    }

    /// Set the mid-request read timeout
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.read_timeout_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let cfg = ServerConfig::new()
            .root("/srv/www")
            .recv_buf_size(8192)
            .idle_timeout_ms(1000)
            .read_timeout_ms(2000);
        assert_eq!(cfg.root, PathBuf::from("/srv/www"));
        assert_eq!(cfg.recv_buf_size, 8192);
        assert_eq!(cfg.idle_timeout_ms, 1000);
        assert_eq!(cfg.read_timeout_ms, 2000);
    }
}
