//! Engine configuration

use crate::ready_queue::ReadyPolicy;

/// Default task stack size: 64 KiB
///
/// Large enough for the deepest expected call chain including request
/// parsing and response middleware.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Configuration for the connection engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of worker threads (defaults to CPU count)
    pub num_workers: usize,

    /// Stack size per task
    pub stack_size: usize,

    /// Ready queue ordering; FIFO is the fair default
    pub ready_policy: ReadyPolicy,

    /// Listen backlog
    pub backlog: i32,

    /// Max events one notifier wait may return per worker
    pub max_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let num_cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            num_workers: num_cpus,
            stack_size: DEFAULT_STACK_SIZE,
            ready_policy: ReadyPolicy::Fifo,
            backlog: 1024,
            max_events: 64,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of worker threads
    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    /// Set per-task stack size
    pub fn stack_size(mut self, n: usize) -> Self {
        self.stack_size = n;
        self
    }

    /// Set the ready queue policy
    pub fn ready_policy(mut self, policy: ReadyPolicy) -> Self {
        self.ready_policy = policy;
        self
    }

    /// Set the listen backlog
    pub fn backlog(mut self, n: i32) -> Self {
        self.backlog = n;
        self
    }

    /// Set the per-wait notifier event batch size
    pub fn max_events(mut self, n: usize) -> Self {
        self.max_events = n;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.num_workers == 0 {
            return Err("num_workers must be at least 1");
        }
        if self.stack_size < 16 * 1024 {
            return Err("stack_size must be at least 16 KiB");
        }
        if self.stack_size % 4096 != 0 {
            return Err("stack_size must be page-aligned");
        }
        if self.backlog <= 0 {
            return Err("backlog must be positive");
        }
        if self.max_events == 0 || self.max_events > i32::MAX as usize {
            return Err("max_events must be positive and fit the notifier API");
        }
        Ok(())
    }
}
