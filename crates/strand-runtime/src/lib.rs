//! # strand-runtime
//!
//! The strand connection engine: a shared-nothing pool of worker
//! threads, each coupling an edge-triggered epoll loop with a
//! cooperative scheduler over stackful tasks. One task per connection;
//! task code reads like blocking I/O but parks on readiness under the
//! hood.
//!
//! ```text
//!  listener accepts ──► self-pipe ──► worker registers fd, creates task
//!         ▲                                   │
//!         │                                   ▼
//!   dispatcher thread                 scheduler runs task
//!                                             │
//!                           recv/send/sendfile would-block?
//!                                             │ yes
//!                                             ▼
//!                            park on (fd, direction), switch out
//!                                             │
//!                            readiness event ─┘ resume
//! ```
//!
//! Suspension happens only inside the async primitives; nothing else
//! yields. Tasks never migrate between workers, and per-worker state
//! needs no locks.

pub mod arch;
pub mod config;
pub mod engine;
pub mod fd_table;
pub mod net;
pub mod ready_queue;
pub mod stack;
pub mod task;
pub mod tls;
pub mod worker;

pub use config::{EngineConfig, DEFAULT_STACK_SIZE};
pub use engine::Engine;
pub use net::{recv_async, send_async, sendfile_async, set_nonblocking, Listener};
pub use ready_queue::ReadyPolicy;
pub use task::WaitKind;
pub use worker::{ConnHandler, Worker};

// Re-export the error types alongside the operations that raise them
pub use strand_core::{EngineError, EngineResult, IoError, IoResult};
