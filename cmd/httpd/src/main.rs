//! # strand-httpd, an HTTP/1.1 static file server
//!
//! One task per connection. Blocking-style handler code, readiness
//! multiplexing underneath: each worker OS thread runs an
//! edge-triggered epoll loop that schedules stackful tasks, so tens of
//! thousands of concurrent connections cost one stack each, not one
//! thread each.
//!
//! ## Usage
//!
//!     strand-httpd [--port 8080] [--workers 4] [--root ./public]
//!                  [--policy fifo|lifo]
//!
//! Environment variables (CLI flags override):
//!
//!     STRAND_PORT, STRAND_WORKERS, STRAND_ROOT, STRAND_POLICY,
//!     STRAND_STACK_KB, STRAND_MAX_EVENTS, STRAND_LOG_LEVEL
//!
//! ## Benchmark
//!
//!     wrk -t4 -c100 -d10s http://127.0.0.1:8080/

use strand_core::{env_get, log_error, log_info};
use strand_http::{serve_connection, ServerConfig};
use strand_runtime::{ConnHandler, Engine, EngineConfig, Listener, ReadyPolicy, Worker};

use std::sync::Arc;

fn main() {
    strand_core::log::init();

    // Phase 1: environment variables
    let mut port: String = env_get("STRAND_PORT", "8080".to_string());
    let mut num_workers: usize = env_get(
        "STRAND_WORKERS",
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4),
    );
    let mut root: String = env_get("STRAND_ROOT", "./public".to_string());
    let mut policy: ReadyPolicy = env_get("STRAND_POLICY", ReadyPolicy::Fifo);
    let stack_kb: usize = env_get("STRAND_STACK_KB", 64);
    let max_events: usize = env_get("STRAND_MAX_EVENTS", 64);

    // Phase 2: CLI flags override env vars
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                if let Some(p) = args.get(i) {
                    port = p.clone();
                }
            }
            "--workers" | "-w" => {
                i += 1;
                if let Some(w) = args.get(i).and_then(|s| s.parse().ok()) {
                    num_workers = w;
                }
            }
            "--root" => {
                i += 1;
                if let Some(r) = args.get(i) {
                    root = r.clone();
                }
            }
            "--policy" => {
                i += 1;
                if let Some(p) = args.get(i).and_then(|s| s.parse().ok()) {
                    policy = p;
                }
            }
            s if s.parse::<u16>().is_ok() => {
                port = s.to_string();
            }
            other => {
                log_error!("unknown argument: {}", other);
                std::process::exit(2);
            }
        }
        i += 1;
    }

    // A send to a half-closed peer must surface as an errno, not kill
    // the process
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }

    let engine_config = EngineConfig::new()
        .num_workers(num_workers)
        .stack_size(stack_kb * 1024)
        .ready_policy(policy)
        .max_events(max_events);

    let server_config = Arc::new(ServerConfig::new().root(root.clone()));
    let handler: Arc<ConnHandler> = {
        let config = server_config.clone();
        Arc::new(move |fd, worker: &Worker| serve_connection(&config, fd, worker))
    };

    log_info!(
        "strand-httpd: port={} workers={} root={} policy={:?} stack={}K",
        port,
        num_workers,
        root,
        policy,
        stack_kb
    );

    let listener = match Listener::bind(&port, engine_config.backlog) {
        Ok(l) => l,
        Err(e) => {
            log_error!("strand-httpd: {}", e);
            std::process::exit(1);
        }
    };

    let mut engine = match Engine::new(engine_config, handler) {
        Ok(e) => e,
        Err(e) => {
            log_error!("strand-httpd: {}", e);
            std::process::exit(1);
        }
    };
    engine.start();

    log_info!("strand-httpd: listening on http://0.0.0.0:{}/", port);

    // The dispatcher owns this thread; it only returns on a fatal error
    if let Err(e) = engine.dispatch(&listener) {
        log_error!("strand-httpd: dispatcher failed: {}", e);
        std::process::exit(1);
    }
}
