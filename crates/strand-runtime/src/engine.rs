//! Engine: worker pool + dispatcher
//!
//! The engine owns the worker pool. Workers are created once at
//! startup and live for the process lifetime; the pool is read-only
//! after that. The dispatcher loops on accept and hands each new fd to
//! a worker over its self-pipe, round-robin. Connections never migrate
//! afterwards.

use crate::config::EngineConfig;
use crate::net::{last_errno, set_nonblocking, Listener};
use crate::worker::{ConnHandler, Worker};

use strand_core::{log_debug, log_error, log_info, EngineError, EngineResult};

use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::thread::JoinHandle;

/// The connection engine: a fixed pool of workers plus the dispatcher.
pub struct Engine {
    workers: Vec<Arc<Worker>>,
    handles: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Build the worker pool. Fails if any worker cannot set up its
    /// notifier or self-pipe.
    pub fn new(config: EngineConfig, handler: Arc<ConnHandler>) -> EngineResult<Self> {
        config.validate().map_err(EngineError::InvalidConfig)?;

        let mut workers = Vec::with_capacity(config.num_workers);
        for i in 0..config.num_workers {
            workers.push(Arc::new(Worker::new(i, &config, handler.clone())?));
        }

        Ok(Self {
            workers,
            handles: Vec::new(),
        })
    }

    /// Start one OS thread per worker.
    pub fn start(&mut self) {
        for worker in &self.workers {
            let worker = worker.clone();
            let handle = std::thread::Builder::new()
                .name(format!("strand-worker-{}", worker.id()))
                .spawn(move || worker.run())
                .expect("failed to spawn worker thread");
            self.handles.push(handle);
        }
        log_info!("engine: {} workers started", self.workers.len());
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Accept loop. Hands each accepted fd to a worker, round-robin.
    ///
    /// Transient accept errors are skipped. A failed self-pipe write
    /// leaves the pool in an unknown state and is returned as fatal;
    /// this function does not otherwise return.
    pub fn dispatch(&self, listener: &Listener) -> EngineResult<()> {
        let mut next_idx: usize = 0;

        loop {
            let fd = unsafe {
                libc::accept(listener.fd(), std::ptr::null_mut(), std::ptr::null_mut())
            };
            if fd < 0 {
                let e = last_errno();
                match e {
                    libc::EINTR | libc::ECONNABORTED | libc::EAGAIN => continue,
                    libc::EMFILE | libc::ENFILE => {
                        log_error!("dispatcher: out of fds (errno {}), connection dropped", e);
                        continue;
                    }
                    _ => {
                        log_error!("dispatcher: accept failed (errno {})", e);
                        continue;
                    }
                }
            }

            if let Err(e) = set_nonblocking(fd) {
                log_error!("dispatcher: fcntl failed for fd {} (errno {})", fd, e);
                unsafe { libc::close(fd) };
                continue;
            }

            let target = next_idx % self.workers.len();
            next_idx = next_idx.wrapping_add(1);

            if let Err(e) = self.hand_off(fd, target) {
                unsafe { libc::close(fd) };
                return Err(e);
            }
        }
    }

    /// Write one fd value to the target worker's self-pipe. The value
    /// is pipe-atomic, so the worker always reads whole multiples of it
    /// or a prefix it can carry.
    fn hand_off(&self, fd: RawFd, target: usize) -> EngineResult<()> {
        let bytes = fd.to_ne_bytes();
        let n = unsafe {
            libc::write(
                self.workers[target].notify_fd(),
                bytes.as_ptr() as *const libc::c_void,
                bytes.len(),
            )
        };
        if n != bytes.len() as isize {
            let e = last_errno();
            log_error!(
                "dispatcher: self-pipe write to worker-{} failed (errno {})",
                target,
                e
            );
            return Err(EngineError::SelfPipe(e));
        }
        log_debug!("dispatcher: fd {} -> worker-{}", fd, target);
        Ok(())
    }
}
