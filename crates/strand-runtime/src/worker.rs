//! Worker threads
//!
//! A worker is one OS thread that couples an edge-triggered epoll
//! instance with a cooperative task scheduler. All per-worker state
//! (ready queue, fd table, scheduler context, current task) is touched
//! only by the owning thread; the single cross-thread channel is the
//! self-pipe, whose write end the dispatcher uses to hand over accepted
//! fds.
//!
//! Event classes handled by the main loop:
//! - self-pipe readable: batch-drain accepted fds, register each and
//!   spawn its task
//! - client fd readable/writable/peer-closed: wake the parked task
//!
//! The worker never closes a live connection itself. A peer-closed
//! event only wakes the task; the task observes EOF or an error from
//! its next syscall and runs the close sequence on its own way out.
//! Destruction then happens once, at the scheduler boundary.

use crate::arch;
use crate::config::EngineConfig;
use crate::fd_table::FdTable;
use crate::net::last_errno;
use crate::ready_queue::ReadyQueue;
use crate::task::{Task, WaitKind};
use crate::tls;

use strand_core::{log_debug, log_error, log_trace, EngineError, EngineResult};

use std::cell::UnsafeCell;
use std::os::unix::io::RawFd;
use std::ptr::NonNull;
use std::sync::Arc;
use std::time::Instant;

/// How many fds one self-pipe read can drain at once
const NOTIFY_BATCH: usize = 32;

const FD_BYTES: usize = std::mem::size_of::<RawFd>();

/// Per-connection entry invoked on a fresh task for every accepted fd
pub type ConnHandler = dyn Fn(RawFd, &Worker) + Send + Sync;

/// Reassembles fds from the self-pipe byte stream.
///
/// Pipe writes of one fd each are atomic, but a reader buffer boundary
/// can still split a value. Whole fds are emitted; trailing bytes carry
/// into the next drain.
pub(crate) struct FdCarry {
    buf: [u8; FD_BYTES],
    len: usize,
}

impl FdCarry {
    pub(crate) fn new() -> Self {
        Self {
            buf: [0; FD_BYTES],
            len: 0,
        }
    }

    pub(crate) fn push_bytes(&mut self, bytes: &[u8], out: &mut Vec<RawFd>) {
        for &b in bytes {
            self.buf[self.len] = b;
            self.len += 1;
            if self.len == FD_BYTES {
                out.push(RawFd::from_ne_bytes(self.buf));
                self.len = 0;
            }
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.len
    }
}

/// State mutated only by the owning worker thread
struct WorkerInner {
    ready: ReadyQueue<NonNull<Task>>,
    waiting: FdTable<NonNull<Task>>,
    current: Option<NonNull<Task>>,
    sched_regs: arch::SavedRegs,
    carry: FdCarry,
}

/// One OS thread owning a readiness notifier and a task scheduler
pub struct Worker {
    id: usize,
    epfd: RawFd,
    notify_rd: RawFd,
    notify_wr: RawFd,
    stack_size: usize,
    max_events: usize,
    handler: Arc<ConnHandler>,
    inner: UnsafeCell<WorkerInner>,
}

// Safety: `inner` is only ever accessed from the worker's own thread.
// The only cross-thread traffic is a write to `notify_wr`, which is a
// plain fd value.
unsafe impl Send for Worker {}
unsafe impl Sync for Worker {}

impl Worker {
    /// Create a worker: epoll instance, self-pipe, empty queues.
    pub(crate) fn new(
        id: usize,
        config: &EngineConfig,
        handler: Arc<ConnHandler>,
    ) -> EngineResult<Self> {
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd < 0 {
            return Err(EngineError::Notifier(last_errno()));
        }

        let mut pipe_fds = [0 as RawFd; 2];
        if unsafe { libc::pipe(pipe_fds.as_mut_ptr()) } != 0 {
            let e = last_errno();
            unsafe { libc::close(epfd) };
            return Err(EngineError::SelfPipe(e));
        }
        let [notify_rd, notify_wr] = pipe_fds;

        // The read end must not block the drain loop
        if crate::net::set_nonblocking(notify_rd).is_err() {
            let e = last_errno();
            unsafe {
                libc::close(notify_rd);
                libc::close(notify_wr);
                libc::close(epfd);
            }
            return Err(EngineError::SelfPipe(e));
        }

        // Register the self-pipe read end, readable interest only
        let mut ev = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: notify_rd as u64,
        };
        if unsafe { libc::epoll_ctl(epfd, libc::EPOLL_CTL_ADD, notify_rd, &mut ev) } != 0 {
            let e = last_errno();
            unsafe {
                libc::close(notify_rd);
                libc::close(notify_wr);
                libc::close(epfd);
            }
            return Err(EngineError::Register(e));
        }

        Ok(Self {
            id,
            epfd,
            notify_rd,
            notify_wr,
            stack_size: config.stack_size,
            max_events: config.max_events,
            handler,
            inner: UnsafeCell::new(WorkerInner {
                ready: ReadyQueue::new(config.ready_policy),
                waiting: FdTable::new(),
                current: None,
                sched_regs: arch::SavedRegs::default(),
                carry: FdCarry::new(),
            }),
        })
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Write end of the self-pipe, for the dispatcher.
    #[inline]
    pub(crate) fn notify_fd(&self) -> RawFd {
        self.notify_wr
    }

    /// # Safety
    ///
    /// Caller must be the owning worker thread. Borrows must not be
    /// held across a context switch and then reused.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    unsafe fn inner_mut(&self) -> &mut WorkerInner {
        &mut *self.inner.get()
    }

    // ── Main loop ────────────────────────────────────────────────────

    /// Run the event loop. Returns only on an unrecoverable notifier
    /// failure.
    pub fn run(&self) {
        tls::set_current_worker(self);
        log_debug!("worker-{}: started", self.id);

        let mut events = vec![libc::epoll_event { events: 0, u64: 0 }; self.max_events];
        let mut fd_batch: Vec<RawFd> = Vec::with_capacity(NOTIFY_BATCH);
        let mut wake_batch: Vec<NonNull<Task>> = Vec::with_capacity(self.max_events);

        loop {
            let timeout = self.next_wait_timeout();
            let nfds = unsafe {
                libc::epoll_wait(
                    self.epfd,
                    events.as_mut_ptr(),
                    self.max_events as i32,
                    timeout,
                )
            };
            if nfds < 0 {
                let e = last_errno();
                if e == libc::EINTR {
                    continue;
                }
                log_error!("worker-{}: epoll_wait failed (errno {}), exiting", self.id, e);
                return;
            }

            wake_batch.clear();

            for ev in &events[..nfds as usize] {
                let fd = ev.u64 as RawFd;
                let flags = ev.events;

                if fd == self.notify_rd {
                    self.drain_notify(&mut fd_batch, &mut wake_batch);
                    continue;
                }

                // Readable, writable, peer-closed and error conditions
                // all wake the parked task; it learns the specifics from
                // its next syscall. A wakeup that finds nothing parked
                // is a no-op.
                let interesting = (libc::EPOLLIN
                    | libc::EPOLLOUT
                    | libc::EPOLLRDHUP
                    | libc::EPOLLHUP
                    | libc::EPOLLERR) as u32;
                if flags & interesting != 0 {
                    if let Some(task) = self.take_waiter(fd) {
                        wake_batch.push(task);
                    }
                }
            }

            self.wake_expired(&mut wake_batch);

            unsafe {
                self.inner_mut().ready.push_batch(wake_batch.drain(..));
            }

            self.schedule();
        }
    }

    /// Drain accepted fds from the self-pipe in batches and adopt each.
    fn drain_notify(&self, fd_batch: &mut Vec<RawFd>, out: &mut Vec<NonNull<Task>>) {
        let mut bytes = [0u8; NOTIFY_BATCH * FD_BYTES];
        loop {
            let n = unsafe {
                libc::read(
                    self.notify_rd,
                    bytes.as_mut_ptr() as *mut libc::c_void,
                    bytes.len(),
                )
            };
            if n < 0 {
                let e = last_errno();
                if e == libc::EAGAIN || e == libc::EWOULDBLOCK {
                    break; // pipe drained
                }
                if e == libc::EINTR {
                    continue;
                }
                log_error!("worker-{}: self-pipe read failed (errno {})", self.id, e);
                break;
            }
            if n == 0 {
                break;
            }

            fd_batch.clear();
            unsafe {
                self.inner_mut()
                    .carry
                    .push_bytes(&bytes[..n as usize], fd_batch);
            }
            for &fd in fd_batch.iter() {
                self.adopt(fd, out);
            }

            if (n as usize) < bytes.len() {
                break;
            }
        }
    }

    /// Register a freshly accepted fd and create its task.
    fn adopt(&self, fd: RawFd, out: &mut Vec<NonNull<Task>>) {
        if let Err(e) = self.register(fd) {
            log_error!("worker-{}: {} for fd {}, dropping connection", self.id, e, fd);
            unsafe {
                libc::close(fd);
            }
            return;
        }

        let handler = self.handler.clone();
        let entry: Box<dyn FnOnce(&Worker)> = Box::new(move |w| handler(fd, w));

        match Task::create(entry, self.stack_size) {
            Ok(task) => {
                log_trace!("[+] worker-{}: new connection on socket {}", self.id, fd);
                out.push(task);
            }
            Err(e) => {
                log_error!("worker-{}: {} for fd {}, dropping connection", self.id, e, fd);
                self.close_connection(fd);
            }
        }
    }

    /// Register a client fd: read + write + peer-close, edge-triggered.
    fn register(&self, fd: RawFd) -> EngineResult<()> {
        let mut ev = libc::epoll_event {
            events: (libc::EPOLLIN | libc::EPOLLOUT | libc::EPOLLRDHUP | libc::EPOLLET) as u32,
            u64: fd as u64,
        };
        if unsafe { libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_ADD, fd, &mut ev) } != 0 {
            return Err(EngineError::Register(last_errno()));
        }
        Ok(())
    }

    // ── Task runtime operations ──────────────────────────────────────

    /// Park the current task on `fd` and switch to the scheduler.
    ///
    /// Must be called from the running task. When the task is woken,
    /// control returns from this call.
    pub fn yield_on(&self, fd: RawFd, kind: WaitKind) {
        self.yield_until(fd, kind, None);
    }

    /// Like [`Worker::yield_on`] but with a wake deadline, used by
    /// timed receives so a silent peer cannot park a task forever.
    pub(crate) fn yield_until(&self, fd: RawFd, kind: WaitKind, deadline: Option<Instant>) {
        let inner = unsafe { self.inner_mut() };
        let task = inner
            .current
            .take()
            .expect("yield called outside a running task");

        unsafe {
            let t = &mut *task.as_ptr();
            t.fd = fd;
            t.wait_kind = kind;
            t.deadline = deadline;

            let displaced = inner.waiting.park(fd, task);
            debug_assert!(displaced.is_none(), "second task parked on fd {}", fd);

            arch::context_switch(&mut t.regs, &inner.sched_regs);
        }
        // Woken: the fd reported readiness (or the deadline passed)
    }

    /// Wake the task parked on `fd`, if any. Extraction clears the
    /// slot; the connection itself stays registered.
    pub fn wake(&self, fd: RawFd) -> bool {
        match self.take_waiter(fd) {
            Some(task) => {
                unsafe { self.inner_mut().ready.push(task) };
                true
            }
            None => false,
        }
    }

    fn take_waiter(&self, fd: RawFd) -> Option<NonNull<Task>> {
        let inner = unsafe { self.inner_mut() };
        let task = inner.waiting.take(fd)?;
        unsafe {
            let t = &mut *task.as_ptr();
            log_trace!(
                "worker-{}: waking fd {} ({:?} wait)",
                self.id,
                fd,
                t.wait_kind
            );
            t.fd = -1;
            t.deadline = None;
        }
        Some(task)
    }

    /// Run ready tasks until the queue drains.
    ///
    /// Pops a task, switches into it, and on return destroys it if its
    /// entry function finished. A task that yielded was already parked
    /// by `yield_until` and is left alone.
    pub fn schedule(&self) {
        loop {
            let inner = unsafe { self.inner_mut() };
            let Some(task) = inner.ready.pop() else {
                break;
            };
            inner.current = Some(task);

            unsafe {
                arch::context_switch(&mut inner.sched_regs, &(*task.as_ptr()).regs);
            }

            let inner = unsafe { self.inner_mut() };
            inner.current = None;

            if unsafe { (*task.as_ptr()).finished } {
                unsafe { self.destroy(task) };
            }
        }
    }

    /// Finish path for the current task: mark it finished and switch to
    /// the scheduler, which destroys it. Never returns.
    pub(crate) fn finish_current(&self) -> ! {
        let inner = unsafe { self.inner_mut() };
        let task = inner.current.expect("finish outside a running task");
        unsafe {
            let t = &mut *task.as_ptr();
            t.finished = true;
            arch::context_switch(&mut t.regs, &inner.sched_regs);
        }
        unreachable!("finished task was resumed");
    }

    /// Free a task, defensively clearing any wait entry still pointing
    /// at it.
    ///
    /// # Safety
    ///
    /// The task must belong to this worker and must not be executing.
    unsafe fn destroy(&self, task: NonNull<Task>) {
        let inner = self.inner_mut();
        let fd = (*task.as_ptr()).fd;
        if fd >= 0 {
            inner.waiting.remove_if(fd, |t| *t == task);
        }
        Task::destroy(task);
    }

    /// Tear down a client connection.
    ///
    /// Ordering is mandatory: deregister from the notifier first so no
    /// further events can arrive for the fd, then shut down the write
    /// side for an orderly FIN, then close.
    pub fn close_connection(&self, fd: RawFd) {
        if fd < 0 {
            return;
        }
        log_trace!("[-] worker-{}: closing socket {}", self.id, fd);
        unsafe {
            libc::epoll_ctl(self.epfd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut());
            libc::shutdown(fd, libc::SHUT_WR);
            libc::close(fd);
        }
    }

    // ── Receive deadlines ────────────────────────────────────────────

    /// epoll_wait timeout in ms until the nearest parked deadline,
    /// or -1 when no park carries one.
    fn next_wait_timeout(&self) -> i32 {
        let inner = unsafe { self.inner_mut() };
        let mut nearest: Option<Instant> = None;
        for (_, task) in inner.waiting.iter() {
            if let Some(d) = unsafe { (*task.as_ptr()).deadline } {
                nearest = Some(match nearest {
                    Some(n) if n <= d => n,
                    _ => d,
                });
            }
        }
        match nearest {
            None => -1,
            Some(d) => {
                let dur = d.saturating_duration_since(Instant::now());
                if dur.is_zero() {
                    0
                } else {
                    // Round up so the deadline has passed when we wake
                    dur.as_millis().saturating_add(1).min(i32::MAX as u128) as i32
                }
            }
        }
    }

    /// Move tasks whose deadline has passed into the wake batch. The
    /// woken task re-checks its own clock and surfaces the timeout.
    fn wake_expired(&self, out: &mut Vec<NonNull<Task>>) {
        let inner = unsafe { self.inner_mut() };
        let now = Instant::now();
        let expired: Vec<RawFd> = inner
            .waiting
            .iter()
            .filter(|(_, task)| {
                unsafe { (*task.as_ptr()).deadline }.map_or(false, |d| d <= now)
            })
            .map(|(fd, _)| *fd)
            .collect();
        for fd in expired {
            if let Some(task) = self.take_waiter(fd) {
                out.push(task);
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.notify_rd);
            libc::close(self.notify_wr);
            libc::close(self.epfd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fd_carry_whole_values() {
        let mut carry = FdCarry::new();
        let mut out = Vec::new();

        let mut bytes = Vec::new();
        for fd in [7 as RawFd, 42, 1000] {
            bytes.extend_from_slice(&fd.to_ne_bytes());
        }
        carry.push_bytes(&bytes, &mut out);

        assert_eq!(out, vec![7, 42, 1000]);
        assert_eq!(carry.pending(), 0);
    }

    #[test]
    fn test_fd_carry_split_value() {
        let mut carry = FdCarry::new();
        let mut out = Vec::new();

        let bytes = (99 as RawFd).to_ne_bytes();

        // First half: nothing emitted, remainder carried
        carry.push_bytes(&bytes[..2], &mut out);
        assert!(out.is_empty());
        assert_eq!(carry.pending(), 2);

        // Second half completes the value
        carry.push_bytes(&bytes[2..], &mut out);
        assert_eq!(out, vec![99]);
        assert_eq!(carry.pending(), 0);
    }

    #[test]
    fn test_fd_carry_across_batches() {
        let mut carry = FdCarry::new();
        let mut out = Vec::new();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(5 as RawFd).to_ne_bytes());
        bytes.extend_from_slice(&(6 as RawFd).to_ne_bytes());

        // Misaligned boundary inside the second fd
        carry.push_bytes(&bytes[..5], &mut out);
        assert_eq!(out, vec![5]);
        carry.push_bytes(&bytes[5..], &mut out);
        assert_eq!(out, vec![5, 6]);
    }
}
