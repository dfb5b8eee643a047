//! Sockets and async I/O primitives
//!
//! The three primitives (`recv_async`, `send_async`, `sendfile_async`)
//! attempt a non-blocking syscall and, on would-block, park the calling
//! task until the worker's notifier reports readiness. From the task's
//! perspective they look like ordinary blocking calls.
//!
//! All three require the fd to be non-blocking and registered with the
//! owning worker's notifier (read + write, edge-triggered), and must be
//! called from within a task. Once woken for readiness, a task must
//! drain the fd to would-block before parking on it again.

use crate::task::WaitKind;
use crate::worker::Worker;

use strand_core::{EngineError, EngineResult, IoError, IoResult};

use std::ffi::CString;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::time::{Duration, Instant};

/// Raw errno of the last failed libc call on this thread
#[inline]
pub(crate) fn last_errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

/// Put an fd into non-blocking mode.
pub fn set_nonblocking(fd: RawFd) -> Result<(), i32> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags < 0 {
            return Err(last_errno());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(last_errno());
        }
    }
    Ok(())
}

// ── Listener ─────────────────────────────────────────────────────────

/// A bound, listening TCP socket
///
/// Resolved passively over IPv4 and IPv6; the first address that binds
/// wins. Address reuse is enabled so restarts do not fight TIME_WAIT.
pub struct Listener {
    fd: RawFd,
}

impl Listener {
    /// Create, bind and listen. `port` is the service string handed to
    /// the resolver; `"0"` asks the kernel for an ephemeral port.
    pub fn bind(port: &str, backlog: i32) -> EngineResult<Self> {
        let c_port =
            CString::new(port).map_err(|_| EngineError::InvalidConfig("port contains NUL"))?;

        let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
        hints.ai_family = libc::AF_UNSPEC;
        hints.ai_socktype = libc::SOCK_STREAM;
        hints.ai_flags = libc::AI_PASSIVE;

        let mut info: *mut libc::addrinfo = std::ptr::null_mut();
        let rv = unsafe {
            libc::getaddrinfo(std::ptr::null(), c_port.as_ptr(), &hints, &mut info)
        };
        if rv != 0 {
            return Err(EngineError::Listener(rv));
        }

        // Walk the candidates and bind the first one that works
        let mut fd: RawFd = -1;
        let mut p = info;
        while !p.is_null() {
            let ai = unsafe { &*p };
            let s = unsafe { libc::socket(ai.ai_family, ai.ai_socktype, ai.ai_protocol) };
            if s < 0 {
                p = ai.ai_next;
                continue;
            }

            let yes: libc::c_int = 1;
            unsafe {
                libc::setsockopt(
                    s,
                    libc::SOL_SOCKET,
                    libc::SO_REUSEADDR,
                    &yes as *const _ as *const libc::c_void,
                    std::mem::size_of::<libc::c_int>() as libc::socklen_t,
                );
            }

            if unsafe { libc::bind(s, ai.ai_addr, ai.ai_addrlen) } == 0 {
                fd = s;
                break;
            }
            unsafe { libc::close(s) };
            p = ai.ai_next;
        }
        unsafe { libc::freeaddrinfo(info) };

        if fd < 0 {
            return Err(EngineError::BindExhausted);
        }

        if unsafe { libc::listen(fd, backlog) } != 0 {
            let e = last_errno();
            unsafe { libc::close(fd) };
            return Err(EngineError::Listener(e));
        }

        Ok(Self { fd })
    }

    /// The port actually bound, useful after binding port `"0"`.
    pub fn local_port(&self) -> EngineResult<u16> {
        let mut addr: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
        let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        let ret = unsafe {
            libc::getsockname(
                self.fd,
                &mut addr as *mut _ as *mut libc::sockaddr,
                &mut len,
            )
        };
        if ret != 0 {
            return Err(EngineError::Listener(last_errno()));
        }
        let port_be = match addr.ss_family as libc::c_int {
            libc::AF_INET => {
                let v4 = unsafe { &*(&addr as *const _ as *const libc::sockaddr_in) };
                v4.sin_port
            }
            libc::AF_INET6 => {
                let v6 = unsafe { &*(&addr as *const _ as *const libc::sockaddr_in6) };
                v6.sin6_port
            }
            _ => return Err(EngineError::Listener(libc::EAFNOSUPPORT)),
        };
        Ok(u16::from_be(port_be))
    }

    #[inline]
    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

// ── Async primitives ─────────────────────────────────────────────────

/// Receive from a socket, parking the task until data is available.
///
/// Returns the bytes read; `Ok(0)` means the peer closed its side.
/// The timeout is measured from the first entry into this call, not
/// reset on each wake. On expiry the call returns `IoError::Timeout`.
pub fn recv_async(
    worker: &Worker,
    fd: RawFd,
    buf: &mut [u8],
    flags: i32,
    timeout_ms: u64,
) -> IoResult<usize> {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    loop {
        let n = unsafe { libc::recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), flags) };
        if n >= 0 {
            return Ok(n as usize);
        }

        let e = last_errno();
        if e == libc::EAGAIN || e == libc::EWOULDBLOCK {
            if start.elapsed() >= timeout {
                return Err(IoError::Timeout);
            }
            worker.yield_until(fd, WaitKind::Read, start.checked_add(timeout));
            // Resumed: the fd reported readable (or the deadline passed),
            // so try recv again
        } else if e == libc::EINTR {
            continue;
        } else {
            return Err(IoError::Os(e));
        }
    }
}

/// Send an entire buffer, parking the task whenever the socket buffer
/// is full.
///
/// Partial sends advance a cursor and retry. A permanent error (e.g. a
/// broken pipe) aborts the send; the caller must not send on the fd
/// again after that.
pub fn send_async(worker: &Worker, fd: RawFd, buf: &[u8], flags: i32) -> IoResult<()> {
    let mut sent = 0usize;

    while sent < buf.len() {
        let n = unsafe {
            libc::send(
                fd,
                buf[sent..].as_ptr() as *const libc::c_void,
                buf.len() - sent,
                flags | libc::MSG_NOSIGNAL,
            )
        };
        if n > 0 {
            sent += n as usize;
            continue;
        }
        if n == 0 {
            return Err(IoError::Os(libc::EPIPE));
        }

        let e = last_errno();
        if e == libc::EAGAIN || e == libc::EWOULDBLOCK {
            worker.yield_on(fd, WaitKind::Write);
        } else if e == libc::EINTR {
            continue;
        } else {
            return Err(IoError::Os(e));
        }
    }

    Ok(())
}

/// Stream a file to a socket with the kernel's zero-copy path.
///
/// Opens the file read-only, hints sequential access, and loops the
/// sendfile syscall with a kernel-updated offset until `size` bytes
/// have gone out. The file is closed on every exit path.
pub fn sendfile_async(worker: &Worker, fd: RawFd, path: &Path, size: u64) -> IoResult<()> {
    let file = std::fs::File::open(path)
        .map_err(|e| IoError::Os(e.raw_os_error().unwrap_or(libc::EIO)))?;
    let file_fd = file.as_raw_fd();

    unsafe {
        libc::posix_fadvise(file_fd, 0, size as libc::off_t, libc::POSIX_FADV_SEQUENTIAL);
    }

    let mut offset: libc::off_t = 0;
    while (offset as u64) < size {
        let remaining = (size - offset as u64) as usize;
        let n = unsafe { libc::sendfile(fd, file_fd, &mut offset, remaining) };
        if n > 0 {
            continue; // offset was advanced by the kernel
        }
        if n == 0 {
            // File shorter than promised; nothing more to send
            break;
        }

        let e = last_errno();
        if e == libc::EINTR {
            continue;
        }
        if e == libc::EAGAIN || e == libc::EWOULDBLOCK {
            worker.yield_on(fd, WaitKind::Write);
            continue;
        }
        return Err(IoError::Os(e));
    }

    Ok(())
}
