//! Per-connection entry loop
//!
//! This is the entry function every connection task runs: receive,
//! parse, respond, repeat while keep-alive holds, then tear the
//! connection down. All failures end in connection closure; nothing
//! propagates past the task boundary.

use crate::config::ServerConfig;
use crate::middleware::{decode_uri, handle_static_file, send_error};
use crate::parser::{ParseStatus, RequestParser};

use strand_core::IoError;
use strand_runtime::{recv_async, Worker};

use std::os::unix::io::RawFd;

/// Drive one connection to completion. Runs as a task on `worker`.
///
/// Two timeouts apply on the receive side: the idle timeout while
/// waiting for a request to begin, and the read timeout once part of a
/// request has arrived. Unconsumed bytes after a
/// complete request are kept for the next iteration, so pipelined
/// requests are answered in order.
pub fn serve_connection(config: &ServerConfig, fd: RawFd, worker: &Worker) {
    let mut parser = RequestParser::new();
    let mut buf = vec![0u8; config.recv_buf_size];
    let mut have = 0usize;
    let mut keep_alive = true;

    'conn: while keep_alive {
        // Receive and parse one full request
        loop {
            if have == 0 {
                let timeout_ms = if parser.is_fresh() {
                    config.idle_timeout_ms
                } else {
                    config.read_timeout_ms
                };

                match recv_async(worker, fd, &mut buf, 0, timeout_ms) {
                    Ok(0) => break 'conn, // orderly close
                    Ok(n) => have = n,
                    Err(IoError::Timeout) => break 'conn,
                    Err(_) => break 'conn,
                }
            }

            let (status, consumed) = parser.feed(&buf[..have]);
            buf.copy_within(consumed..have, 0);
            have -= consumed;

            match status {
                ParseStatus::Partial => continue,
                ParseStatus::Complete => {
                    keep_alive = parser.request().keep_alive();
                    decode_uri(parser.request_mut());
                    handle_static_file(config, parser.request(), keep_alive, worker, fd);
                    parser.reset();
                    continue 'conn;
                }
                ParseStatus::Malformed => {
                    send_error(fd, 400, None, false, worker);
                    keep_alive = false;
                    continue 'conn;
                }
            }
        }
    }

    worker.close_connection(fd);
}
