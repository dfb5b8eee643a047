//! Response building helpers
//!
//! Status lines, MIME mapping, redirects, error responses, and the
//! corked header+body file send.

use strand_core::log_debug;
use strand_runtime::{send_async, sendfile_async, Worker};

use std::os::unix::io::RawFd;
use std::path::Path;

const MIME_TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("txt", "text/plain"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("json", "application/json"),
    ("map", "application/json"),
];

const DEFAULT_MIME: &str = "application/octet-stream";

/// Content type for a file path, by extension.
pub fn mime_type(path: &Path) -> &'static str {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext,
        None => return DEFAULT_MIME,
    };
    MIME_TYPES
        .iter()
        .find(|(e, _)| ext.eq_ignore_ascii_case(e))
        .map(|(_, t)| *t)
        .unwrap_or(DEFAULT_MIME)
}

/// Reason phrase for the status codes this server emits.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        200 => "OK",
        301 => "Moved Permanently",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown Error",
    }
}

fn connection_token(keep_alive: bool) -> &'static str {
    if keep_alive {
        "keep-alive"
    } else {
        "close"
    }
}

/// Toggle TCP_CORK so header and body leave as coalesced packets.
fn set_cork(fd: RawFd, on: bool) {
    let state: libc::c_int = if on { 1 } else { 0 };
    unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_TCP,
            libc::TCP_CORK,
            &state as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

/// Send a 200 response for a regular file.
///
/// The socket is corked across the header and the zero-copy body so
/// the kernel can pack both into full segments, then uncorked to flush.
/// HEAD requests get the header only.
pub fn serve_file(
    client_fd: RawFd,
    path: &Path,
    file_size: u64,
    method: &str,
    keep_alive: bool,
    worker: &Worker,
) {
    let mime = mime_type(path);

    set_cork(client_fd, true);

    let header = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: {}\r\n\
         Content-Length: {}\r\n\
         Connection: {}\r\n\
         \r\n",
        mime,
        file_size,
        connection_token(keep_alive),
    );

    if send_async(worker, client_fd, header.as_bytes(), 0).is_ok() && method != "HEAD" {
        if let Err(e) = sendfile_async(worker, client_fd, path, file_size) {
            log_debug!("sendfile for {:?} aborted: {}", path, e);
        }
    }

    set_cork(client_fd, false);
}

/// Send a 301 pointing at the same URI with a trailing slash, keeping
/// the client's relative path logic intact.
pub fn send_redirect(client_fd: RawFd, old_uri: &str, keep_alive: bool, worker: &Worker) {
    let response = format!(
        "HTTP/1.1 301 Moved Permanently\r\n\
         Location: {}/\r\n\
         Content-Length: 0\r\n\
         Connection: {}\r\n\
         \r\n",
        old_uri,
        connection_token(keep_alive),
    );
    let _ = send_async(worker, client_fd, response.as_bytes(), 0);
}

/// Send a plain-text error response.
pub fn send_error(
    client_fd: RawFd,
    code: u16,
    msg: Option<&str>,
    keep_alive: bool,
    worker: &Worker,
) {
    let body = match msg {
        Some(m) if !m.is_empty() => format!("{}\n", m),
        _ => String::new(),
    };

    let response = format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Connection: {}\r\n\
         \r\n\
         {}",
        code,
        reason_phrase(code),
        body.len(),
        connection_token(keep_alive),
        body,
    );
    let _ = send_async(worker, client_fd, response.as_bytes(), 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_mime_lookup() {
        assert_eq!(mime_type(&PathBuf::from("a/index.html")), "text/html");
        assert_eq!(mime_type(&PathBuf::from("s.css")), "text/css");
        assert_eq!(mime_type(&PathBuf::from("app.JS")), "application/javascript");
        assert_eq!(mime_type(&PathBuf::from("pic.jpeg")), "image/jpeg");
    }

    #[test]
    fn test_mime_default() {
        assert_eq!(mime_type(&PathBuf::from("binary.bin")), DEFAULT_MIME);
        assert_eq!(mime_type(&PathBuf::from("no-extension")), DEFAULT_MIME);
    }

    #[test]
    fn test_reason_phrases() {
        assert_eq!(reason_phrase(200), "OK");
        assert_eq!(reason_phrase(301), "Moved Permanently");
        assert_eq!(reason_phrase(400), "Bad Request");
        assert_eq!(reason_phrase(404), "Not Found");
        assert_eq!(reason_phrase(405), "Method Not Allowed");
        assert_eq!(reason_phrase(599), "Unknown Error");
    }
}
