//! Static file router with SPA fallback
//!
//! Maps a decoded URI onto the document root:
//! - only GET and HEAD are served
//! - any `..` in the URI is rejected outright
//! - `/` serves `/index.html`
//! - a directory without a trailing slash redirects to `<uri>/`
//! - a directory with one serves its `index.html`
//! - an extensionless miss falls back to the root `index.html`, so
//!   client-side routes like `/dashboard` deep-link correctly

use crate::config::ServerConfig;
use crate::middleware::http_utils::{send_error, send_redirect, serve_file};
use crate::request::Request;

use strand_runtime::Worker;

use std::fs;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

/// Routing verdict for a request against the document root
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Route {
    MethodNotAllowed,
    BadRequest,
    /// Directory hit without trailing slash; redirect to `<uri>/`
    Redirect,
    /// Serve this file with this size
    File(PathBuf, u64),
    NotFound,
}

pub(crate) fn resolve(root: &Path, method: &str, uri: &str) -> Route {
    if method != "GET" && method != "HEAD" {
        return Route::MethodNotAllowed;
    }

    if uri.contains("..") {
        return Route::BadRequest;
    }

    let effective = if uri == "/" { "/index.html" } else { uri };
    let mut path = root.join(effective.trim_start_matches('/'));

    match fs::metadata(&path) {
        Ok(meta) if meta.is_dir() => {
            if !uri.ends_with('/') {
                return Route::Redirect;
            }
            path.push("index.html");
            return match fs::metadata(&path) {
                Ok(m) if m.is_file() => Route::File(path, m.len()),
                _ => Route::NotFound,
            };
        }
        Ok(meta) if meta.is_file() => return Route::File(path, meta.len()),
        _ => {}
    }

    // Extensionless miss: treat as a client-side route and serve the
    // application shell
    if !uri.contains('.') {
        let index = root.join("index.html");
        if let Ok(m) = fs::metadata(&index) {
            if m.is_file() {
                return Route::File(index, m.len());
            }
        }
    }

    Route::NotFound
}

/// Route the request and write the response.
pub fn handle_static_file(
    config: &ServerConfig,
    req: &Request,
    keep_alive: bool,
    worker: &Worker,
    client_fd: RawFd,
) {
    match resolve(&config.root, &req.method, &req.uri) {
        Route::MethodNotAllowed => send_error(client_fd, 405, None, keep_alive, worker),
        Route::BadRequest => send_error(client_fd, 400, None, keep_alive, worker),
        Route::Redirect => send_redirect(client_fd, &req.uri, keep_alive, worker),
        Route::File(path, size) => {
            serve_file(client_fd, &path, size, &req.method, keep_alive, worker)
        }
        Route::NotFound => send_error(client_fd, 404, None, keep_alive, worker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Build a throwaway docroot:
    ///   index.html, style.css, "my report.txt", docs/index.html, empty/
    fn docroot() -> PathBuf {
        static SEQ: AtomicU32 = AtomicU32::new(0);
        let dir = std::env::temp_dir().join(format!(
            "strand-router-{}-{}",
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(dir.join("docs")).unwrap();
        fs::create_dir_all(dir.join("empty")).unwrap();
        fs::write(dir.join("index.html"), "<html>home</html>").unwrap();
        fs::write(dir.join("style.css"), "body{}").unwrap();
        fs::write(dir.join("my report.txt"), "hello").unwrap();
        fs::write(dir.join("docs/index.html"), "<html>docs</html>").unwrap();
        dir
    }

    #[test]
    fn test_regular_file() {
        let root = docroot();
        match resolve(&root, "GET", "/style.css") {
            Route::File(path, size) => {
                assert_eq!(path, root.join("style.css"));
                assert_eq!(size, 6);
            }
            other => panic!("unexpected route {:?}", other),
        }
    }

    #[test]
    fn test_root_serves_index() {
        let root = docroot();
        match resolve(&root, "GET", "/") {
            Route::File(path, _) => assert_eq!(path, root.join("index.html")),
            other => panic!("unexpected route {:?}", other),
        }
    }

    #[test]
    fn test_directory_without_slash_redirects() {
        let root = docroot();
        assert_eq!(resolve(&root, "GET", "/docs"), Route::Redirect);
    }

    #[test]
    fn test_directory_with_slash_serves_its_index() {
        let root = docroot();
        match resolve(&root, "GET", "/docs/") {
            Route::File(path, _) => assert_eq!(path, root.join("docs/index.html")),
            other => panic!("unexpected route {:?}", other),
        }
    }

    #[test]
    fn test_directory_without_index_is_404() {
        let root = docroot();
        assert_eq!(resolve(&root, "GET", "/empty/"), Route::NotFound);
    }

    #[test]
    fn test_spa_fallback_for_extensionless_miss() {
        let root = docroot();
        match resolve(&root, "GET", "/dashboard") {
            Route::File(path, _) => assert_eq!(path, root.join("index.html")),
            other => panic!("unexpected route {:?}", other),
        }
    }

    #[test]
    fn test_miss_with_extension_is_404() {
        let root = docroot();
        assert_eq!(resolve(&root, "GET", "/missing.png"), Route::NotFound);
    }

    #[test]
    fn test_traversal_rejected() {
        let root = docroot();
        assert_eq!(resolve(&root, "GET", "/../etc/passwd"), Route::BadRequest);
        assert_eq!(resolve(&root, "GET", "/a/../../b"), Route::BadRequest);
    }

    #[test]
    fn test_methods() {
        let root = docroot();
        assert_eq!(resolve(&root, "POST", "/"), Route::MethodNotAllowed);
        assert_eq!(resolve(&root, "DELETE", "/"), Route::MethodNotAllowed);
        assert!(matches!(resolve(&root, "HEAD", "/"), Route::File(..)));
    }

    #[test]
    fn test_decoded_space_in_name() {
        let root = docroot();
        match resolve(&root, "GET", "/my report.txt") {
            Route::File(path, size) => {
                assert_eq!(path, root.join("my report.txt"));
                assert_eq!(size, 5);
            }
            other => panic!("unexpected route {:?}", other),
        }
    }
}
