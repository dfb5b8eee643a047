//! Parsed HTTP request

/// A single header field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// A parsed HTTP/1.1 request: request line plus headers.
///
/// Bodies are not read; only their declared length is exposed.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: String,
    pub uri: String,
    pub version: String,
    pub headers: Vec<Header>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a header value by name, case-insensitively per RFC 7230.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Whether the connection should be reused after this exchange.
    ///
    /// HTTP/1.1 defaults to keep-alive unless the client sends
    /// `Connection: close`; older versions default to close unless the
    /// client asks for `keep-alive`.
    pub fn keep_alive(&self) -> bool {
        match self.header("Connection") {
            Some(v) if v.eq_ignore_ascii_case("close") => false,
            Some(v) if v.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version == "HTTP/1.1",
        }
    }

    /// Declared body length, if any.
    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length").and_then(|v| v.trim().parse().ok())
    }

    /// Reset for the next request on a kept-alive connection.
    pub fn clear(&mut self) {
        self.method.clear();
        self.uri.clear();
        self.version.clear();
        self.headers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(version: &str, headers: &[(&str, &str)]) -> Request {
        Request {
            method: "GET".into(),
            uri: "/".into(),
            version: version.into(),
            headers: headers
                .iter()
                .map(|(n, v)| Header {
                    name: (*n).into(),
                    value: (*v).into(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let req = request_with("HTTP/1.1", &[("Content-Type", "text/html")]);
        assert_eq!(req.header("content-type"), Some("text/html"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("text/html"));
        assert_eq!(req.header("Accept"), None);
    }

    #[test]
    fn test_keep_alive_default_http11() {
        let req = request_with("HTTP/1.1", &[]);
        assert!(req.keep_alive());
    }

    #[test]
    fn test_keep_alive_close_disables() {
        let req = request_with("HTTP/1.1", &[("Connection", "close")]);
        assert!(!req.keep_alive());
        let req = request_with("HTTP/1.1", &[("connection", "Close")]);
        assert!(!req.keep_alive());
    }

    #[test]
    fn test_keep_alive_http10() {
        let req = request_with("HTTP/1.0", &[]);
        assert!(!req.keep_alive());
        let req = request_with("HTTP/1.0", &[("Connection", "keep-alive")]);
        assert!(req.keep_alive());
    }

    #[test]
    fn test_content_length() {
        let req = request_with("HTTP/1.1", &[("Content-Length", "42")]);
        assert_eq!(req.content_length(), Some(42));
        let req = request_with("HTTP/1.1", &[("Content-Length", "nope")]);
        assert_eq!(req.content_length(), None);
    }

    #[test]
    fn test_clear() {
        let mut req = request_with("HTTP/1.1", &[("Host", "x")]);
        req.clear();
        assert!(req.method.is_empty());
        assert!(req.headers.is_empty());
    }
}
