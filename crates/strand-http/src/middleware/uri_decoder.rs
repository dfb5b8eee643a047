//! Percent-decoding of request URIs
//!
//! Rewrites the URI in place before routing, so `/my%20report.txt`
//! resolves against the real file name. `+` also maps to space for the
//! benefit of older clients that encode query spaces that way.

use crate::request::Request;

/// Decode the request URI in place.
pub fn decode_uri(req: &mut Request) {
    req.uri = decode(&req.uri);
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn decode(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        // Not a valid escape; keep it literal
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_decode() {
        assert_eq!(decode("/my%20report.txt"), "/my report.txt");
        assert_eq!(decode("/a%2Fb"), "/a/b");
    }

    #[test]
    fn test_plus_becomes_space() {
        assert_eq!(decode("/search+term"), "/search term");
    }

    #[test]
    fn test_plain_uri_untouched() {
        assert_eq!(decode("/index.html"), "/index.html");
    }

    #[test]
    fn test_invalid_escape_kept_literal() {
        assert_eq!(decode("/100%zz"), "/100%zz");
        assert_eq!(decode("/trailing%2"), "/trailing%2");
        assert_eq!(decode("/end%"), "/end%");
    }

    #[test]
    fn test_decode_uri_in_place() {
        let mut req = Request::new();
        req.uri = "/caf%C3%A9".into();
        decode_uri(&mut req);
        assert_eq!(req.uri, "/café");
    }
}
