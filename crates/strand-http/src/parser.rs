//! Incremental HTTP/1.1 request parser
//!
//! A line-oriented state machine fed with whatever bytes the socket
//! produced. It accumulates the current line across feeds, so a request
//! split over any number of TCP segments parses the same as one that
//! arrived whole.
//!
//! The parser stops consuming at the end of a complete request; bytes
//! belonging to a pipelined follow-up request are left for the next
//! feed. It never blocks and performs no I/O.

use crate::request::{Header, Request};

/// Max number of header fields per request
const MAX_HEADERS: usize = 100;

/// Max size of a single request line or header line
const MAX_LINE_LEN: usize = 8192;

/// Verdict of one feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// More bytes are needed
    Partial,
    /// A full request is available
    Complete,
    /// The request violates the grammar or a limit; reject with 400
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    RequestLine,
    Headers,
    Done,
    Error,
}

/// Stateful request parser, one per connection
pub struct RequestParser {
    state: ParseState,
    line: Vec<u8>,
    request: Request,
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::RequestLine,
            line: Vec::new(),
            request: Request::new(),
        }
    }

    /// True before any byte of the next request has been seen, i.e.
    /// the connection is idle between requests.
    pub fn is_fresh(&self) -> bool {
        self.state == ParseState::RequestLine && self.line.is_empty()
    }

    /// The request built so far; fully populated once `feed` returned
    /// [`ParseStatus::Complete`].
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Mutable access for in-place rewrites (URI decoding).
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Reset for the next request on the same connection.
    pub fn reset(&mut self) {
        self.state = ParseState::RequestLine;
        self.line.clear();
        self.request.clear();
    }

    /// Consume bytes from `buf`, advancing the state machine.
    ///
    /// Returns the verdict and how many bytes were consumed. On
    /// `Complete`, consumption stops right after the final empty line;
    /// the caller keeps the remainder for the next request.
    pub fn feed(&mut self, buf: &[u8]) -> (ParseStatus, usize) {
        let mut consumed = 0usize;

        while consumed < buf.len() {
            if self.state == ParseState::Done || self.state == ParseState::Error {
                break;
            }

            let byte = buf[consumed];
            consumed += 1;

            if self.line.len() >= MAX_LINE_LEN {
                self.state = ParseState::Error;
                break;
            }
            self.line.push(byte);

            if !self.line.ends_with(b"\r\n") {
                continue;
            }
            self.line.truncate(self.line.len() - 2);

            match self.state {
                ParseState::RequestLine => {
                    if self.parse_request_line().is_err() {
                        self.state = ParseState::Error;
                    } else {
                        self.state = ParseState::Headers;
                    }
                }
                ParseState::Headers => {
                    if self.line.is_empty() {
                        // Blank line ends the header section. Bodies are
                        // not consumed here.
                        self.state = ParseState::Done;
                    } else if self.parse_header_field().is_err() {
                        self.state = ParseState::Error;
                    }
                }
                ParseState::Done | ParseState::Error => unreachable!(),
            }

            self.line.clear();
        }

        let status = match self.state {
            ParseState::Done => ParseStatus::Complete,
            ParseState::Error => ParseStatus::Malformed,
            _ => ParseStatus::Partial,
        };
        (status, consumed)
    }

    /// `METHOD SP URI SP VERSION`, where the version must carry the
    /// `HTTP/` prefix.
    fn parse_request_line(&mut self) -> Result<(), ()> {
        let line = std::str::from_utf8(&self.line).map_err(|_| ())?;

        let mut parts = line.splitn(3, ' ');
        let method = parts.next().filter(|s| !s.is_empty()).ok_or(())?;
        let uri = parts.next().filter(|s| !s.is_empty()).ok_or(())?;
        let version = parts.next().filter(|s| !s.is_empty()).ok_or(())?;

        if !version.starts_with("HTTP/") {
            return Err(());
        }

        self.request.method = method.to_string();
        self.request.uri = uri.to_string();
        self.request.version = version.to_string();
        Ok(())
    }

    /// `Name: value` with surrounding whitespace trimmed off the value.
    fn parse_header_field(&mut self) -> Result<(), ()> {
        if self.request.headers.len() >= MAX_HEADERS {
            return Err(());
        }

        let line = std::str::from_utf8(&self.line).map_err(|_| ())?;
        let colon = line.find(':').ok_or(())?;

        let name = &line[..colon];
        let value = line[colon + 1..].trim();

        self.request.headers.push(Header {
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}
