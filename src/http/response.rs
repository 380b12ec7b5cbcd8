//! Raw HTTP/1.1 response reading and classification.

use crate::config::DEFAULT_MAX_RESPONSE_BYTES;
use crate::errors::{PayPalError, Result};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, Read};
use std::str::FromStr;

/// Parsed response status line, e.g. `HTTP/1.1 200 OK`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// Protocol version (`HTTP/1.1`)
    pub version: String,
    /// Numeric status code
    pub code: u16,
    /// Reason phrase, possibly empty
    pub reason: String,
    /// The line as received, without its terminator
    pub raw: String,
}

impl StatusLine {
    /// `true` for 2xx codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

impl FromStr for StatusLine {
    type Err = PayPalError;

    fn from_str(line: &str) -> Result<Self> {
        let malformed = || PayPalError::MalformedResponse(format!("bad status line: {:?}", line));

        let mut parts = line.trim_end().splitn(3, ' ');
        let version = parts.next().filter(|v| v.starts_with("HTTP/")).ok_or_else(malformed)?;
        let code = parts
            .next()
            .filter(|c| c.len() == 3 && c.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(malformed)?;
        let reason = parts.next().unwrap_or("").trim();

        Ok(StatusLine {
            version: version.to_string(),
            code,
            reason: reason.to_string(),
            raw: line.trim_end_matches(['\r', '\n']).to_string(),
        })
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.version, self.code, self.reason)
    }
}

/// Bounds applied while reading a response.
#[derive(Debug, Clone, Copy)]
pub struct ResponseLimits {
    /// Maximum number of bytes (head and body) read from the stream
    pub max_bytes: usize,
}

impl Default for ResponseLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

/// A response as read from the wire.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Parsed first line
    pub status: StatusLine,
    /// Header lines in the order received, status line excluded
    pub header_lines: Vec<String>,
    /// Header name to value; last duplicate wins, names compared as received
    pub headers: HashMap<String, String>,
    /// Everything after the blank separator line, verbatim
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Returns a header value by exact name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Fails with [`PayPalError::Upstream`] unless the status is 2xx.
    pub fn ensure_success(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(PayPalError::Upstream {
                code: self.status.code,
                status_line: self.status.raw.clone(),
            })
        }
    }
}

/// Splits header lines on the first colon. Lines without one are skipped.
pub fn parse_header_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> HashMap<String, String> {
    lines
        .into_iter()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.to_string(), value.trim().to_string()))
        .collect()
}

/// Reads one response from `reader`.
///
/// Lines up to the first blank line form the head; the first of them is the
/// status line. The body is whatever follows, up to end of stream or up to
/// `Content-Length` bytes when the head announces a length. No more than
/// `limits.max_bytes + 1` bytes are ever taken from `reader`.
pub fn read_response<R: BufRead>(reader: &mut R, limits: ResponseLimits) -> Result<RawResponse> {
    let mut total = 0usize;
    let mut head: Vec<String> = Vec::new();
    let mut in_header = true;
    let mut line = Vec::new();

    while in_header {
        line.clear();
        let remaining = limits.max_bytes - total;
        let read = read_line(reader, &mut line, remaining.saturating_add(1))?;
        if read == 0 {
            break;
        }
        if read > remaining {
            return Err(PayPalError::ResponseTooLarge(limits.max_bytes));
        }
        total += read;

        let text = String::from_utf8_lossy(&line);
        let text = text.trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            in_header = false;
        } else {
            tracing::trace!(line = %text, "response header");
            head.push(text.to_string());
        }
    }

    let mut lines = head.into_iter();
    let status_line = lines
        .next()
        .ok_or_else(|| PayPalError::MalformedResponse("empty response".to_string()))?;
    let status: StatusLine = status_line.parse()?;
    let header_lines: Vec<String> = lines.collect();
    let headers = parse_header_lines(header_lines.iter().map(String::as_str));

    let content_length = header_lines
        .iter()
        .rev()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok());

    let mut body = Vec::new();
    if !in_header {
        loop {
            let remaining = limits.max_bytes - total;
            let mut cap = remaining.saturating_add(1);
            if let Some(length) = content_length {
                if body.len() >= length {
                    break;
                }
                cap = cap.min(length - body.len());
            }
            line.clear();
            let read = read_line(reader, &mut line, cap)?;
            if read == 0 {
                break;
            }
            if read > remaining {
                return Err(PayPalError::ResponseTooLarge(limits.max_bytes));
            }
            total += read;
            body.extend_from_slice(&line);
        }
    }

    Ok(RawResponse {
        status,
        header_lines,
        headers,
        body,
    })
}

// Reads up to and including `\n`, but never more than `cap` bytes.
// A TLS peer closing without close_notify reports UnexpectedEof; with
// `Connection: Close` that is the normal end of the response.
fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>, cap: usize) -> Result<usize> {
    let cap = u64::try_from(cap).unwrap_or(u64::MAX);
    match reader.by_ref().take(cap).read_until(b'\n', buf) {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(buf.len()),
        Err(e) => Err(PayPalError::from_io(e)),
    }
}
