//! Minimal HTTP/1.1 support for the socket transport.
//!
//! [`RequestBuilder`] renders a request byte for byte; [`read_response`]
//! splits a raw response into status line, headers and body.

pub mod request;
pub mod response;

pub use request::{HeaderHandle, Method, RequestBuilder, UriScheme, CRLF, HTTP_VERSION};
pub use response::{parse_header_lines, read_response, RawResponse, ResponseLimits, StatusLine};
