//! HTTP/1.1 request assembly.

use crate::config::USER_AGENT;
use crate::errors::{PayPalError, Result};
use std::fmt;
use std::str::FromStr;

/// HTTP protocol version written on the request line.
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// Line terminator used on the wire, on every platform.
pub const CRLF: &str = "\r\n";

/// Request methods the builder accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `OPTIONS`
    Options,
}

impl Method {
    /// Wire representation of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Options => "OPTIONS",
        }
    }
}

impl FromStr for Method {
    type Err = PayPalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "OPTIONS" => Ok(Method::Options),
            other => Err(PayPalError::InvalidArgument(format!(
                "Wrong request type supplied: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URI scheme of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriScheme {
    /// Plain TCP
    Http,
    /// TLS
    Https,
}

impl UriScheme {
    /// Scheme name as it appears in a URI.
    pub fn as_str(self) -> &'static str {
        match self {
            UriScheme::Http => "http",
            UriScheme::Https => "https",
        }
    }

    /// Port used when a URI names none.
    pub fn default_port(self) -> u16 {
        match self {
            UriScheme::Http => 80,
            UriScheme::Https => 443,
        }
    }
}

impl FromStr for UriScheme {
    type Err = PayPalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "http" => Ok(UriScheme::Http),
            "https" => Ok(UriScheme::Https),
            other => Err(PayPalError::MalformedUri(format!(
                "unsupported scheme: {}",
                other
            ))),
        }
    }
}

/// Opaque handle to a header added with [`RequestBuilder::add_header`].
///
/// A handle keeps naming the same header when other headers are removed.
/// Once its own header is removed the handle is dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeaderHandle(usize);

impl HeaderHandle {
    /// Position of the header at the time it was added.
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct HeaderEntry {
    handle: HeaderHandle,
    name: String,
    value: String,
}

/// Builds an HTTP/1.1 request.
///
/// Fields are set through setters and the request is rendered once with
/// [`serialize`](Self::serialize).
///
/// # Examples
///
/// ```
/// use paypal_nvp::http::{Method, RequestBuilder};
///
/// let mut request = RequestBuilder::new();
/// request.set_host("api-3t.paypal.com");
/// request.set_method(Method::Post);
/// request.set_path("/nvp");
/// request.add_header("Content-Length", "0");
///
/// let bytes = request.serialize().unwrap();
/// assert!(bytes.starts_with(b"POST /nvp HTTP/1.1\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    scheme: UriScheme,
    host: String,
    path: String,
    query: String,
    method: Method,
    user_agent: String,
    connection: String,
    headers: Vec<HeaderEntry>,
    next_handle: usize,
    data: Vec<u8>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    /// Creates a `GET /` request over plain HTTP with no host.
    pub fn new() -> Self {
        Self {
            scheme: UriScheme::Http,
            host: String::new(),
            path: "/".to_string(),
            query: String::new(),
            method: Method::Get,
            user_agent: USER_AGENT.to_string(),
            connection: "Close".to_string(),
            headers: Vec::new(),
            next_handle: 0,
            data: Vec::new(),
        }
    }

    /// Sets the scheme.
    pub fn set_scheme(&mut self, scheme: UriScheme) {
        self.scheme = scheme;
    }

    /// Sets the host sent in the `Host` header.
    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
    }

    /// Sets the request path.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    /// Sets the query string.
    ///
    /// The value is written right after the path with nothing in between,
    /// so it must carry its own leading `?`.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Sets the method from its wire name.
    ///
    /// Fails with [`PayPalError::InvalidArgument`] for anything other than
    /// `GET`, `POST`, `PUT` or `OPTIONS`; the current method is kept then.
    pub fn set_type(&mut self, method: &str) -> Result<()> {
        self.method = method.parse()?;
        Ok(())
    }

    /// Sets the method.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Sets the user agent.
    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        self.user_agent = user_agent.into();
    }

    /// Sets the `Connection` header value.
    pub fn set_connection(&mut self, connection: impl Into<String>) {
        self.connection = connection.into();
    }

    /// Sets the request body.
    pub fn set_data(&mut self, data: impl Into<Vec<u8>>) {
        self.data = data.into();
    }

    /// Appends a header and returns its handle.
    ///
    /// Duplicate names are allowed and are written in insertion order.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl ToString) -> HeaderHandle {
        let handle = HeaderHandle(self.next_handle);
        self.next_handle += 1;
        self.headers.push(HeaderEntry {
            handle,
            name: name.into(),
            value: value.to_string(),
        });
        handle
    }

    /// Removes the header named by `handle`.
    ///
    /// Fails with [`PayPalError::OutOfBounds`] if the handle was never issued
    /// by this builder or its header is already gone.
    pub fn remove_header(&mut self, handle: HeaderHandle) -> Result<()> {
        let position = self
            .headers
            .iter()
            .position(|entry| entry.handle == handle)
            .ok_or(PayPalError::OutOfBounds(handle.0))?;
        self.headers.remove(position);
        Ok(())
    }

    /// Returns the added headers in wire order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|entry| (entry.name.as_str(), entry.value.as_str()))
    }

    /// Returns the scheme.
    pub fn scheme(&self) -> UriScheme {
        self.scheme
    }

    /// Returns the host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the query string.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Returns the method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the user agent.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Returns the `Connection` header value.
    pub fn connection(&self) -> &str {
        &self.connection
    }

    /// Returns the body.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the request is meant to travel over TLS.
    pub fn is_secure(&self) -> bool {
        self.scheme == UriScheme::Https
    }

    /// Renders the request in wire format.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if self.host.is_empty() {
            return Err(PayPalError::MissingHost);
        }

        let mut head = String::with_capacity(256);
        head.push_str(self.method.as_str());
        head.push(' ');
        head.push_str(&self.path);
        head.push_str(&self.query);
        head.push(' ');
        head.push_str(HTTP_VERSION);
        head.push_str(CRLF);

        push_header(&mut head, "User-Agent", &self.user_agent);
        push_header(&mut head, "Accept", "*/*");
        push_header(&mut head, "Host", &self.host);
        for entry in &self.headers {
            push_header(&mut head, &entry.name, &entry.value);
        }
        push_header(&mut head, "Connection", &self.connection);
        head.push_str(CRLF);

        let mut request = head.into_bytes();
        request.extend_from_slice(&self.data);
        Ok(request)
    }
}

fn push_header(buf: &mut String, name: &str, value: &str) {
    buf.push_str(name);
    buf.push_str(": ");
    buf.push_str(value);
    buf.push_str(CRLF);
}
