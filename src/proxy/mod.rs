//! Transports that carry an encoded NVP payload to the API.
//!
//! [`Proxy`] is the seam between the payment client and the network. The
//! client only hands it URL-encoded bytes and expects the raw response body
//! back; how the bytes travel is up to the implementation.

pub mod mock;
#[cfg(feature = "reqwest-proxy")]
pub mod reqwest_proxy;
pub mod socket;

use crate::errors::{PayPalError, Result};
use crate::http::UriScheme;
use url::Url;

/// Content type of every NVP request body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;Charset=UTF-8";

/// Trait for transports that deliver NVP payloads.
///
/// `init` takes `&mut self`, so a proxy cannot be re-pointed while a `send`
/// borrowed from it is still running.
pub trait Proxy: Send + Sync {
    /// Returns the name of this transport (e.g. "socket").
    fn name(&self) -> &str;

    /// Stores the endpoint later calls to [`send`](Self::send) go to.
    ///
    /// Does not validate the URI or connect.
    fn init(&mut self, server_uri: &str);

    /// POSTs `payload` to the endpoint and returns the response body.
    ///
    /// # Arguments
    ///
    /// * `payload` - `application/x-www-form-urlencoded` request body
    ///
    /// # Returns
    ///
    /// The raw body of a 2xx response
    fn send(&self, payload: &[u8]) -> Result<Vec<u8>>;

    /// Whether this transport can work in the current build target.
    fn is_supported() -> bool
    where
        Self: Sized;
}

/// A server URI split into the parts a request needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerUri {
    /// `http` or `https`
    pub scheme: UriScheme,
    /// Host name or address literal
    pub host: String,
    /// Explicit port, if the URI names one
    pub port: Option<u16>,
    /// Path, `/` when the URI has none
    pub path: String,
    /// Query including its leading `?`, if any
    pub query: Option<String>,
}

impl ServerUri {
    /// Parses an absolute `http`/`https` URI.
    ///
    /// # Examples
    ///
    /// ```
    /// use paypal_nvp::http::UriScheme;
    /// use paypal_nvp::proxy::ServerUri;
    ///
    /// let uri = ServerUri::parse("https://api-3t.sandbox.paypal.com/nvp").unwrap();
    /// assert_eq!(uri.scheme, UriScheme::Https);
    /// assert_eq!(uri.port(), 443);
    /// ```
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)?;
        let scheme: UriScheme = url.scheme().parse()?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| PayPalError::MalformedUri(format!("no host in {}", uri)))?;
        let path = match url.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };

        Ok(ServerUri {
            scheme,
            host: host.to_string(),
            port: url.port(),
            path,
            query: url.query().map(|q| format!("?{}", q)),
        })
    }

    /// Port to connect to: explicit, else the scheme default.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.scheme.default_port())
    }

    /// `host:port` as dialed.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port())
    }
}
