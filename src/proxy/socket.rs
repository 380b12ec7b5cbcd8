//! Raw-socket transport.
//!
//! Every [`send`](Proxy::send) opens one connection (plain TCP, or TLS via
//! rustls for `https`), writes a hand-built HTTP/1.1 request, reads the
//! response until the server closes and closes the connection again.

use crate::config::{PayPalConfig, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_TIMEOUT, USER_AGENT};
use crate::errors::{PayPalError, Result};
use crate::http::{read_response, Method, RawResponse, RequestBuilder, ResponseLimits, UriScheme};
use crate::proxy::{Proxy, ServerUri, FORM_CONTENT_TYPE};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Settings for a [`SocketProxy`].
#[derive(Clone)]
pub struct SocketProxyConfig {
    /// User agent written on every request
    pub user_agent: String,

    /// Timeout for establishing the TCP connection
    pub connect_timeout: Option<Duration>,

    /// Timeout for each read from the socket
    pub read_timeout: Option<Duration>,

    /// Timeout for each write to the socket
    pub write_timeout: Option<Duration>,

    /// Upper bound on the raw response size
    pub max_response_bytes: usize,

    /// TLS settings; the webpki root store is used when unset
    pub tls: Option<Arc<ClientConfig>>,
}

impl Default for SocketProxyConfig {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            connect_timeout: Some(DEFAULT_TIMEOUT),
            read_timeout: Some(DEFAULT_TIMEOUT),
            write_timeout: Some(DEFAULT_TIMEOUT),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            tls: None,
        }
    }
}

impl From<&PayPalConfig> for SocketProxyConfig {
    fn from(config: &PayPalConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.io_timeout(),
            write_timeout: config.io_timeout(),
            max_response_bytes: config.max_response_bytes,
            tls: None,
        }
    }
}

impl SocketProxyConfig {
    /// Uses a custom TLS configuration (own roots, client certificates, ...).
    pub fn with_tls(mut self, tls: Arc<ClientConfig>) -> Self {
        self.tls = Some(tls);
        self
    }
}

/// Transport that speaks HTTP/1.1 directly over a socket.
///
/// # Examples
///
/// ```no_run
/// use paypal_nvp::proxy::{socket::SocketProxy, Proxy};
///
/// let mut proxy = SocketProxy::new();
/// proxy.init("https://api-3t.sandbox.paypal.com/nvp");
/// let body = proxy.send(b"METHOD=GetBalance&VERSION=53.0").unwrap();
/// println!("{}", String::from_utf8_lossy(&body));
/// ```
pub struct SocketProxy {
    server_uri: Option<String>,
    config: SocketProxyConfig,
    default_tls: OnceLock<Arc<ClientConfig>>,
}

impl Default for SocketProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketProxy {
    /// Creates an uninitialized proxy with default settings.
    pub fn new() -> Self {
        Self::with_config(SocketProxyConfig::default())
    }

    /// Creates an uninitialized proxy with the given settings.
    pub fn with_config(config: SocketProxyConfig) -> Self {
        Self {
            server_uri: None,
            config,
            default_tls: OnceLock::new(),
        }
    }

    /// Returns the stored server URI.
    pub fn server_uri(&self) -> Option<&str> {
        self.server_uri.as_deref()
    }

    /// Returns the settings.
    pub fn config(&self) -> &SocketProxyConfig {
        &self.config
    }

    /// Builds the POST request carrying `payload` to `uri`.
    pub fn build_request(&self, uri: &ServerUri, payload: &[u8]) -> RequestBuilder {
        let mut request = RequestBuilder::new();
        request.set_scheme(uri.scheme);
        request.set_host(uri.host.as_str());
        request.set_method(Method::Post);
        request.set_path(uri.path.as_str());
        if let Some(query) = &uri.query {
            request.set_query(query.as_str());
        }
        request.set_user_agent(self.config.user_agent.as_str());
        request.add_header("Content-Type", FORM_CONTENT_TYPE);
        request.add_header("Content-Length", payload.len());
        request.set_data(payload);
        request
    }

    fn tls_config(&self) -> Result<Arc<ClientConfig>> {
        if let Some(config) = &self.config.tls {
            return Ok(config.clone());
        }
        if let Some(config) = self.default_tls.get() {
            return Ok(config.clone());
        }
        let config = default_tls_config()?;
        Ok(self.default_tls.get_or_init(|| config).clone())
    }

    fn connect(&self, uri: &ServerUri) -> Result<Connection> {
        let address = uri.authority();
        let connection_error = |source: io::Error| PayPalError::Connection {
            address: address.clone(),
            source,
        };

        // url keeps IPv6 literals bracketed; the resolver wants them bare.
        let host = uri.host.trim_start_matches('[').trim_end_matches(']');
        let addrs: Vec<SocketAddr> = (host, uri.port())
            .to_socket_addrs()
            .map_err(connection_error)?
            .collect();

        let mut last_error = io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses");
        let mut stream = None;
        for addr in addrs {
            let attempt = match self.config.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    debug!(%addr, error = %e, "connect attempt failed");
                    last_error = e;
                }
            }
        }
        let mut stream = stream.ok_or_else(|| connection_error(last_error))?;

        stream
            .set_read_timeout(self.config.read_timeout)
            .map_err(connection_error)?;
        stream
            .set_write_timeout(self.config.write_timeout)
            .map_err(connection_error)?;
        debug!(%address, secure = uri.scheme == UriScheme::Https, "connection opened");

        if uri.scheme != UriScheme::Https {
            return Ok(Connection::Plain(stream));
        }

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| PayPalError::MalformedUri(format!("{}: {}", uri.host, e)))?;
        let mut session = ClientConnection::new(self.tls_config()?, server_name)?;
        while session.is_handshaking() {
            if let Err(e) = session.complete_io(&mut stream) {
                let _ = stream.shutdown(Shutdown::Both);
                return Err(connection_error(e));
            }
        }
        Ok(Connection::Tls(Box::new(StreamOwned::new(session, stream))))
    }
}

impl Proxy for SocketProxy {
    fn name(&self) -> &str {
        "socket"
    }

    fn init(&mut self, server_uri: &str) {
        self.server_uri = Some(server_uri.to_string());
    }

    fn send(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let server_uri = self
            .server_uri
            .as_deref()
            .ok_or_else(|| PayPalError::MalformedUri("no server URI configured".to_string()))?;
        let uri = ServerUri::parse(server_uri)?;
        let request = self.build_request(&uri, payload).serialize()?;

        let mut connection = self.connect(&uri)?;
        let limits = ResponseLimits {
            max_bytes: self.config.max_response_bytes,
        };
        let result = exchange(&mut connection, &request, limits);
        connection.close();

        let response = result?;
        debug!(
            status = response.status.code,
            body_len = response.body.len(),
            "response received"
        );
        let response = response.ensure_success().map_err(|e| {
            warn!(error = %e, "API answered with an error status");
            e
        })?;
        Ok(response.body)
    }

    fn is_supported() -> bool {
        cfg!(not(target_arch = "wasm32"))
    }
}

/// Writes `request` to `stream` and reads back one response.
pub fn exchange<S: Read + Write>(
    stream: &mut S,
    request: &[u8],
    limits: ResponseLimits,
) -> Result<RawResponse> {
    stream.write_all(request).map_err(PayPalError::from_io)?;
    stream.flush().map_err(PayPalError::from_io)?;
    let mut reader = BufReader::new(stream);
    read_response(&mut reader, limits)
}

/// Builds the TLS configuration used when none is injected.
pub fn default_tls_config() -> Result<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();
    Ok(Arc::new(config))
}

enum Connection {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Connection {
    fn close(self) {
        let result = match self {
            Connection::Plain(stream) => stream.shutdown(Shutdown::Both),
            Connection::Tls(mut stream) => {
                stream.conn.send_close_notify();
                let _ = stream.conn.complete_io(&mut stream.sock);
                stream.sock.shutdown(Shutdown::Both)
            }
        };
        match result {
            Ok(()) => debug!("connection closed"),
            // The peer may already be gone; the socket is released on drop either way.
            Err(e) => debug!(error = %e, "connection closed with error"),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(stream) => stream.read(buf),
            Connection::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(stream) => stream.write(buf),
            Connection::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Plain(stream) => stream.flush(),
            Connection::Tls(stream) => stream.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, Cursor};
    use std::net::TcpListener;
    use std::thread;

    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Serves one canned response; the handle yields the raw request and
    /// whether the client closed its side afterwards.
    fn serve_once(response: &'static str) -> (String, thread::JoinHandle<(Vec<u8>, bool)>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let uri = format!("http://{}/nvp", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
            let mut reader = BufReader::new(&stream);
            let mut request = Vec::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                request.extend_from_slice(line.as_bytes());
                if let Some(value) = line.strip_prefix("Content-Length: ") {
                    content_length = value.trim().parse().unwrap();
                }
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut body = vec![0; content_length];
            reader.read_exact(&mut body).unwrap();
            request.extend_from_slice(&body);

            (&stream).write_all(response.as_bytes()).unwrap();
            stream.shutdown(Shutdown::Write).unwrap();

            let mut rest = Vec::new();
            let closed = matches!(reader.read_to_end(&mut rest), Ok(0));
            (request, closed)
        });
        (uri, handle)
    }

    #[test]
    fn test_build_request() {
        let mut proxy = SocketProxy::new();
        proxy.init("https://api-3t.sandbox.paypal.com/nvp?x=1");
        let uri = ServerUri::parse(proxy.server_uri().unwrap()).unwrap();
        let request = proxy.build_request(&uri, b"METHOD=Ping");

        assert!(request.is_secure());
        let text = String::from_utf8(request.serialize().unwrap()).unwrap();
        assert!(text.starts_with("POST /nvp?x=1 HTTP/1.1\r\n"));
        assert!(text.contains(&format!("User-Agent: {}\r\n", USER_AGENT)));
        assert!(text.contains("Host: api-3t.sandbox.paypal.com\r\n"));
        assert!(text.contains(
            "Content-Type: application/x-www-form-urlencoded;Charset=UTF-8\r\nContent-Length: 11\r\n"
        ));
        assert!(text.ends_with("Connection: Close\r\n\r\nMETHOD=Ping"));
    }

    #[test]
    fn test_exchange_in_memory() {
        let mut duplex = Duplex {
            input: Cursor::new(b"HTTP/1.1 200 OK\r\nServer: test\r\n\r\nACK=Success".to_vec()),
            output: Vec::new(),
        };
        let response = exchange(&mut duplex, b"REQUEST", ResponseLimits::default()).unwrap();
        assert_eq!(duplex.output, b"REQUEST");
        assert_eq!(response.header("Server"), Some("test"));
        assert_eq!(response.body, b"ACK=Success");
    }

    #[test]
    fn test_send_without_init() {
        let proxy = SocketProxy::new();
        assert!(matches!(
            proxy.send(b"A=1"),
            Err(PayPalError::MalformedUri(_))
        ));
    }

    #[test]
    fn test_send_malformed_uri() {
        let mut proxy = SocketProxy::new();
        proxy.init("::not a uri::");
        assert!(matches!(
            proxy.send(b"A=1"),
            Err(PayPalError::MalformedUri(_))
        ));
    }

    #[test]
    fn test_send_returns_body() {
        let (uri, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nACK=Success&TOKEN=abc123",
        );
        let mut proxy = SocketProxy::new();
        proxy.init(&uri);

        let body = proxy.send(b"METHOD=SetExpressCheckout").unwrap();
        assert_eq!(body, b"ACK=Success&TOKEN=abc123");

        let (request, closed) = server.join().unwrap();
        let request = String::from_utf8(request).unwrap();
        assert!(request.starts_with("POST /nvp HTTP/1.1\r\n"));
        assert!(request.contains("Content-Length: 25\r\n"));
        assert!(request.ends_with("\r\n\r\nMETHOD=SetExpressCheckout"));
        assert!(closed);
    }

    #[test]
    fn test_send_not_found_closes_connection() {
        let (uri, server) = serve_once("HTTP/1.1 404 Not Found\r\nContent-Length: 4\r\n\r\ngone");
        let mut proxy = SocketProxy::new();
        proxy.init(&uri);

        match proxy.send(b"A=1") {
            Err(PayPalError::Upstream { code, .. }) => assert_eq!(code, 404),
            other => panic!("unexpected result: {:?}", other),
        }

        let (_, closed) = server.join().unwrap();
        assert!(closed);
    }

    #[test]
    fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut proxy = SocketProxy::new();
        proxy.init(&format!("http://{}/nvp", addr));
        match proxy.send(b"A=1") {
            Err(PayPalError::Connection { address, .. }) => assert_eq!(address, addr.to_string()),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_config_from_paypal_config() {
        let paypal = PayPalConfig::new("u", "p", "s")
            .with_user_agent("custom/1.0")
            .with_timeouts(Duration::from_secs(3), Duration::from_secs(0));
        let config = SocketProxyConfig::from(&paypal);
        assert_eq!(config.user_agent, "custom/1.0");
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.read_timeout, None);
    }

    #[test]
    fn test_default_tls_config() {
        assert!(default_tls_config().is_ok());
    }

    #[test]
    fn test_is_supported() {
        assert!(SocketProxy::is_supported());
    }
}
