//! Transport backed by `reqwest`'s blocking client.

use crate::config::{PayPalConfig, USER_AGENT};
use crate::errors::{PayPalError, Result};
use crate::proxy::{Proxy, ServerUri, FORM_CONTENT_TYPE};
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use std::error::Error as _;
use std::io;
use tracing::{debug, warn};

/// Sends NVP payloads through a [`reqwest::blocking::Client`].
///
/// Useful where the raw socket transport does not fit, e.g. behind an HTTP
/// proxy configured through the environment, which reqwest honors. Clients
/// built here do not follow redirects, so a 3xx answer is an error exactly as
/// on the socket transport.
pub struct ReqwestProxy {
    server_uri: Option<String>,
    client: Client,
}

impl ReqwestProxy {
    /// Creates a proxy with a default client using the library user agent.
    pub fn new() -> Result<Self> {
        let client = builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_client(client))
    }

    /// Creates a proxy whose client follows the configured user agent and timeouts.
    pub fn from_config(config: &PayPalConfig) -> Result<Self> {
        let mut builder = builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        // reqwest's blocking client has a 30 s default; `None` lifts it.
        builder = builder.timeout(config.io_timeout());
        Ok(Self::with_client(builder.build()?))
    }

    /// Uses a custom HTTP client as is, including its redirect policy.
    pub fn with_client(client: Client) -> Self {
        Self {
            server_uri: None,
            client,
        }
    }
}

impl Proxy for ReqwestProxy {
    fn name(&self) -> &str {
        "reqwest"
    }

    fn init(&mut self, server_uri: &str) {
        self.server_uri = Some(server_uri.to_string());
    }

    fn send(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let server_uri = self
            .server_uri
            .as_deref()
            .ok_or_else(|| PayPalError::MalformedUri("no server URI configured".to_string()))?;
        // Same acceptance rules as the socket transport.
        let target = ServerUri::parse(server_uri)?;

        let response = self
            .client
            .post(server_uri)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(payload.to_vec())
            .send()
            .map_err(|e| map_reqwest_error(e, &target))?;

        let status = response.status();
        debug!(status = status.as_u16(), "response received");
        if !status.is_success() {
            let err = PayPalError::Upstream {
                code: status.as_u16(),
                status_line: format!(
                    "{:?} {} {}",
                    response.version(),
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                )
                .trim_end()
                .to_string(),
            };
            warn!(error = %err, "API answered with an error status");
            return Err(err);
        }

        let body = response.bytes().map_err(|e| map_reqwest_error(e, &target))?;
        Ok(body.to_vec())
    }

    fn is_supported() -> bool {
        true
    }
}

fn builder() -> ClientBuilder {
    Client::builder().redirect(Policy::none())
}

fn map_reqwest_error(err: reqwest::Error, target: &ServerUri) -> PayPalError {
    if err.is_timeout() {
        return PayPalError::TimeoutExceeded;
    }
    if !err.is_connect() {
        return PayPalError::Http(err);
    }

    // Keep the OS error code when the connector reports one, else keep the
    // whole reqwest error behind the io kind it carries.
    let (kind, errno) = io_source(&err)
        .map_or((io::ErrorKind::Other, None), |e| (e.kind(), e.raw_os_error()));
    let source = match errno {
        Some(code) => io::Error::from_raw_os_error(code),
        None => io::Error::new(kind, err),
    };
    PayPalError::Connection {
        address: target.authority(),
        source,
    }
}

fn io_source(err: &reqwest::Error) -> Option<&io::Error> {
    let mut current = err.source();
    while let Some(cause) = current {
        if let Some(e) = cause.downcast_ref::<io::Error>() {
            return Some(e);
        }
        current = cause.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn serve_once(response: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let uri = format!("http://{}/nvp", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(&stream);
            let mut head = String::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
                head.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut body = vec![0; content_length];
            reader.read_exact(&mut body).unwrap();
            (&stream).write_all(response.as_bytes()).unwrap();
            head + &String::from_utf8(body).unwrap()
        });
        (uri, handle)
    }

    #[test]
    fn test_send_success() {
        let (uri, server) =
            serve_once("HTTP/1.1 200 OK\r\nContent-Length: 11\r\nConnection: close\r\n\r\nACK=Success");
        let mut proxy = ReqwestProxy::new().unwrap();
        proxy.init(&uri);

        let body = proxy.send(b"METHOD=Ping").unwrap();
        assert_eq!(body, b"ACK=Success");

        let request = server.join().unwrap().to_ascii_lowercase();
        assert!(request.starts_with("post /nvp http/1.1\r\n"));
        assert!(request.contains("content-type: application/x-www-form-urlencoded;charset=utf-8"));
        assert!(request.ends_with("method=ping"));
    }

    #[test]
    fn test_send_server_error() {
        let (uri, server) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let mut proxy = ReqwestProxy::new().unwrap();
        proxy.init(&uri);

        match proxy.send(b"A=1") {
            Err(PayPalError::Upstream { code, .. }) => assert_eq!(code, 500),
            other => panic!("unexpected result: {:?}", other),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_redirect_is_not_followed() {
        let (uri, server) = serve_once(
            "HTTP/1.1 302 Found\r\nLocation: /other\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let mut proxy = ReqwestProxy::new().unwrap();
        proxy.init(&uri);

        match proxy.send(b"A=1") {
            Err(PayPalError::Upstream { code, status_line }) => {
                assert_eq!(code, 302);
                assert_eq!(status_line, "HTTP/1.1 302 Found");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_redirect_is_not_followed_with_config() {
        let (uri, server) = serve_once(
            "HTTP/1.1 301 Moved Permanently\r\nLocation: /other\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        let mut proxy = ReqwestProxy::from_config(&PayPalConfig::new("u", "p", "s")).unwrap();
        proxy.init(&uri);

        assert!(matches!(
            proxy.send(b"A=1"),
            Err(PayPalError::Upstream { code: 301, .. })
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_connection_refused_keeps_authority_and_errno() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut proxy = ReqwestProxy::new().unwrap();
        proxy.init(&format!("http://{}/nvp", addr));
        match proxy.send(b"A=1") {
            Err(PayPalError::Connection { address, source }) => {
                assert_eq!(address, addr.to_string());
                assert_eq!(source.kind(), io::ErrorKind::ConnectionRefused);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_send_without_init() {
        let proxy = ReqwestProxy::new().unwrap();
        assert!(matches!(proxy.send(b""), Err(PayPalError::MalformedUri(_))));
    }
}
