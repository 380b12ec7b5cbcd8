//! Client configuration and library-wide constants.
//!
//! Nothing here is process-wide mutable state: constants are defaults that a
//! [`PayPalConfig`] copies at construction and every value can be overridden.

use crate::errors::{PayPalError, Result};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// NVP API version sent with every call.
pub const API_VERSION: &str = "53.0";

/// User agent sent by the built-in transports.
pub const USER_AGENT: &str =
    "paypal-nvp/0.1 (PayPal NVP Library; +https://github.com/Evil-Co/PayPalLib)";

/// NVP endpoint for live payments.
pub const PRODUCTION_SERVER_URI: &str = "https://api-3t.paypal.com/nvp";

/// NVP endpoint of the sandbox.
pub const SANDBOX_SERVER_URI: &str = "https://api-3t.sandbox.paypal.com/nvp";

/// Prefix of the live checkout page; the token is appended as-is.
pub const PRODUCTION_AUTHORIZATION_URI: &str =
    "https://www.paypal.com/cgi-bin/webscr?cmd=_express-checkout&token=";

/// Prefix of the sandbox checkout page; the token is appended as-is.
pub const SANDBOX_AUTHORIZATION_URI: &str =
    "https://www.sandbox.paypal.com/cgi-bin/webscr?cmd=_express-checkout&token=";

/// Default connect, read and write timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default upper bound on the size of a raw HTTP response.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// Which PayPal installation the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Test installation (`sandbox.paypal.com`)
    Sandbox,
    /// Live installation
    Production,
}

impl Environment {
    /// Returns the environment for a development-mode flag.
    pub fn from_development(development: bool) -> Self {
        if development {
            Environment::Sandbox
        } else {
            Environment::Production
        }
    }

    /// NVP endpoint of this environment.
    pub fn server_uri(self) -> &'static str {
        match self {
            Environment::Sandbox => SANDBOX_SERVER_URI,
            Environment::Production => PRODUCTION_SERVER_URI,
        }
    }

    /// Checkout page prefix of this environment.
    pub fn authorization_uri(self) -> &'static str {
        match self {
            Environment::Sandbox => SANDBOX_AUTHORIZATION_URI,
            Environment::Production => PRODUCTION_AUTHORIZATION_URI,
        }
    }
}

/// Configuration for a [`PayPalClient`](crate::client::PayPalClient).
///
/// Can be built in code or deserialized from JSON. Only the three API
/// credentials are required; everything else has a default.
///
/// # Examples
///
/// ```
/// use paypal_nvp::config::{Environment, PayPalConfig};
///
/// let config = PayPalConfig::new("seller_api1.example.com", "secret", "signature")
///     .with_environment(Environment::Sandbox);
///
/// assert_eq!(config.server_uri(), "https://api-3t.sandbox.paypal.com/nvp");
/// ```
#[derive(Clone, Deserialize)]
pub struct PayPalConfig {
    /// API username
    pub username: String,

    /// API password
    pub password: String,

    /// API signature
    pub signature: String,

    /// Target installation
    #[serde(default = "default_environment")]
    pub environment: Environment,

    /// NVP API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// User agent for outgoing requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Overrides the environment's NVP endpoint
    #[serde(default)]
    pub server_uri: Option<String>,

    /// Overrides the environment's checkout page prefix
    #[serde(default)]
    pub authorization_uri: Option<String>,

    /// Connect timeout in milliseconds, `0` for none
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Read and write timeout in milliseconds, `0` for none
    #[serde(default = "default_timeout_ms")]
    pub io_timeout_ms: u64,

    /// Upper bound on the size of a raw response
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

fn default_environment() -> Environment {
    Environment::Sandbox
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_user_agent() -> String {
    USER_AGENT.to_string()
}

fn default_timeout_ms() -> u64 {
    duration_to_ms(DEFAULT_TIMEOUT)
}

fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

impl PayPalConfig {
    /// Creates a new configuration for the sandbox.
    ///
    /// # Arguments
    ///
    /// * `username` - API username
    /// * `password` - API password
    /// * `signature` - API signature
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            signature: signature.into(),
            environment: default_environment(),
            api_version: default_api_version(),
            user_agent: default_user_agent(),
            server_uri: None,
            authorization_uri: None,
            connect_timeout_ms: default_timeout_ms(),
            io_timeout_ms: default_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
        }
    }

    /// Parses a configuration from JSON and validates it.
    ///
    /// # Examples
    ///
    /// ```
    /// use paypal_nvp::config::{Environment, PayPalConfig};
    ///
    /// let config = PayPalConfig::from_json(r#"{
    ///     "username": "user",
    ///     "password": "pwd",
    ///     "signature": "sig",
    ///     "environment": "production"
    /// }"#).unwrap();
    ///
    /// assert_eq!(config.environment, Environment::Production);
    /// assert_eq!(config.api_version, "53.0");
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PayPalConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the target installation.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Switches between sandbox (`true`) and production (`false`).
    pub fn with_development_mode(self, development: bool) -> Self {
        self.with_environment(Environment::from_development(development))
    }

    /// Sets the NVP API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Points the client at a custom NVP endpoint.
    pub fn with_server_uri(mut self, uri: impl Into<String>) -> Self {
        self.server_uri = Some(uri.into());
        self
    }

    /// Sets a custom checkout page prefix.
    pub fn with_authorization_uri(mut self, uri: impl Into<String>) -> Self {
        self.authorization_uri = Some(uri.into());
        self
    }

    /// Sets connect and I/O timeouts. A zero duration disables the timeout;
    /// anything else is rounded up to whole milliseconds.
    pub fn with_timeouts(mut self, connect: Duration, io: Duration) -> Self {
        self.connect_timeout_ms = duration_to_ms(connect);
        self.io_timeout_ms = duration_to_ms(io);
        self
    }

    /// Sets the response size limit.
    pub fn with_max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }

    /// NVP endpoint in effect.
    pub fn server_uri(&self) -> &str {
        self.server_uri
            .as_deref()
            .unwrap_or_else(|| self.environment.server_uri())
    }

    /// Checkout page prefix in effect.
    pub fn authorization_uri(&self) -> &str {
        self.authorization_uri
            .as_deref()
            .unwrap_or_else(|| self.environment.authorization_uri())
    }

    /// Connect timeout, `None` when configured as zero.
    pub fn connect_timeout(&self) -> Option<Duration> {
        non_zero_ms(self.connect_timeout_ms)
    }

    /// Read/write timeout, `None` when configured as zero.
    pub fn io_timeout(&self) -> Option<Duration> {
        non_zero_ms(self.io_timeout_ms)
    }

    /// Checks that the credentials are present.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("username", &self.username),
            ("password", &self.password),
            ("signature", &self.signature),
        ] {
            if value.is_empty() {
                return Err(PayPalError::ConfigError(format!("{} must not be empty", name)));
            }
        }
        if self.max_response_bytes == 0 {
            return Err(PayPalError::ConfigError(
                "max_response_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

fn non_zero_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl fmt::Debug for PayPalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayPalConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("signature", &"<redacted>")
            .field("environment", &self.environment)
            .field("api_version", &self.api_version)
            .field("user_agent", &self.user_agent)
            .field("server_uri", &self.server_uri())
            .field("authorization_uri", &self.authorization_uri())
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("io_timeout_ms", &self.io_timeout_ms)
            .field("max_response_bytes", &self.max_response_bytes)
            .finish()
    }
}
