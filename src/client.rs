//! Express Checkout client.
//!
//! [`PayPalClient`] merges the API credentials into every call, hands the
//! encoded parameters to a [`Proxy`] and decodes the answer. Redirecting the
//! end user is left to the caller: [`PayPalClient::start_payment`] returns the
//! location to send them to.

use crate::config::PayPalConfig;
use crate::errors::{PayPalError, Result};
use crate::nvp::{self, NvpResponse};
use crate::proxy::socket::{SocketProxy, SocketProxyConfig};
use crate::proxy::Proxy;
use std::fmt;
use tracing::{debug, warn};

/// Method name of the call that opens a checkout session.
pub const SET_EXPRESS_CHECKOUT: &str = "SetExpressCheckout";

/// Method name of the call that looks up a checkout session.
pub const GET_EXPRESS_CHECKOUT_DETAILS: &str = "GetExpressCheckoutDetails";

/// How the payment will be captured (`PAYMENTACTION`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentAction {
    /// Final sale
    Sale,
    /// Authorization to capture later
    Authorization,
    /// Order to authorize and capture later
    Order,
}

impl PaymentAction {
    /// Wire value of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentAction::Sale => "Sale",
            PaymentAction::Authorization => "Authorization",
            PaymentAction::Order => "Order",
        }
    }
}

impl fmt::Display for PaymentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where to send the end user after a checkout session was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRedirect {
    /// Checkout token issued by PayPal
    pub token: String,
    /// Authorization URI with the token appended
    pub location: String,
}

/// Client for the PayPal NVP API.
///
/// # Examples
///
/// ```no_run
/// use paypal_nvp::client::{PayPalClient, PaymentAction};
/// use paypal_nvp::config::PayPalConfig;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PayPalConfig::new("seller_api1.example.com", "secret", "signature");
/// let client = PayPalClient::new(config)?;
///
/// let redirect = client.start_payment(
///     19.99,
///     "EUR",
///     "https://shop.example/paypal/return",
///     "https://shop.example/paypal/cancel",
///     Some(PaymentAction::Sale),
/// )?;
/// println!("Location: {}", redirect.location);
/// # Ok(())
/// # }
/// ```
pub struct PayPalClient {
    config: PayPalConfig,
    proxy: Box<dyn Proxy>,
}

impl PayPalClient {
    /// Creates a client that talks to the API over the socket transport.
    pub fn new(config: PayPalConfig) -> Result<Self> {
        let proxy = SocketProxy::with_config(SocketProxyConfig::from(&config));
        Self::with_proxy(config, proxy)
    }

    /// Creates a client on top of a custom transport.
    ///
    /// The proxy is initialized with the configured server URI.
    pub fn with_proxy(config: PayPalConfig, proxy: impl Proxy + 'static) -> Result<Self> {
        config.validate()?;
        let mut client = Self {
            config,
            proxy: Box::new(proxy),
        };
        client.init_proxy();
        Ok(client)
    }

    /// Replaces the transport and initializes it with the server URI.
    pub fn set_proxy(&mut self, proxy: impl Proxy + 'static) {
        self.proxy = Box::new(proxy);
        self.init_proxy();
    }

    /// Switches between sandbox (`true`) and production (`false`).
    ///
    /// The transport is re-initialized with the new server URI.
    pub fn set_development_mode(&mut self, development: bool) {
        self.config = self.config.clone().with_development_mode(development);
        self.init_proxy();
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PayPalConfig {
        &self.config
    }

    /// NVP endpoint the transport is pointed at.
    pub fn server_uri(&self) -> &str {
        self.config.server_uri()
    }

    /// Checkout page prefix used for redirects.
    pub fn authorization_uri(&self) -> &str {
        self.config.authorization_uri()
    }

    fn init_proxy(&mut self) {
        let uri = self.config.server_uri().to_string();
        debug!(proxy = self.proxy.name(), server_uri = %uri, "initializing proxy");
        self.proxy.init(&uri);
    }

    /// Calls an NVP method.
    ///
    /// `METHOD`, `VERSION`, `PWD`, `USER` and `SIGNATURE` are sent first,
    /// followed by `parameters`. A parameter named like one of the fixed
    /// fields replaces its value.
    ///
    /// The response is returned as decoded; callers must check
    /// [`NvpResponse::is_success`] before relying on any other field.
    pub fn call<K, V>(&self, method: &str, parameters: &[(K, V)]) -> Result<NvpResponse>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query: Vec<(String, String)> = vec![
            ("METHOD".to_string(), method.to_string()),
            ("VERSION".to_string(), self.config.api_version.clone()),
            ("PWD".to_string(), self.config.password.clone()),
            ("USER".to_string(), self.config.username.clone()),
            ("SIGNATURE".to_string(), self.config.signature.clone()),
        ];
        for (key, value) in parameters {
            let (key, value) = (key.as_ref(), value.as_ref());
            match query.iter_mut().find(|(k, _)| k == key) {
                Some(existing) => existing.1 = value.to_string(),
                None => query.push((key.to_string(), value.to_string())),
            }
        }

        debug!(method, proxy = self.proxy.name(), "calling API");
        let body = self.proxy.send(nvp::encode(&query).as_bytes())?;
        Ok(nvp::decode(&body))
    }

    /// Opens an Express Checkout session.
    ///
    /// # Arguments
    ///
    /// * `amount` - Order total, sent with two decimals
    /// * `currency` - Three-letter currency code (e.g. `USD`)
    /// * `return_uri` - Where PayPal sends the user after approval
    /// * `cancel_uri` - Where PayPal sends the user on cancel
    /// * `action` - Payment action; `None` leaves it to the account default
    ///
    /// # Returns
    ///
    /// The token and the location the caller should redirect the user to
    pub fn start_payment(
        &self,
        amount: f64,
        currency: &str,
        return_uri: &str,
        cancel_uri: &str,
        action: Option<PaymentAction>,
    ) -> Result<CheckoutRedirect> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(PayPalError::InvalidArgument(format!(
                "amount must be positive, got {}",
                amount
            )));
        }
        if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(PayPalError::InvalidArgument(format!(
                "not a currency code: {:?}",
                currency
            )));
        }

        let mut parameters = vec![("AMT", format!("{:.2}", amount))];
        if let Some(action) = action {
            parameters.push(("PAYMENTACTION", action.as_str().to_string()));
        }
        parameters.push(("RETURNURL", return_uri.to_string()));
        parameters.push(("CANCELURL", cancel_uri.to_string()));
        parameters.push(("CURRENCYCODE", currency.to_ascii_uppercase()));

        let response = self.call(SET_EXPRESS_CHECKOUT, &parameters)?;
        ensure_ack(SET_EXPRESS_CHECKOUT, &response)?;

        let token = response
            .token()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PayPalError::Decode(format!("{} returned no TOKEN", SET_EXPRESS_CHECKOUT)))?
            .to_string();
        let location = format!("{}{}", self.authorization_uri(), token);
        debug!(%location, "checkout session opened");

        Ok(CheckoutRedirect { token, location })
    }

    /// Looks up the checkout session `token` came back with.
    ///
    /// `token` is the value PayPal appended to the return URI. The call
    /// succeeds only if PayPal acknowledges the session; the returned
    /// response holds the checkout details (payer, amounts, ...).
    pub fn validate_payment(&self, token: &str) -> Result<NvpResponse> {
        if token.is_empty() {
            return Err(PayPalError::MissingToken);
        }
        let response = self.call(GET_EXPRESS_CHECKOUT_DETAILS, &[("TOKEN", token)])?;
        ensure_ack(GET_EXPRESS_CHECKOUT_DETAILS, &response)?;
        Ok(response)
    }
}

fn ensure_ack(method: &str, response: &NvpResponse) -> Result<()> {
    let ack = response
        .get("ACK")
        .ok_or_else(|| PayPalError::Decode(format!("{} returned no ACK", method)))?;
    if response.is_success() {
        return Ok(());
    }

    let message = response
        .messages()
        .into_iter()
        .next()
        .map(|m| {
            if m.long_message.is_empty() {
                format!("{} {}", m.code, m.short_message)
            } else {
                format!("{} {}", m.code, m.long_message)
            }
        })
        .unwrap_or_else(|| "no error details".to_string());
    warn!(method, ack, correlation_id = response.correlation_id(), %message, "API call failed");

    Err(PayPalError::ApiFailure {
        method: method.to_string(),
        ack: ack.to_string(),
        message,
    })
}
