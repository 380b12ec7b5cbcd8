//! # paypal-nvp
//!
//! A synchronous client for the PayPal NVP (name-value pair) API, built on a
//! small hand-rolled HTTP/1.1 transport.
//!
//! ## Features
//!
//! - **Express Checkout**: open a checkout session and get the redirect location,
//!   then validate the token the buyer returns with
//! - **Raw socket transport**: HTTP/1.1 over plain TCP or TLS (rustls), one
//!   connection per call, with connect/read/write timeouts and a response size limit
//! - **Pluggable transports**: anything implementing [`proxy::Proxy`] can carry the
//!   calls; a `reqwest`-based transport and a scripted mock are included
//! - **Proper status handling**: the status line is parsed, only 2xx counts as success
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paypal_nvp::{PayPalClient, PayPalConfig};
//! use paypal_nvp::client::PaymentAction;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PayPalConfig::new("seller_api1.example.com", "API_PASSWORD", "API_SIGNATURE")
//!     .with_development_mode(true);
//! let client = PayPalClient::new(config)?;
//!
//! // 1. Open the session and send the buyer to PayPal.
//! let redirect = client.start_payment(
//!     25.00,
//!     "USD",
//!     "https://shop.example/paypal/return",
//!     "https://shop.example/paypal/cancel",
//!     Some(PaymentAction::Sale),
//! )?;
//! println!("302 Found, Location: {}", redirect.location);
//!
//! // 2. Later, on the return URI, validate the token PayPal appended.
//! let details = client.validate_payment(&redirect.token)?;
//! println!("payer: {:?}", details.get("PAYERID"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Protocol Overview
//!
//! Every call is a `POST` of an `application/x-www-form-urlencoded` body to the
//! NVP endpoint. The body carries `METHOD`, `VERSION`, `USER`, `PWD` and
//! `SIGNATURE` plus the method's own fields; the answer is a form-encoded body
//! whose `ACK` field tells whether the call succeeded.
//!
//! ## References
//!
//! - [NVP API overview](https://developer.paypal.com/api/nvp-soap/NVPAPIOverview/)
//! - [Express Checkout](https://developer.paypal.com/api/nvp-soap/set-express-checkout-nvp/)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod config;
pub mod errors;
pub mod http;
pub mod nvp;
pub mod proxy;

// Re-export commonly used items
pub use client::{CheckoutRedirect, PayPalClient, PaymentAction};
pub use config::{Environment, PayPalConfig, API_VERSION, USER_AGENT};
pub use errors::{PayPalError, Result};
pub use nvp::NvpResponse;
pub use proxy::Proxy;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert_eq!(API_VERSION, "53.0");
    }

    #[test]
    fn test_module_accessibility() {
        let _ = http::RequestBuilder::new();
        let _ = proxy::socket::SocketProxy::new();
        let _ = proxy::mock::MockProxy::new();
        let _ = PayPalClient::new(PayPalConfig::new("user", "pwd", "sig")).unwrap();
    }
}
