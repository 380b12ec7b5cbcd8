//! Example Express Checkout flow against the PayPal sandbox.
//!
//! Run with:
//! ```bash
//! cargo run --example checkout
//! ```
//!
//! Environment variables:
//! - PAYPAL_USER, PAYPAL_PWD, PAYPAL_SIGNATURE: sandbox API credentials
//! - PAYPAL_TOKEN: a token returned on the return URI; when set, the example
//!   validates it instead of opening a new checkout

use paypal_nvp::client::{PayPalClient, PaymentAction};
use paypal_nvp::config::PayPalConfig;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let username = std::env::var("PAYPAL_USER").unwrap_or_else(|_| {
        println!("No PAYPAL_USER set, using placeholder credentials (calls will be rejected)");
        "seller_api1.example.com".to_string()
    });
    let password = std::env::var("PAYPAL_PWD").unwrap_or_else(|_| "API_PASSWORD".to_string());
    let signature = std::env::var("PAYPAL_SIGNATURE")
        .unwrap_or_else(|_| "API_SIGNATURE".to_string());

    let config = PayPalConfig::new(username, password, signature).with_development_mode(true);
    println!("NVP endpoint: {}", config.server_uri());
    let client = PayPalClient::new(config)?;

    if let Ok(token) = std::env::var("PAYPAL_TOKEN") {
        println!("Validating token {}...", token);
        let details = client.validate_payment(&token)?;
        for (name, value) in details.iter() {
            println!("  {} = {}", name, value);
        }
        return Ok(());
    }

    println!("Opening checkout session...");
    match client.start_payment(
        9.99,
        "USD",
        "https://shop.example/paypal/return",
        "https://shop.example/paypal/cancel",
        Some(PaymentAction::Sale),
    ) {
        Ok(redirect) => {
            println!("Token: {}", redirect.token);
            println!("Send the buyer to: {}", redirect.location);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
