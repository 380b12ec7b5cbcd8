//! Name-value pair encoding used by the PayPal API.
//!
//! Requests and responses are both `application/x-www-form-urlencoded`
//! strings. This module turns parameter lists into request bodies and
//! response bodies into an [`NvpResponse`].

use std::borrow::Borrow;
use std::collections::HashMap;
use url::form_urlencoded;

/// Encodes parameters as a form body, keeping their order.
///
/// # Examples
///
/// ```
/// use paypal_nvp::nvp::encode;
///
/// let body = encode([("METHOD", "SetExpressCheckout"), ("RETURNURL", "https://shop.example/ok?a=1")]);
/// assert_eq!(body, "METHOD=SetExpressCheckout&RETURNURL=https%3A%2F%2Fshop.example%2Fok%3Fa%3D1");
/// ```
pub fn encode<I, K, V>(pairs: I) -> String
where
    I: IntoIterator,
    I::Item: Borrow<(K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Decodes a form body. Later duplicates replace earlier ones.
///
/// # Examples
///
/// ```
/// use paypal_nvp::nvp::decode;
///
/// let response = decode(b"ACK=Success&TOKEN=EC%2d8Y2&TIMESTAMP=2026%2d10%2d14T10%3a00%3a00Z");
/// assert!(response.is_success());
/// assert_eq!(response.token(), Some("EC-8Y2"));
/// ```
pub fn decode(raw: &[u8]) -> NvpResponse {
    let fields = form_urlencoded::parse(raw)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    NvpResponse { fields }
}

/// Value of the `ACK` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// `Success`
    Success,
    /// `SuccessWithWarning`
    SuccessWithWarning,
    /// `Failure`
    Failure,
    /// `FailureWithWarning`
    FailureWithWarning,
    /// Anything else, kept verbatim
    Other(String),
}

impl Ack {
    fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "SUCCESS" => Ack::Success,
            "SUCCESSWITHWARNING" => Ack::SuccessWithWarning,
            "FAILURE" => Ack::Failure,
            "FAILUREWITHWARNING" => Ack::FailureWithWarning,
            _ => Ack::Other(value.to_string()),
        }
    }

    /// `true` for `Success` and `SuccessWithWarning`.
    pub fn is_success(&self) -> bool {
        matches!(self, Ack::Success | Ack::SuccessWithWarning)
    }
}

/// One entry of the `L_*n` error/warning lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiMessage {
    /// `L_ERRORCODEn`
    pub code: String,
    /// `L_SHORTMESSAGEn`
    pub short_message: String,
    /// `L_LONGMESSAGEn`
    pub long_message: String,
    /// `L_SEVERITYCODEn`
    pub severity: String,
}

/// A decoded API response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NvpResponse {
    fields: HashMap<String, String>,
}

impl NvpResponse {
    /// Returns a field by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Parsed `ACK` field, if present.
    pub fn ack(&self) -> Option<Ack> {
        self.get("ACK").map(Ack::parse)
    }

    /// Whether `ACK` reports success. A missing `ACK` is not a success.
    pub fn is_success(&self) -> bool {
        self.ack().map_or(false, |ack| ack.is_success())
    }

    /// `TOKEN` field.
    pub fn token(&self) -> Option<&str> {
        self.get("TOKEN")
    }

    /// `CORRELATIONID` field, used by PayPal support to trace a call.
    pub fn correlation_id(&self) -> Option<&str> {
        self.get("CORRELATIONID")
    }

    /// Errors and warnings reported in the `L_*0`, `L_*1`, ... fields.
    pub fn messages(&self) -> Vec<ApiMessage> {
        let field = |prefix: &str, n: usize| {
            self.get(&format!("{}{}", prefix, n))
                .unwrap_or_default()
                .to_string()
        };

        (0..)
            .take_while(|n| {
                self.fields.contains_key(&format!("L_ERRORCODE{}", n))
                    || self.fields.contains_key(&format!("L_SHORTMESSAGE{}", n))
            })
            .map(|n| ApiMessage {
                code: field("L_ERRORCODE", n),
                short_message: field("L_SHORTMESSAGE", n),
                long_message: field("L_LONGMESSAGE", n),
                severity: field("L_SEVERITYCODE", n),
            })
            .collect()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` if the body held no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over all fields in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Consumes the response and returns the field map.
    pub fn into_map(self) -> HashMap<String, String> {
        self.fields
    }
}

impl From<HashMap<String, String>> for NvpResponse {
    fn from(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_escapes_reserved_characters() {
        let body = encode([("AMT", "10.00"), ("DESC", "Two books & a pen"), ("EMPTY", "")]);
        assert_eq!(body, "AMT=10.00&DESC=Two+books+%26+a+pen&EMPTY=");
    }

    #[test]
    fn test_round_trip() {
        let mut original = HashMap::new();
        original.insert("METHOD".to_string(), "SetExpressCheckout".to_string());
        original.insert("RETURNURL".to_string(), "https://shop.example/return?order=42&x=y".to_string());
        original.insert("NOTE".to_string(), "100% sicher, grüße".to_string());
        original.insert("PWD".to_string(), "p@ss=word+1".to_string());

        let decoded = decode(encode(&original).as_bytes());
        assert_eq!(decoded.into_map(), original);
    }

    #[test]
    fn test_decode_last_duplicate_wins() {
        let response = decode(b"A=1&B=2&A=3");
        assert_eq!(response.get("A"), Some("3"));
        assert_eq!(response.len(), 2);
    }

    #[test]
    fn test_ack_variants() {
        assert_eq!(decode(b"ACK=success").ack(), Some(Ack::Success));
        assert!(decode(b"ACK=SuccessWithWarning").is_success());
        assert!(!decode(b"ACK=Failure").is_success());
        assert_eq!(
            decode(b"ACK=PartialSuccess").ack(),
            Some(Ack::Other("PartialSuccess".to_string()))
        );
        assert!(!decode(b"TOKEN=x").is_success());
        assert!(decode(b"").is_empty());
    }

    #[test]
    fn test_messages() {
        let response = decode(
            b"ACK=Failure&L_ERRORCODE0=10002&L_SHORTMESSAGE0=Security%20error\
              &L_LONGMESSAGE0=Security%20header%20is%20not%20valid&L_SEVERITYCODE0=Error\
              &L_ERRORCODE1=10004&L_SHORTMESSAGE1=Transaction%20refused&CORRELATIONID=abc",
        );

        let messages = response.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].code, "10002");
        assert_eq!(messages[0].short_message, "Security error");
        assert_eq!(messages[0].long_message, "Security header is not valid");
        assert_eq!(messages[0].severity, "Error");
        assert_eq!(messages[1].code, "10004");
        assert_eq!(messages[1].long_message, "");
        assert_eq!(response.correlation_id(), Some("abc"));
    }
}
