use super::transaction::{Amount, Transaction, TransactionId, TransactionStatus};
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(http|https)://[^\s/$.?#].[^\s]*$").expect("URL pattern is a valid regex")
});

/// A webhook destination that has been checked to be an HTTP(S) URL.
///
/// The same string doubles as the transport channel name, so publisher and
/// subscriber meet on whatever URL the payment was made against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WebhookUrl(String);

impl WebhookUrl {
    pub fn parse(url: &str) -> Result<Self, PaymentError> {
        if URL_PATTERN.is_match(url) {
            Ok(Self(url.to_string()))
        } else {
            Err(PaymentError::InvalidUrl(url.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WebhookUrl {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WebhookUrl> for String {
    fn from(url: WebhookUrl) -> Self {
        url.0
    }
}

impl fmt::Display for WebhookUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct WebhookPayloadData {
    pub transaction_id: TransactionId,
    /// Human-readable timestamp set when the payload is published.
    pub created_at: String,
}

/// The wire-level message derived from a [`Transaction`] and sent to `url`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct WebhookPayload {
    pub id: TransactionId,
    pub status: TransactionStatus,
    pub url: WebhookUrl,
    pub amount: Amount,
    pub data: WebhookPayloadData,
}

impl WebhookPayload {
    pub fn from_transaction(tx: &Transaction, url: WebhookUrl, created_at: DateTime<Utc>) -> Self {
        Self {
            id: tx.id,
            status: tx.status,
            url,
            amount: tx.amount,
            data: WebhookPayloadData {
                transaction_id: tx.id,
                created_at: created_at.to_rfc2822(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_url_validation() {
        assert!(WebhookUrl::parse("https://hooks.example.com/pay").is_ok());
        assert!(WebhookUrl::parse("http://localhost:8080/hook?x=1").is_ok());

        for bad in [
            "",
            "hooks.example.com/pay",
            "ftp://hooks.example.com",
            "https://",
            "https:// spaced.example.com",
            "https://hooks.example.com/with space",
            "redis://localhost:6379",
        ] {
            assert!(
                matches!(WebhookUrl::parse(bad), Err(PaymentError::InvalidUrl(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_payload_from_transaction() {
        let tx = Transaction::new(Amount::new(dec!(100.0)).unwrap());
        let url = WebhookUrl::parse("https://hooks.example.com/pay").unwrap();
        let payload = WebhookPayload::from_transaction(&tx, url.clone(), Utc::now());

        assert_eq!(payload.id, tx.id);
        assert_eq!(payload.data.transaction_id, tx.id);
        assert_eq!(payload.status, TransactionStatus::Pending);
        assert_eq!(payload.amount, tx.amount);
        assert_eq!(payload.url, url);
        assert!(!payload.data.created_at.is_empty());
    }

    #[test]
    fn test_payload_wire_format() {
        let tx = Transaction::new(Amount::new(dec!(100.0)).unwrap());
        let url = WebhookUrl::parse("https://hooks.example.com/pay").unwrap();
        let payload = WebhookPayload::from_transaction(&tx, url, Utc::now());

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["id"], tx.id.to_string());
        assert_eq!(json["status"], "pending");
        assert_eq!(json["url"], "https://hooks.example.com/pay");
        assert_eq!(json["amount"], 100.0);
        assert_eq!(json["data"]["transaction_id"], tx.id.to_string());
        assert!(json["data"]["created_at"].is_string());
    }

    #[test]
    fn test_payload_with_invalid_url_is_rejected_on_decode() {
        let raw = r#"{
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "status": "pending",
            "url": "not-a-url",
            "amount": 1.0,
            "data": {
                "transaction_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
                "created_at": "Tue, 1 Jul 2003 10:52:37 +0200"
            }
        }"#;
        assert!(serde_json::from_str::<WebhookPayload>(raw).is_err());
    }

    #[test]
    fn test_payload_with_non_positive_amount_is_rejected_on_decode() {
        for amount in ["-5.0", "0"] {
            let raw = format!(
                r#"{{
                    "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
                    "status": "pending",
                    "url": "https://hooks.example.com/pay",
                    "amount": {amount},
                    "data": {{
                        "transaction_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
                        "created_at": "Tue, 1 Jul 2003 10:52:37 +0200"
                    }}
                }}"#
            );
            assert!(
                serde_json::from_str::<WebhookPayload>(&raw).is_err(),
                "amount {amount} should be rejected"
            );
        }
    }
}
