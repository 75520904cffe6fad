//! Asynchronous payment status notifications (webhooks).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

/// Payment status notification as posted by the gateway.
///
/// Only `order_id` and `transaction_status` drive reconciliation; the remaining
/// gateway fields are kept for signature checks and logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayNotification {
    /// Transaction id the notification is about
    pub order_id: String,
    /// Gateway status (`settlement`, `pending`, `deny`, `cancel`, `expire`, ...)
    pub transaction_status: String,
    /// Gateway HTTP-like status code, part of the signature input
    #[serde(default)]
    pub status_code: Option<String>,
    /// Charged amount as a decimal string, part of the signature input
    #[serde(default)]
    pub gross_amount: Option<String>,
    /// `sha512(order_id + status_code + gross_amount + server_key)` in hex
    #[serde(default)]
    pub signature_key: Option<String>,
    /// Fraud screening verdict, if any
    #[serde(default)]
    pub fraud_status: Option<String>,
    /// Payment channel used by the buyer
    #[serde(default)]
    pub payment_type: Option<String>,
    /// Any other gateway fields, preserved verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GatewayNotification {
    /// Parses a raw webhook body.
    ///
    /// # Errors
    /// Returns an error if the body is not a JSON object with string `order_id`
    /// and `transaction_status` fields.
    pub fn parse(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// Expected signature for this notification under `server_key`, or `None` if a
    /// signed field is missing.
    #[must_use]
    pub fn expected_signature(&self, server_key: &str) -> Option<String> {
        let status_code = self.status_code.as_deref()?;
        let gross_amount = self.gross_amount.as_deref()?;

        let mut hasher = Sha512::new();
        hasher.update(self.order_id.as_bytes());
        hasher.update(status_code.as_bytes());
        hasher.update(gross_amount.as_bytes());
        hasher.update(server_key.as_bytes());
        Some(hex::encode(hasher.finalize()))
    }

    /// Whether the carried `signature_key` matches `server_key`.
    #[must_use]
    pub fn verify_signature(&self, server_key: &str) -> bool {
        match (self.expected_signature(server_key), self.signature_key.as_deref()) {
            (Some(expected), Some(given)) => expected.eq_ignore_ascii_case(given),
            _ => false,
        }
    }
}
