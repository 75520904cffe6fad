//! Midtrans Snap client.

use super::{
    GatewayError, GatewayFuture, GatewayResult, PaymentGateway, PaymentRequest, PaymentSession,
};
use crate::config::settings::GatewaySettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const SNAP_TRANSACTIONS_PATH: &str = "/snap/v1/transactions";
const MAX_ITEM_NAME_LEN: usize = 50;

#[derive(Serialize)]
struct SnapTransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

#[derive(Serialize)]
struct SnapItem<'a> {
    id: &'a str,
    name: String,
    price: i64,
    quantity: i32,
}

#[derive(Serialize)]
struct SnapRequest<'a> {
    transaction_details: SnapTransactionDetails<'a>,
    item_details: Vec<SnapItem<'a>>,
    custom_field1: &'a str,
}

#[derive(Deserialize)]
struct SnapResponse {
    token: String,
    redirect_url: String,
}

/// Snap API client with a bounded request timeout.
#[derive(Debug, Clone)]
pub struct SnapGateway {
    client: reqwest::Client,
    base_url: String,
    server_key: String,
}

impl SnapGateway {
    /// Builds a client from gateway settings and the merchant server key.
    ///
    /// # Errors
    /// Returns [`GatewayError::Transport`] if the HTTP client cannot be built.
    pub fn new(settings: &GatewaySettings, server_key: String) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            server_key,
        })
    }

    fn to_snap_request(request: &PaymentRequest) -> SnapRequest<'_> {
        let item_details: Vec<SnapItem<'_>> = request
            .items
            .iter()
            .map(|item| SnapItem {
                id: &item.id,
                name: item.name.chars().take(MAX_ITEM_NAME_LEN).collect(),
                price: rupiah(item.unit_price),
                quantity: item.quantity,
            })
            .collect();

        // Snap rejects a request whose gross amount differs from the item sum.
        let gross_amount = if item_details.is_empty() {
            rupiah(request.gross_amount)
        } else {
            item_details
                .iter()
                .map(|item| item.price * i64::from(item.quantity))
                .sum()
        };

        SnapRequest {
            transaction_details: SnapTransactionDetails {
                order_id: &request.order_id,
                gross_amount,
            },
            item_details,
            custom_field1: &request.customer_id,
        }
    }

    async fn send(&self, request: PaymentRequest) -> GatewayResult<PaymentSession> {
        let url = format!("{}{SNAP_TRANSACTIONS_PATH}", self.base_url);
        debug!(order_id = %request.order_id, %url, "Requesting Snap payment session");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.server_key, Some(""))
            .json(&Self::to_snap_request(&request))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(order_id = %request.order_id, status = status.as_u16(), "Snap rejected payment request");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let snap: SnapResponse = response.json().await.map_err(map_reqwest_error)?;
        Ok(PaymentSession {
            token: snap.token,
            redirect_url: snap.redirect_url,
        })
    }
}

impl PaymentGateway for SnapGateway {
    fn create_session(&self, request: PaymentRequest) -> GatewayFuture<'_, PaymentSession> {
        Box::pin(self.send(request))
    }
}

// Snap amounts are whole rupiah.
#[allow(clippy::cast_possible_truncation)]
fn rupiah(amount: f64) -> i64 {
    amount.round() as i64
}

fn map_reqwest_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::gateway::PaymentItem;

    fn sample_request() -> PaymentRequest {
        PaymentRequest {
            order_id: "trans-123".to_string(),
            gross_amount: 150_000.0,
            items: vec![PaymentItem {
                id: "tcat-1".to_string(),
                name: "A very long ticket category name that goes well past the fifty char limit"
                    .to_string(),
                unit_price: 75_000.0,
                quantity: 2,
            }],
            customer_id: "user-1".to_string(),
        }
    }

    #[test]
    fn test_snap_request_shape() {
        let request = sample_request();
        let body = serde_json::to_value(SnapGateway::to_snap_request(&request)).unwrap();

        assert_eq!(body["transaction_details"]["order_id"], "trans-123");
        assert_eq!(body["transaction_details"]["gross_amount"], 150_000);
        assert_eq!(body["item_details"][0]["price"], 75_000);
        assert_eq!(body["item_details"][0]["quantity"], 2);
        assert_eq!(
            body["item_details"][0]["name"].as_str().unwrap().chars().count(),
            MAX_ITEM_NAME_LEN
        );
        assert_eq!(body["custom_field1"], "user-1");
    }

    #[test]
    fn test_gross_amount_matches_rounded_items() {
        let request = PaymentRequest {
            order_id: "trans-456".to_string(),
            gross_amount: 201.0,
            items: vec![PaymentItem {
                id: "tcat-2".to_string(),
                name: "Half rupiah".to_string(),
                unit_price: 100.5,
                quantity: 2,
            }],
            customer_id: "user-1".to_string(),
        };
        let body = serde_json::to_value(SnapGateway::to_snap_request(&request)).unwrap();

        let item_price = body["item_details"][0]["price"].as_i64().unwrap();
        assert_eq!(item_price, 101);
        assert_eq!(body["transaction_details"]["gross_amount"], item_price * 2);
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let settings = GatewaySettings {
            base_url: "https://app.sandbox.midtrans.com/".to_string(),
            ..GatewaySettings::default()
        };
        let gateway = SnapGateway::new(&settings, "SB-Mid-server-key".to_string()).unwrap();
        assert_eq!(gateway.base_url, "https://app.sandbox.midtrans.com");
    }
}
