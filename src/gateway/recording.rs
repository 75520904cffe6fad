//! In-memory gateway that records every request.
//!
//! Sessions are keyed by order id, so repeated requests for the same order return
//! the same session. It can be switched into a failing mode to exercise the
//! "committed but no payment link" path of checkout.

use super::{GatewayError, GatewayFuture, PaymentGateway, PaymentRequest, PaymentSession};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};

/// Gateway double that never leaves the process.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    requests: Mutex<Vec<PaymentRequest>>,
    sessions: Mutex<HashMap<String, PaymentSession>>,
    failing: AtomicBool,
}

impl RecordingGateway {
    /// Creates a gateway that accepts every request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent requests fail (`true`) or succeed (`false`).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All requests received so far, including failed ones.
    #[must_use]
    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Number of distinct sessions opened.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or_default()
    }

    fn open(&self, request: PaymentRequest) -> Result<PaymentSession, GatewayError> {
        self.requests.lock().map_err(poisoned)?.push(request.clone());

        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable {
                message: "gateway switched off".to_string(),
            });
        }

        let mut sessions = self.sessions.lock().map_err(poisoned)?;
        let session = sessions
            .entry(request.order_id)
            .or_insert_with(|| {
                let token = uuid::Uuid::new_v4().to_string();
                PaymentSession {
                    redirect_url: format!("https://pay.example.test/snap/{token}"),
                    token,
                }
            })
            .clone();
        Ok(session)
    }
}

fn poisoned<T>(_: PoisonError<T>) -> GatewayError {
    GatewayError::Unavailable {
        message: "recording gateway lock poisoned".to_string(),
    }
}

impl PaymentGateway for RecordingGateway {
    fn create_session(&self, request: PaymentRequest) -> GatewayFuture<'_, PaymentSession> {
        let result = self.open(request);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn request(order_id: &str) -> PaymentRequest {
        PaymentRequest {
            order_id: order_id.to_string(),
            gross_amount: 100.0,
            items: Vec::new(),
            customer_id: "user-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_same_order_returns_same_session() {
        let gateway = RecordingGateway::new();
        let first = gateway.create_session(request("trans-1")).await.unwrap();
        let second = gateway.create_session(request("trans-1")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(gateway.session_count(), 1);
        assert_eq!(gateway.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_mode() {
        let gateway = RecordingGateway::new();
        gateway.set_failing(true);
        let result = gateway.create_session(request("trans-1")).await;
        assert!(matches!(result, Err(GatewayError::Unavailable { .. })));
        assert_eq!(gateway.session_count(), 0);

        gateway.set_failing(false);
        assert!(gateway.create_session(request("trans-1")).await.is_ok());
    }
}
