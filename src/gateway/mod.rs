//! Payment gateway adapter.
//!
//! The fulfillment engine only needs one thing from a gateway: a payment session
//! (token + redirect URL) keyed by the transaction id. Settlement arrives later and
//! asynchronously as a [`GatewayNotification`], handled by `core::settlement`.

mod notification;
mod recording;
mod snap;

pub use notification::GatewayNotification;
pub use recording::RecordingGateway;
pub use snap::SnapGateway;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Payment gateway result
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Boxed future returned by [`PaymentGateway`] methods
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = GatewayResult<T>> + Send + 'a>>;

/// Payment gateway error
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway did not answer within the configured timeout
    #[error("gateway timed out")]
    Timeout,
    /// The gateway answered with a non-success status
    #[error("gateway rejected request with status {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, verbatim
        body: String,
    },
    /// The request could not be sent or the response could not be read
    #[error("gateway transport error: {message}")]
    Transport {
        /// Underlying error message
        message: String,
    },
    /// The gateway is administratively unavailable
    #[error("gateway unavailable: {message}")]
    Unavailable {
        /// Reason
        message: String,
    },
}

/// One line item shown on the gateway's payment page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentItem {
    /// Ticket category id
    pub id: String,
    /// Ticket category name
    pub name: String,
    /// Price per ticket
    pub unit_price: f64,
    /// Tickets bought
    pub quantity: i32,
}

/// Request for a new payment session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Transaction id, used as the gateway order id and idempotency key
    pub order_id: String,
    /// Amount to charge
    pub gross_amount: f64,
    /// Line items
    pub items: Vec<PaymentItem>,
    /// Buyer's user id
    pub customer_id: String,
}

/// Payment session handed back to the buyer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Opaque session token (for embedded payment widgets)
    pub token: String,
    /// Hosted payment page
    pub redirect_url: String,
}

/// Payment gateway trait
///
/// Implementations must treat `order_id` as an idempotency key: asking twice for the
/// same order must not open two independent charges.
pub trait PaymentGateway: Send + Sync {
    /// Opens a payment session for an order.
    ///
    /// # Errors
    ///
    /// Returns error if the gateway is unreachable or refuses the order
    fn create_session(&self, request: PaymentRequest) -> GatewayFuture<'_, PaymentSession>;
}
