use crate::core::checkin::CheckInRejection;
use crate::entities::{TransactionStatus, ticket};
use crate::gateway::GatewayError;
use thiserror::Error;

/// Broad failure class, used by callers to pick a response and a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input; never retried.
    Validation,
    /// Request conflicts with current state; retry only after the state changes.
    Conflict,
    /// Referenced entity does not exist (or is not visible to the caller).
    NotFound,
    /// Caller is authenticated but not allowed to perform the operation.
    Forbidden,
    /// Infrastructure failure; local state is untouched and the caller may retry.
    Transient,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: f64 },

    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i32 },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Cart is empty")]
    EmptyCart,

    #[error(
        "Not enough quota for ticket category '{category}': requested {requested}, available {available}"
    )]
    QuotaExceeded {
        category: String,
        requested: i32,
        available: i32,
    },

    #[error("Ticket category '{category}' is not on sale")]
    SalesWindowClosed { category: String },

    #[error("Transaction {transaction_id} is already {}", .status.as_str())]
    TransactionClosed {
        transaction_id: String,
        status: TransactionStatus,
    },

    #[error("Unknown transaction status: {status}")]
    UnknownTransactionStatus { status: String },

    #[error("Transaction not found: {order_id}")]
    TransactionNotFound { order_id: String },

    #[error("Invalid notification signature for order {order_id}")]
    InvalidSignature { order_id: String },

    #[error("Check-in rejected: {}", .reason.as_str())]
    CheckInRejected {
        reason: CheckInRejection,
        ticket: Box<ticket::Model>,
    },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] on the given entity name.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Which taxonomy class this error belongs to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. }
            | Self::InvalidAmount { .. }
            | Self::InvalidQuantity { .. }
            | Self::EmptyCart
            | Self::UnknownTransactionStatus { .. }
            | Self::InvalidSignature { .. }
            | Self::Json(_) => ErrorKind::Validation,
            Self::QuotaExceeded { .. }
            | Self::SalesWindowClosed { .. }
            | Self::TransactionClosed { .. }
            | Self::CheckInRejected { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } | Self::TransactionNotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Config { .. } | Self::Database(_) | Self::Gateway(_) | Self::Io(_) => {
                ErrorKind::Transient
            }
        }
    }

    /// Machine-stable reason tag for structured error payloads.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config_error",
            Self::Validation { .. } => "validation_error",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::NotFound { .. } => "not_found",
            Self::Forbidden { .. } => "forbidden",
            Self::EmptyCart => "empty_cart",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::SalesWindowClosed { .. } => "sales_window_closed",
            Self::TransactionClosed { .. } => "transaction_closed",
            Self::UnknownTransactionStatus { .. } => "unknown_transaction_status",
            Self::TransactionNotFound { .. } => "transaction_not_found",
            Self::InvalidSignature { .. } => "invalid_signature",
            Self::CheckInRejected { reason, .. } => reason.as_str(),
            Self::Database(_) => "database_error",
            Self::Gateway(_) => "gateway_error",
            Self::Json(_) => "invalid_payload",
            Self::Io(_) => "io_error",
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_is_conflict() {
        let err = Error::QuotaExceeded {
            category: "VIP".to_string(),
            requested: 3,
            available: 2,
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.reason(), "quota_exceeded");
        assert_eq!(
            err.to_string(),
            "Not enough quota for ticket category 'VIP': requested 3, available 2"
        );
    }

    #[test]
    fn test_transaction_not_found_is_not_found() {
        let err = Error::TransactionNotFound {
            order_id: "trans-missing".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.reason(), "transaction_not_found");
    }

    #[test]
    fn test_database_errors_are_transient() {
        let err = Error::from(sea_orm::DbErr::Custom("connection reset".to_string()));
        assert_eq!(err.kind(), ErrorKind::Transient);
    }
}
