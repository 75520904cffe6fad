//! Settlement reconciliation - Applies gateway payment notifications to
//! transactions, tickets and the inventory ledger.
//!
//! Every transition is `pending → X` and guarded in SQL on `status = 'pending'`.
//! When the guard matches nothing the notification was already applied (or the
//! order is unknown), so gateway retries are harmless. All writes for one
//! notification commit together or not at all.

use crate::{
    config::settings::Settings,
    core::event::{get_ticket_category, record_event_sale, record_sale},
    core::fulfillment::transaction_details,
    entities::{Ticket, TicketStatus, Transaction, TransactionStatus, ticket, transaction},
    errors::{Error, Result},
    gateway::GatewayNotification,
};
use chrono::Utc;
use sea_orm::{DatabaseTransaction, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

/// Gateway statuses this reconciler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    /// Funds captured
    Settlement,
    /// Denied or cancelled
    Failed,
    /// Payment window lapsed
    Expired,
    /// Still waiting on the buyer
    Pending,
}

impl NotificationStatus {
    /// Maps a raw gateway status.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTransactionStatus`] for anything unrecognised.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "settlement" => Ok(Self::Settlement),
            "deny" | "cancel" => Ok(Self::Failed),
            "expire" => Ok(Self::Expired),
            "pending" => Ok(Self::Pending),
            other => Err(Error::UnknownTransactionStatus {
                status: other.to_string(),
            }),
        }
    }

    /// Transaction state this status moves a pending transaction to.
    #[must_use]
    pub const fn target(self) -> Option<TransactionStatus> {
        match self {
            Self::Settlement => Some(TransactionStatus::Paid),
            Self::Failed => Some(TransactionStatus::Failed),
            Self::Expired => Some(TransactionStatus::Expired),
            Self::Pending => None,
        }
    }
}

/// Acknowledgement returned to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementAck {
    /// Order the notification was about
    #[serde(rename = "orderID")]
    pub order_id: String,
    /// Transaction status after processing
    pub status: TransactionStatus,
}

/// Parses, authenticates and applies a raw webhook body.
///
/// The signature is checked only when verification is enabled and a server key
/// is configured.
///
/// # Errors
/// Returns an error if:
/// - The body is not a valid notification ([`Error::Json`])
/// - The signature does not match ([`Error::InvalidSignature`])
/// - Applying the notification fails (see [`apply_notification`])
pub async fn handle_notification(
    db: &DatabaseConnection,
    settings: &Settings,
    body: &[u8],
) -> Result<SettlementAck> {
    let notification = GatewayNotification::parse(body)?;

    if let Some(server_key) = settings.gateway.verification_key() {
        if !notification.verify_signature(server_key) {
            warn!(order_id = %notification.order_id, "Rejected notification with bad signature");
            return Err(Error::InvalidSignature {
                order_id: notification.order_id,
            });
        }
    }

    apply_notification(db, &notification).await
}

/// Applies an already authenticated notification.
///
/// Replays of a notification whose transaction has already left `pending` are
/// acknowledged with the transaction's current status and change nothing.
///
/// # Errors
/// Returns an error if:
/// - The status is not recognised ([`Error::UnknownTransactionStatus`])
/// - No transaction has the notification's order id ([`Error::TransactionNotFound`])
/// - Confirming the sale would push a category past its quota
///   ([`Error::QuotaExceeded`]); the whole notification is rolled back
/// - A database operation fails; the whole notification is rolled back
#[instrument(skip(db, notification), fields(order_id = %notification.order_id, status = %notification.transaction_status))]
pub async fn apply_notification(
    db: &DatabaseConnection,
    notification: &GatewayNotification,
) -> Result<SettlementAck> {
    let order_id = notification.order_id.as_str();
    let status = NotificationStatus::parse(&notification.transaction_status)?;

    let Some(target) = status.target() else {
        let current = current_status(db, order_id).await?;
        info!(current = current.as_str(), "Payment still pending, nothing to apply");
        return Ok(SettlementAck {
            order_id: order_id.to_string(),
            status: current,
        });
    };

    let txn = db.begin().await?;

    let mut update = Transaction::update_many()
        .col_expr(transaction::Column::Status, Expr::value(target))
        .filter(transaction::Column::Id.eq(order_id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Pending));
    if target == TransactionStatus::Paid {
        update = update.col_expr(transaction::Column::SettledAt, Expr::value(Some(Utc::now())));
    }
    let result = update.exec(&txn).await?;

    if result.rows_affected == 0 {
        let current = current_status(&txn, order_id).await?;
        info!(
            outcome = "already_processed",
            current = current.as_str(),
            "Notification replay ignored"
        );
        return Ok(SettlementAck {
            order_id: order_id.to_string(),
            status: current,
        });
    }

    let applied = match target {
        TransactionStatus::Paid => confirm_sale(&txn, order_id).await,
        _ => fail_tickets(&txn, order_id).await,
    };
    if let Err(e) = applied {
        if matches!(e, Error::QuotaExceeded { .. }) {
            // Paid at the gateway but cannot be booked; stays pending until an operator acts.
            error!(
                order_id,
                gross_amount = notification.gross_amount.as_deref().unwrap_or("unknown"),
                error = %e,
                "Settled payment exceeds quota, order left pending"
            );
        } else {
            warn!(error = %e, "Notification rolled back");
        }
        return Err(e);
    }

    txn.commit().await?;
    info!(outcome = "applied", new_status = target.as_str(), "Notification applied");

    Ok(SettlementAck {
        order_id: order_id.to_string(),
        status: target,
    })
}

async fn current_status<C>(db: &C, order_id: &str) -> Result<TransactionStatus>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(order_id.to_string())
        .one(db)
        .await?
        .map(|t| t.status)
        .ok_or_else(|| Error::TransactionNotFound {
            order_id: order_id.to_string(),
        })
}

/// Books each detail line into the ledger and activates its tickets.
async fn confirm_sale(txn: &DatabaseTransaction, order_id: &str) -> Result<()> {
    let now = Utc::now();
    for detail in transaction_details(txn, order_id).await? {
        let category = get_ticket_category(txn, &detail.ticket_category_id)
            .await?
            .ok_or_else(|| Error::not_found("TicketCategory", &detail.ticket_category_id))?;

        record_sale(txn, &category.id, detail.quantity).await?;
        record_event_sale(txn, &category.event_id, detail.quantity, detail.subtotal).await?;

        let activated = Ticket::update_many()
            .col_expr(ticket::Column::Status, Expr::value(TicketStatus::Active))
            .col_expr(ticket::Column::UpdatedAt, Expr::value(now))
            .filter(ticket::Column::TransactionId.eq(order_id))
            .filter(ticket::Column::TicketCategoryId.eq(&detail.ticket_category_id))
            .filter(ticket::Column::OwnerId.eq(&detail.owner_id))
            .filter(ticket::Column::Status.eq(TicketStatus::Pending))
            .exec(txn)
            .await?;

        if activated.rows_affected != u64::try_from(detail.quantity).unwrap_or_default() {
            warn!(
                detail_id = %detail.id,
                expected = detail.quantity,
                activated = activated.rows_affected,
                "Activated ticket count differs from detail quantity"
            );
        }
    }
    Ok(())
}

/// Marks every still-pending ticket of the transaction as failed.
async fn fail_tickets(txn: &DatabaseTransaction, order_id: &str) -> Result<()> {
    let failed = Ticket::update_many()
        .col_expr(ticket::Column::Status, Expr::value(TicketStatus::PaymentFailed))
        .col_expr(ticket::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(ticket::Column::TransactionId.eq(order_id))
        .filter(ticket::Column::Status.eq(TicketStatus::Pending))
        .exec(txn)
        .await?;
    info!(tickets = failed.rows_affected, "Tickets marked payment_failed");
    Ok(())
}
