//! Check-in business logic - Gates a ticket from `active` to `used` exactly once.
//!
//! Codes are looked up together with the event they are presented at, so a code
//! issued for one event never resolves at another. A successful check-in flips the
//! ticket and bumps both attendance counters in one database transaction.

use crate::{
    core::event::{get_event, record_attendance},
    core::identity::AuthIdentity,
    entities::{Ticket, TicketStatus, ticket},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Why a ticket was turned away at the door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInRejection {
    /// Already checked in
    AlreadyUsed,
    /// The event has not started yet
    NotStarted,
    /// The event is over
    Expired,
    /// Pending payment or payment failed
    #[serde(rename = "inactive")]
    NotActive,
    /// Withdrawn by the organizer or an admin
    Cancelled,
}

impl CheckInRejection {
    /// Status tag reported to the scanner.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyUsed => "already_used",
            Self::NotStarted => "not_started",
            Self::Expired => "expired",
            Self::NotActive => "inactive",
            Self::Cancelled => "cancelled",
        }
    }

    const fn for_status(status: TicketStatus) -> Option<Self> {
        match status {
            TicketStatus::Active => None,
            TicketStatus::Used => Some(Self::AlreadyUsed),
            TicketStatus::Cancelled => Some(Self::Cancelled),
            TicketStatus::Pending | TicketStatus::PaymentFailed => Some(Self::NotActive),
        }
    }
}

/// Summary of an admitted ticket.
#[derive(Debug, Clone, Serialize)]
pub struct CheckInReceipt {
    /// The ticket, now `used`
    pub ticket: ticket::Model,
    /// Event admitted to
    pub event_id: String,
    /// Category the ticket was sold under
    pub category_id: String,
}

fn rejected(reason: CheckInRejection, ticket: ticket::Model) -> Error {
    warn!(ticket_id = %ticket.id, reason = reason.as_str(), "Check-in rejected");
    Error::CheckInRejected {
        reason,
        ticket: Box::new(ticket),
    }
}

/// Checks in the ticket carrying `code` at `event_id`.
///
/// # Errors
/// Returns an error if:
/// - The event does not exist, or no ticket for it carries `code` ([`Error::NotFound`])
/// - The staff member neither owns the event nor is an admin ([`Error::Forbidden`])
/// - The event has not started or is over, or the ticket is not `active`
///   ([`Error::CheckInRejected`], carrying the ticket snapshot)
/// - A database operation fails; the ticket stays `active` and no counter moves
#[instrument(skip(db, code), fields(staff = %staff.user_id))]
pub async fn check_in(
    db: &DatabaseConnection,
    staff: &AuthIdentity,
    event_id: &str,
    code: &str,
) -> Result<CheckInReceipt> {
    let event = get_event(db, event_id)
        .await?
        .ok_or_else(|| Error::not_found("Event", event_id))?;
    staff.require_owner_or_admin(&event.owner_id)?;

    let ticket = Ticket::find()
        .filter(ticket::Column::Code.eq(code))
        .filter(ticket::Column::EventId.eq(&event.id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Ticket", code))?;

    let now = Utc::now();
    if now < event.date_start {
        return Err(rejected(CheckInRejection::NotStarted, ticket));
    }
    if now > event.date_end {
        return Err(rejected(CheckInRejection::Expired, ticket));
    }
    if let Some(reason) = CheckInRejection::for_status(ticket.status) {
        return Err(rejected(reason, ticket));
    }

    let txn = db.begin().await?;

    let result = Ticket::update_many()
        .col_expr(ticket::Column::Status, Expr::value(TicketStatus::Used))
        .col_expr(ticket::Column::UpdatedAt, Expr::value(now))
        .filter(ticket::Column::Id.eq(&ticket.id))
        .filter(ticket::Column::Status.eq(TicketStatus::Active))
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        // Another scanner got there first.
        let current = Ticket::find_by_id(ticket.id.clone())
            .one(&txn)
            .await?
            .unwrap_or(ticket);
        return Err(rejected(CheckInRejection::AlreadyUsed, current));
    }

    record_attendance(&txn, &ticket.ticket_category_id, &event.id).await?;
    txn.commit().await?;

    info!(ticket_id = %ticket.id, event_id = %event.id, "Ticket checked in");

    let category_id = ticket.ticket_category_id.clone();
    let ticket = ticket::Model {
        status: TicketStatus::Used,
        updated_at: now,
        ..ticket
    };
    Ok(CheckInReceipt {
        ticket,
        event_id: event.id,
        category_id,
    })
}
