//! Redemption code rotation.
//!
//! Codes are refreshed lazily: reading a ticket whose code has expired swaps in a
//! fresh one. The swap is a compare-and-set on the old code, so two pollers racing
//! on the same expired ticket never clobber each other; the loser re-reads and
//! serves whatever the winner wrote.

use crate::{
    config::settings::Settings,
    core::identity::AuthIdentity,
    core::ids,
    entities::{Ticket, ticket},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{debug, info};

/// Code served to the ticket holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketCode {
    /// Current redemption code
    #[serde(rename = "ticket_code")]
    pub code: String,
    /// When this code stops being served; `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether this read replaced an expired code
    pub regenerated: bool,
    /// Human-readable note for the holder
    pub message: String,
}

const STILL_VALID: &str = "Ticket code is still valid";
const REGENERATED: &str = "Ticket code expired and was regenerated";

/// Returns the redemption code of one of the caller's tickets, rotating it first
/// if it has expired.
///
/// # Errors
/// Returns [`Error::NotFound`] when the caller owns no such ticket, or a database
/// error.
pub async fn get_ticket_code(
    db: &DatabaseConnection,
    settings: &Settings,
    owner: &AuthIdentity,
    ticket_id: &str,
) -> Result<TicketCode> {
    let ticket = Ticket::find_by_id(ticket_id.to_string())
        .filter(ticket::Column::OwnerId.eq(&owner.user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Ticket", ticket_id))?;

    let now = Utc::now();
    match ticket.expires_at {
        Some(expires_at) if expires_at <= now => {
            rotate(db, ticket, now, settings.ticket_code.window()).await
        }
        _ => Ok(TicketCode {
            code: ticket.code,
            expires_at: ticket.expires_at,
            regenerated: false,
            message: STILL_VALID.to_string(),
        }),
    }
}

async fn rotate(
    db: &DatabaseConnection,
    stale: ticket::Model,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<TicketCode> {
    let code = ids::ticket_code();
    let expires_at = now + window;

    let result = Ticket::update_many()
        .col_expr(ticket::Column::Code, Expr::value(code.clone()))
        .col_expr(ticket::Column::ExpiresAt, Expr::value(Some(expires_at)))
        .col_expr(ticket::Column::UpdatedAt, Expr::value(now))
        .filter(ticket::Column::Id.eq(&stale.id))
        .filter(ticket::Column::Code.eq(&stale.code))
        .exec(db)
        .await?;

    if result.rows_affected == 1 {
        info!(ticket_id = %stale.id, "Ticket code regenerated");
        return Ok(TicketCode {
            code,
            expires_at: Some(expires_at),
            regenerated: true,
            message: REGENERATED.to_string(),
        });
    }

    debug!(ticket_id = %stale.id, "Lost code rotation race, serving the winner's code");
    let fresh = Ticket::find_by_id(stale.id.clone())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Ticket", &stale.id))?;
    Ok(TicketCode {
        regenerated: fresh.code != stale.code,
        code: fresh.code,
        expires_at: fresh.expires_at,
        message: REGENERATED.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    async fn expire_code(db: &DatabaseConnection, ticket_id: &str) -> Result<()> {
        Ticket::update_many()
            .col_expr(
                ticket::Column::ExpiresAt,
                Expr::value(Some(Utc::now() - Duration::minutes(5))),
            )
            .filter(ticket::Column::Id.eq(ticket_id))
            .exec(db)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_valid_code_is_served_unchanged() -> Result<()> {
        let (db, ticket) = setup_with_paid_ticket().await?;

        let served =
            get_ticket_code(&db, &Settings::default(), &buyer_identity(), &ticket.id).await?;
        assert_eq!(served.code, ticket.code);
        assert!(!served.regenerated);
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_code_is_regenerated() -> Result<()> {
        let (db, ticket) = setup_with_paid_ticket().await?;
        expire_code(&db, &ticket.id).await?;

        let settings = Settings::default();
        let before = Utc::now();
        let served = get_ticket_code(&db, &settings, &buyer_identity(), &ticket.id).await?;

        assert!(served.regenerated);
        assert_ne!(served.code, ticket.code);
        assert!(served.code.starts_with("tix"));
        assert!(served.expires_at.unwrap() >= before + settings.ticket_code.window());

        let stored = Ticket::find_by_id(ticket.id.clone()).one(&db).await?.unwrap();
        assert_eq!(stored.code, served.code);

        // The fresh code is served as-is on the next read.
        let again = get_ticket_code(&db, &settings, &buyer_identity(), &ticket.id).await?;
        assert_eq!(again.code, served.code);
        assert!(!again.regenerated);
        Ok(())
    }

    #[tokio::test]
    async fn test_losing_rotation_race_serves_winner() -> Result<()> {
        let (db, ticket) = setup_with_paid_ticket().await?;
        expire_code(&db, &ticket.id).await?;
        let stale = Ticket::find_by_id(ticket.id.clone()).one(&db).await?.unwrap();

        let winner = rotate(&db, stale.clone(), Utc::now(), Duration::minutes(3)).await?;
        let loser = rotate(&db, stale, Utc::now(), Duration::minutes(3)).await?;

        assert_eq!(winner.code, loser.code);
        assert!(loser.regenerated);
        Ok(())
    }

    #[tokio::test]
    async fn test_code_is_owner_scoped() -> Result<()> {
        let (db, ticket) = setup_with_paid_ticket().await?;

        let result =
            get_ticket_code(&db, &Settings::default(), &other_buyer_identity(), &ticket.id).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }
}
