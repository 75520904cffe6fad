//! Ticket queries for the ticket holder.

use crate::{
    core::identity::AuthIdentity,
    entities::{Ticket, ticket},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};

/// Label given to freshly issued tickets.
pub(crate) const DEFAULT_TAG: &str = "My Ticket";

const MAX_TAG_LEN: usize = 100;

/// Lists the caller's tickets, newest first.
pub async fn list_tickets(
    db: &DatabaseConnection,
    owner: &AuthIdentity,
) -> Result<Vec<ticket::Model>> {
    Ticket::find()
        .filter(ticket::Column::OwnerId.eq(&owner.user_id))
        .order_by_desc(ticket::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Returns one of the caller's tickets.
///
/// # Errors
/// Returns [`Error::NotFound`] when the caller owns no such ticket.
pub async fn get_ticket(
    db: &DatabaseConnection,
    owner: &AuthIdentity,
    ticket_id: &str,
) -> Result<ticket::Model> {
    Ticket::find_by_id(ticket_id.to_string())
        .filter(ticket::Column::OwnerId.eq(&owner.user_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Ticket", ticket_id))
}

/// Relabels one of the caller's tickets.
///
/// # Errors
/// Returns an error if the tag is empty or longer than 100 characters, or the
/// caller owns no such ticket.
pub async fn set_ticket_tag(
    db: &DatabaseConnection,
    owner: &AuthIdentity,
    ticket_id: &str,
    tag: &str,
) -> Result<ticket::Model> {
    let tag = tag.trim();
    if tag.is_empty() || tag.chars().count() > MAX_TAG_LEN {
        return Err(Error::Validation {
            message: format!("Ticket tag must be 1 to {MAX_TAG_LEN} characters"),
        });
    }

    let ticket = get_ticket(db, owner, ticket_id).await?;
    let mut active_model: ticket::ActiveModel = ticket.into();
    active_model.tag = Set(tag.to_string());
    active_model.updated_at = Set(Utc::now());
    active_model.update(db).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_list_tickets_is_owner_scoped() -> Result<()> {
        let (db, ticket) = setup_with_paid_ticket().await?;

        let mine = list_tickets(&db, &buyer_identity()).await?;
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, ticket.id);
        assert_eq!(mine[0].tag, DEFAULT_TAG);

        assert!(list_tickets(&db, &other_buyer_identity()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_set_ticket_tag() -> Result<()> {
        let (db, ticket) = setup_with_paid_ticket().await?;
        let buyer = buyer_identity();

        let renamed = set_ticket_tag(&db, &buyer, &ticket.id, "  Front row  ").await?;
        assert_eq!(renamed.tag, "Front row");
        assert_eq!(renamed.status, ticket.status);

        let result = set_ticket_tag(&db, &buyer, &ticket.id, "   ").await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = set_ticket_tag(&db, &other_buyer_identity(), &ticket.id, "Mine").await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }
}
