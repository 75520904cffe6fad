//! Cart business logic - Per-buyer staging area before checkout.
//!
//! Cart lines never reserve inventory. The quota check performed here only lets a
//! buyer see early that a category is sold out; checkout repeats it authoritatively.

use crate::{
    core::event::{get_event, get_ticket_category},
    core::identity::AuthIdentity,
    core::ids,
    entities::{CartLine, cart_line, event, ticket_category},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Serialize;
use tracing::{debug, instrument};

/// A cart line together with what it points at.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    /// The staged line
    pub line: cart_line::Model,
    /// Category being bought
    pub category: ticket_category::Model,
    /// Event the category belongs to
    pub event: event::Model,
}

fn line_total(price: f64, quantity: i32) -> f64 {
    price * f64::from(quantity)
}

/// Sales are open on `[date_time_start, date_time_end)`.
fn ensure_on_sale(category: &ticket_category::Model, now: DateTime<Utc>) -> Result<()> {
    if now < category.date_time_start || now >= category.date_time_end {
        return Err(Error::SalesWindowClosed {
            category: category.name.clone(),
        });
    }
    Ok(())
}

/// Non-authoritative availability check.
fn ensure_headroom(category: &ticket_category::Model, quantity: i32) -> Result<()> {
    if quantity > category.remaining() {
        return Err(Error::QuotaExceeded {
            category: category.name.clone(),
            requested: quantity,
            available: category.remaining(),
        });
    }
    Ok(())
}

async fn find_owned_line(
    db: &DatabaseConnection,
    owner_id: &str,
    cart_id: &str,
) -> Result<cart_line::Model> {
    CartLine::find_by_id(cart_id.to_string())
        .filter(cart_line::Column::OwnerId.eq(owner_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("CartLine", cart_id))
}

/// Adds `quantity` units of a ticket category to the buyer's cart.
///
/// Merges into the existing line for the same category when there is one, so a
/// buyer holds at most one line per category.
///
/// # Errors
/// Returns an error if:
/// - The caller is not a buyer
/// - `quantity` is below 1
/// - The category does not exist or is outside its sales window
/// - The merged quantity exceeds the category's current headroom
#[instrument(skip(db), fields(owner = %buyer.user_id))]
pub async fn add_to_cart(
    db: &DatabaseConnection,
    buyer: &AuthIdentity,
    ticket_category_id: &str,
    quantity: i32,
) -> Result<cart_line::Model> {
    buyer.require_buyer()?;
    if quantity < 1 {
        return Err(Error::InvalidQuantity { quantity });
    }

    let category = get_ticket_category(db, ticket_category_id)
        .await?
        .ok_or_else(|| Error::not_found("TicketCategory", ticket_category_id))?;
    let now = Utc::now();
    ensure_on_sale(&category, now)?;

    let existing = CartLine::find()
        .filter(cart_line::Column::OwnerId.eq(&buyer.user_id))
        .filter(cart_line::Column::TicketCategoryId.eq(&category.id))
        .one(db)
        .await?;

    let merged = match &existing {
        Some(line) => line
            .quantity
            .checked_add(quantity)
            .ok_or(Error::InvalidQuantity { quantity })?,
        None => quantity,
    };
    ensure_headroom(&category, merged)?;

    let line = match existing {
        Some(line) => {
            let mut active_model: cart_line::ActiveModel = line.into();
            active_model.quantity = Set(merged);
            active_model.price_total = Set(line_total(category.price, merged));
            active_model.updated_at = Set(now);
            active_model.update(db).await?
        }
        None => {
            cart_line::ActiveModel {
                id: Set(ids::cart_id()),
                owner_id: Set(buyer.user_id.clone()),
                ticket_category_id: Set(category.id.clone()),
                quantity: Set(merged),
                price_total: Set(line_total(category.price, merged)),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(db)
            .await?
        }
    };

    debug!(cart_id = %line.id, quantity = line.quantity, "Cart line staged");
    Ok(line)
}

/// Replaces the quantity of one of the buyer's cart lines.
///
/// # Errors
/// Returns an error if the line is not the caller's, `quantity` is below 1, the
/// category is no longer on sale, or the quantity exceeds current headroom.
pub async fn update_cart_line(
    db: &DatabaseConnection,
    buyer: &AuthIdentity,
    cart_id: &str,
    quantity: i32,
) -> Result<cart_line::Model> {
    buyer.require_buyer()?;
    if quantity < 1 {
        return Err(Error::InvalidQuantity { quantity });
    }

    let line = find_owned_line(db, &buyer.user_id, cart_id).await?;
    let category = get_ticket_category(db, &line.ticket_category_id)
        .await?
        .ok_or_else(|| Error::not_found("TicketCategory", &line.ticket_category_id))?;
    let now = Utc::now();
    ensure_on_sale(&category, now)?;
    ensure_headroom(&category, quantity)?;

    let mut active_model: cart_line::ActiveModel = line.into();
    active_model.quantity = Set(quantity);
    active_model.price_total = Set(line_total(category.price, quantity));
    active_model.updated_at = Set(now);
    active_model.update(db).await.map_err(Into::into)
}

/// Removes one of the buyer's cart lines.
///
/// # Errors
/// Returns [`Error::NotFound`] when the caller has no such line.
pub async fn remove_cart_line(
    db: &DatabaseConnection,
    buyer: &AuthIdentity,
    cart_id: &str,
) -> Result<()> {
    buyer.require_buyer()?;
    let result = CartLine::delete_many()
        .filter(cart_line::Column::Id.eq(cart_id))
        .filter(cart_line::Column::OwnerId.eq(&buyer.user_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::not_found("CartLine", cart_id));
    }
    Ok(())
}

/// Raw cart lines for an owner, oldest first.
pub(crate) async fn cart_lines<C>(db: &C, owner_id: &str) -> Result<Vec<cart_line::Model>>
where
    C: ConnectionTrait,
{
    CartLine::find()
        .filter(cart_line::Column::OwnerId.eq(owner_id))
        .order_by_asc(cart_line::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Returns the buyer's cart with category and event snapshots.
///
/// Lines whose category or event no longer exists are skipped.
pub async fn get_cart(db: &DatabaseConnection, buyer: &AuthIdentity) -> Result<Vec<CartItemView>> {
    let mut items = Vec::new();
    for line in cart_lines(db, &buyer.user_id).await? {
        let Some(category) = get_ticket_category(db, &line.ticket_category_id).await? else {
            continue;
        };
        let Some(event) = get_event(db, &category.event_id).await? else {
            continue;
        };
        items.push(CartItemView {
            line,
            category,
            event,
        });
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::event::record_sale;
    use crate::test_utils::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_add_to_cart_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = add_to_cart(&db, &buyer_identity(), "tcat-any", 0).await;
        assert!(matches!(result, Err(Error::InvalidQuantity { quantity: 0 })));

        let result = add_to_cart(&db, &organizer_identity(), "tcat-any", 1).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_add_to_cart_merges_lines() -> Result<()> {
        let (db, _event, category) = setup_with_category(150.0, 10).await?;
        let buyer = buyer_identity();

        let first = add_to_cart(&db, &buyer, &category.id, 2).await?;
        let second = add_to_cart(&db, &buyer, &category.id, 3).await?;

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 5);
        assert_eq!(second.price_total, 750.0);
        assert_eq!(cart_lines(&db, &buyer.user_id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_to_cart_does_not_touch_sold() -> Result<()> {
        let (db, _event, category) = setup_with_category(150.0, 10).await?;

        add_to_cart(&db, &buyer_identity(), &category.id, 4).await?;

        let category = get_ticket_category(&db, &category.id).await?.unwrap();
        assert_eq!(category.sold, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_to_cart_best_effort_quota_check() -> Result<()> {
        let (db, _event, category) = setup_with_category(150.0, 10).await?;
        record_sale(&db, &category.id, 8).await?;

        let result = add_to_cart(&db, &buyer_identity(), &category.id, 3).await;
        assert!(matches!(
            result,
            Err(Error::QuotaExceeded {
                requested: 3,
                available: 2,
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_add_to_cart_outside_sales_window() -> Result<()> {
        let (db, event) = setup_with_event().await?;
        let mut new_category = sample_new_category(100.0, 10);
        new_category.date_time_start = Utc::now() + Duration::days(2);
        new_category.date_time_end = Utc::now() + Duration::days(3);
        let category = crate::core::event::add_ticket_category(
            &db,
            &organizer_identity(),
            &event.id,
            new_category,
        )
        .await?;

        let result = add_to_cart(&db, &buyer_identity(), &category.id, 1).await;
        assert!(matches!(result, Err(Error::SalesWindowClosed { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_and_remove_are_owner_scoped() -> Result<()> {
        let (db, _event, category) = setup_with_category(100.0, 10).await?;
        let buyer = buyer_identity();
        let other = other_buyer_identity();

        let line = add_to_cart(&db, &buyer, &category.id, 1).await?;

        let result = update_cart_line(&db, &other, &line.id, 2).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        let result = remove_cart_line(&db, &other, &line.id).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        let updated = update_cart_line(&db, &buyer, &line.id, 4).await?;
        assert_eq!(updated.quantity, 4);
        assert_eq!(updated.price_total, 400.0);

        remove_cart_line(&db, &buyer, &line.id).await?;
        assert!(get_cart(&db, &buyer).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_get_cart_includes_snapshots() -> Result<()> {
        let (db, event, category) = setup_with_category(100.0, 10).await?;
        let buyer = buyer_identity();
        add_to_cart(&db, &buyer, &category.id, 2).await?;

        let cart = get_cart(&db, &buyer).await?;
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].category.id, category.id);
        assert_eq!(cart[0].event.id, event.id);
        assert_eq!(cart[0].line.quantity, 2);
        Ok(())
    }
}
