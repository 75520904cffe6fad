//! Event business logic - Event catalogue, ticket categories, and the inventory ledger.
//!
//! Events and their categories are created and edited here. The sold/attendant
//! counters are not editable through any of the public update operations; they move
//! only through the crate-internal ledger functions at the bottom of this module,
//! which settlement and check-in call inside their own database transactions.

use crate::{
    core::identity::AuthIdentity,
    core::ids,
    entities::{Event, Ticket, TicketCategory, TicketStatus, event, ticket, ticket_category},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::{info, instrument};

/// Input for [`create_event`].
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// House rules
    pub rules: String,
    /// Address or general location
    pub location: String,
    /// Venue name
    pub venue: String,
    /// District or city
    pub district: String,
    /// Category label
    pub category: String,
    /// Doors open
    pub date_start: DateTime<Utc>,
    /// Event end
    pub date_end: DateTime<Utc>,
}

/// Input for [`add_ticket_category`].
#[derive(Debug, Clone)]
pub struct NewTicketCategory {
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Unit price
    pub price: f64,
    /// Maximum sellable units
    pub quota: i32,
    /// Sales window start (inclusive)
    pub date_time_start: DateTime<Utc>,
    /// Sales window end (exclusive)
    pub date_time_end: DateTime<Utc>,
}

/// The fixed set of event fields an owner may edit. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct EventDetailsUpdate {
    /// New display name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New house rules
    pub rules: Option<String>,
    /// New location
    pub location: Option<String>,
    /// New venue
    pub venue: Option<String>,
    /// New district
    pub district: Option<String>,
    /// New category label
    pub category: Option<String>,
    /// New start
    pub date_start: Option<DateTime<Utc>>,
    /// New end
    pub date_end: Option<DateTime<Utc>>,
}

/// Per-category slice of an [`EventReport`].
#[derive(Debug, Clone)]
pub struct CategoryReport {
    /// Category with its ledger counters
    pub category: ticket_category::Model,
    /// Ticket rows that were paid for (active or used)
    pub purchased: u64,
    /// Ticket rows that were checked in
    pub checked_in: u64,
}

/// Sales and attendance summary for one event.
#[derive(Debug, Clone)]
pub struct EventReport {
    /// Event with its derived counters
    pub event: event::Model,
    /// One entry per ticket category
    pub categories: Vec<CategoryReport>,
}

impl EventReport {
    /// Whether the event counters agree with the category counters and with the
    /// ticket rows they summarise.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let sold: i64 = self.categories.iter().map(|c| i64::from(c.category.sold)).sum();
        let attendant: i64 = self
            .categories
            .iter()
            .map(|c| i64::from(c.category.attendant))
            .sum();
        let purchased: u64 = self.categories.iter().map(|c| c.purchased).sum();
        let checked_in: u64 = self.categories.iter().map(|c| c.checked_in).sum();

        let total_sold = i64::from(self.event.total_tickets_sold);
        let total_attendant = i64::from(self.event.total_attendant);

        sold == total_sold
            && attendant == total_attendant
            && u64::try_from(total_sold).is_ok_and(|t| t == purchased)
            && u64::try_from(total_attendant).is_ok_and(|t| t == checked_in)
    }
}

fn require_text(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation {
            message: format!("{field} cannot be empty"),
        });
    }
    Ok(())
}

fn require_ordered(start: DateTime<Utc>, end: DateTime<Utc>, what: &str) -> Result<()> {
    if start >= end {
        return Err(Error::Validation {
            message: format!("{what} must start before it ends"),
        });
    }
    Ok(())
}

/// Creates a new event owned by the calling organizer.
///
/// The event starts with all derived counters at zero.
///
/// # Errors
/// Returns an error if:
/// - The caller is not an organizer or admin
/// - Name or location is empty
/// - `date_start` is not before `date_end`
/// - The database insert fails
#[instrument(skip(db, new_event), fields(organizer = %organizer.user_id))]
pub async fn create_event(
    db: &DatabaseConnection,
    organizer: &AuthIdentity,
    new_event: NewEvent,
) -> Result<event::Model> {
    organizer.require_organizer()?;
    require_text(&new_event.name, "Event name")?;
    require_text(&new_event.location, "Event location")?;
    require_ordered(new_event.date_start, new_event.date_end, "Event")?;

    let now = Utc::now();
    let event = event::ActiveModel {
        id: Set(ids::event_id()),
        name: Set(new_event.name.trim().to_string()),
        owner_id: Set(organizer.user_id.clone()),
        description: Set(new_event.description),
        rules: Set(new_event.rules),
        location: Set(new_event.location.trim().to_string()),
        venue: Set(new_event.venue),
        district: Set(new_event.district),
        category: Set(new_event.category),
        date_start: Set(new_event.date_start),
        date_end: Set(new_event.date_end),
        total_tickets_sold: Set(0),
        total_sales: Set(0.0),
        total_attendant: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let event = event.insert(db).await?;
    info!(event_id = %event.id, "Event created");
    Ok(event)
}

/// Adds a ticket category to an event the caller manages.
///
/// # Errors
/// Returns an error if:
/// - The event does not exist
/// - The caller neither owns the event nor is an admin
/// - The name is empty, the price is negative or not finite, or the quota is below 1
/// - The sales window is empty
pub async fn add_ticket_category(
    db: &DatabaseConnection,
    identity: &AuthIdentity,
    event_id: &str,
    new_category: NewTicketCategory,
) -> Result<ticket_category::Model> {
    let event = get_event(db, event_id)
        .await?
        .ok_or_else(|| Error::not_found("Event", event_id))?;
    identity.require_owner_or_admin(&event.owner_id)?;

    require_text(&new_category.name, "Ticket category name")?;
    if !new_category.price.is_finite() || new_category.price < 0.0 {
        return Err(Error::InvalidAmount {
            amount: new_category.price,
        });
    }
    if new_category.quota < 1 {
        return Err(Error::InvalidQuantity {
            quantity: new_category.quota,
        });
    }
    require_ordered(
        new_category.date_time_start,
        new_category.date_time_end,
        "Ticket sales window",
    )?;

    let now = Utc::now();
    let category = ticket_category::ActiveModel {
        id: Set(ids::ticket_category_id()),
        event_id: Set(event.id),
        name: Set(new_category.name.trim().to_string()),
        description: Set(new_category.description),
        price: Set(new_category.price),
        quota: Set(new_category.quota),
        sold: Set(0),
        attendant: Set(0),
        date_time_start: Set(new_category.date_time_start),
        date_time_end: Set(new_category.date_time_end),
        created_at: Set(now),
        updated_at: Set(now),
    };
    category.insert(db).await.map_err(Into::into)
}

/// Applies an [`EventDetailsUpdate`] to an event the caller manages.
///
/// Only the descriptive fields listed on [`EventDetailsUpdate`] can change; the
/// ledger counters are never written by this function.
///
/// # Errors
/// Returns an error if the event does not exist, the caller may not manage it,
/// a provided name or location is empty, or the resulting dates are out of order.
pub async fn update_event_details(
    db: &DatabaseConnection,
    identity: &AuthIdentity,
    event_id: &str,
    update: EventDetailsUpdate,
) -> Result<event::Model> {
    let event = get_event(db, event_id)
        .await?
        .ok_or_else(|| Error::not_found("Event", event_id))?;
    identity.require_owner_or_admin(&event.owner_id)?;

    if let Some(name) = &update.name {
        require_text(name, "Event name")?;
    }
    if let Some(location) = &update.location {
        require_text(location, "Event location")?;
    }
    let date_start = update.date_start.unwrap_or(event.date_start);
    let date_end = update.date_end.unwrap_or(event.date_end);
    require_ordered(date_start, date_end, "Event")?;

    let mut active_model: event::ActiveModel = event.into();
    if let Some(name) = update.name {
        active_model.name = Set(name.trim().to_string());
    }
    if let Some(description) = update.description {
        active_model.description = Set(description);
    }
    if let Some(rules) = update.rules {
        active_model.rules = Set(rules);
    }
    if let Some(location) = update.location {
        active_model.location = Set(location.trim().to_string());
    }
    if let Some(venue) = update.venue {
        active_model.venue = Set(venue);
    }
    if let Some(district) = update.district {
        active_model.district = Set(district);
    }
    if let Some(category) = update.category {
        active_model.category = Set(category);
    }
    if update.date_start.is_some() {
        active_model.date_start = Set(date_start);
    }
    if update.date_end.is_some() {
        active_model.date_end = Set(date_end);
    }
    active_model.updated_at = Set(Utc::now());

    active_model.update(db).await.map_err(Into::into)
}

/// Finds an event by its id.
pub async fn get_event<C>(db: &C, event_id: &str) -> Result<Option<event::Model>>
where
    C: ConnectionTrait,
{
    Event::find_by_id(event_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a ticket category by its id.
pub async fn get_ticket_category<C>(
    db: &C,
    ticket_category_id: &str,
) -> Result<Option<ticket_category::Model>>
where
    C: ConnectionTrait,
{
    TicketCategory::find_by_id(ticket_category_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists an event's ticket categories, cheapest first.
pub async fn list_ticket_categories(
    db: &DatabaseConnection,
    event_id: &str,
) -> Result<Vec<ticket_category::Model>> {
    TicketCategory::find()
        .filter(ticket_category::Column::EventId.eq(event_id))
        .order_by_asc(ticket_category::Column::Price)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Builds the sales and attendance report for an event the caller manages.
///
/// # Errors
/// Returns an error if the event does not exist or the caller may not manage it.
pub async fn event_report(
    db: &DatabaseConnection,
    identity: &AuthIdentity,
    event_id: &str,
) -> Result<EventReport> {
    let event = get_event(db, event_id)
        .await?
        .ok_or_else(|| Error::not_found("Event", event_id))?;
    identity.require_owner_or_admin(&event.owner_id)?;

    let mut categories = Vec::new();
    for category in list_ticket_categories(db, event_id).await? {
        let purchased = Ticket::find()
            .filter(ticket::Column::TicketCategoryId.eq(&category.id))
            .filter(ticket::Column::Status.is_in([TicketStatus::Active, TicketStatus::Used]))
            .count(db)
            .await?;
        let checked_in = Ticket::find()
            .filter(ticket::Column::TicketCategoryId.eq(&category.id))
            .filter(ticket::Column::Status.eq(TicketStatus::Used))
            .count(db)
            .await?;

        categories.push(CategoryReport {
            category,
            purchased,
            checked_in,
        });
    }

    Ok(EventReport { event, categories })
}

/// Confirms `quantity` sold units on a category.
///
/// Atomic and guarded: `sold = sold + quantity` is applied only while the result
/// stays within `quota`, so concurrent settlements can never push `sold` past it.
pub(crate) async fn record_sale<C>(db: &C, ticket_category_id: &str, quantity: i32) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = TicketCategory::update_many()
        .col_expr(
            ticket_category::Column::Sold,
            Expr::col(ticket_category::Column::Sold).add(quantity),
        )
        .col_expr(ticket_category::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(ticket_category::Column::Id.eq(ticket_category_id))
        .filter(
            Expr::col(ticket_category::Column::Sold)
                .lte(Expr::col(ticket_category::Column::Quota).sub(quantity)),
        )
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        let category = get_ticket_category(db, ticket_category_id)
            .await?
            .ok_or_else(|| Error::not_found("TicketCategory", ticket_category_id))?;
        return Err(Error::QuotaExceeded {
            category: category.name.clone(),
            requested: quantity,
            available: category.remaining(),
        });
    }
    Ok(())
}

/// Adds a settled detail line to the event's derived counters.
pub(crate) async fn record_event_sale<C>(
    db: &C,
    event_id: &str,
    quantity: i32,
    subtotal: f64,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Event::update_many()
        .col_expr(
            event::Column::TotalTicketsSold,
            Expr::col(event::Column::TotalTicketsSold).add(quantity),
        )
        .col_expr(
            event::Column::TotalSales,
            Expr::col(event::Column::TotalSales).add(subtotal),
        )
        .filter(event::Column::Id.eq(event_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::not_found("Event", event_id));
    }
    Ok(())
}

/// Counts one checked-in ticket on its category and event.
pub(crate) async fn record_attendance<C>(
    db: &C,
    ticket_category_id: &str,
    event_id: &str,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let category = TicketCategory::update_many()
        .col_expr(
            ticket_category::Column::Attendant,
            Expr::col(ticket_category::Column::Attendant).add(1),
        )
        .filter(ticket_category::Column::Id.eq(ticket_category_id))
        .exec(db)
        .await?;
    if category.rows_affected == 0 {
        return Err(Error::not_found("TicketCategory", ticket_category_id));
    }

    let event = Event::update_many()
        .col_expr(
            event::Column::TotalAttendant,
            Expr::col(event::Column::TotalAttendant).add(1),
        )
        .filter(event::Column::Id.eq(event_id))
        .exec(db)
        .await?;
    if event.rows_affected == 0 {
        return Err(Error::not_found("Event", event_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::identity::Role;
    use crate::test_utils::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_event_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let organizer = organizer_identity();

        let mut new_event = sample_new_event();
        new_event.name = "  ".to_string();
        let result = create_event(&db, &organizer, new_event).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let mut new_event = sample_new_event();
        new_event.date_end = new_event.date_start - Duration::hours(1);
        let result = create_event(&db, &organizer, new_event).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_event(&db, &buyer_identity(), sample_new_event()).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_event_starts_with_zero_counters() -> Result<()> {
        let db = setup_test_db().await?;
        let event = create_event(&db, &organizer_identity(), sample_new_event()).await?;

        assert!(event.id.starts_with("event-"));
        assert_eq!(event.owner_id, ORGANIZER_ID);
        assert_eq!(event.total_tickets_sold, 0);
        assert_eq!(event.total_sales, 0.0);
        assert_eq!(event.total_attendant, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_ticket_category_validation() -> Result<()> {
        let (db, event) = setup_with_event().await?;
        let organizer = organizer_identity();

        let mut bad_price = sample_new_category(50.0, 10);
        bad_price.price = f64::NAN;
        let result = add_ticket_category(&db, &organizer, &event.id, bad_price).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let result =
            add_ticket_category(&db, &organizer, &event.id, sample_new_category(50.0, 0)).await;
        assert!(matches!(result, Err(Error::InvalidQuantity { quantity: 0 })));

        let stranger = AuthIdentity::new("org-other", Role::Organizer);
        let result =
            add_ticket_category(&db, &stranger, &event.id, sample_new_category(50.0, 10)).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        let result =
            add_ticket_category(&db, &organizer, "event-missing", sample_new_category(50.0, 10))
                .await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_event_details_leaves_counters_alone() -> Result<()> {
        let (db, event, category) = setup_with_category(100.0, 10).await?;
        record_sale(&db, &category.id, 2).await?;
        record_event_sale(&db, &event.id, 2, 200.0).await?;

        let updated = update_event_details(
            &db,
            &organizer_identity(),
            &event.id,
            EventDetailsUpdate {
                name: Some("Renamed Fest".to_string()),
                venue: Some("Main Hall".to_string()),
                ..EventDetailsUpdate::default()
            },
        )
        .await?;

        assert_eq!(updated.name, "Renamed Fest");
        assert_eq!(updated.venue, "Main Hall");
        assert_eq!(updated.location, event.location);
        assert_eq!(updated.total_tickets_sold, 2);
        assert_eq!(updated.total_sales, 200.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_event_details_rejects_inverted_dates() -> Result<()> {
        let (db, event) = setup_with_event().await?;
        let result = update_event_details(
            &db,
            &organizer_identity(),
            &event.id,
            EventDetailsUpdate {
                date_end: Some(event.date_start - Duration::days(1)),
                ..EventDetailsUpdate::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_record_sale_is_guarded_by_quota() -> Result<()> {
        let (db, _event, category) = setup_with_category(100.0, 10).await?;

        record_sale(&db, &category.id, 8).await?;
        let result = record_sale(&db, &category.id, 3).await;
        assert!(matches!(
            result,
            Err(Error::QuotaExceeded {
                requested: 3,
                available: 2,
                ..
            })
        ));

        record_sale(&db, &category.id, 2).await?;
        let category = get_ticket_category(&db, &category.id).await?.unwrap();
        assert_eq!(category.sold, 10);
        assert_eq!(category.remaining(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_record_attendance_increments_both_counters() -> Result<()> {
        let (db, event, category) = setup_with_category(100.0, 10).await?;

        record_attendance(&db, &category.id, &event.id).await?;
        record_attendance(&db, &category.id, &event.id).await?;

        let category = get_ticket_category(&db, &category.id).await?.unwrap();
        let event = get_event(&db, &event.id).await?.unwrap();
        assert_eq!(category.attendant, 2);
        assert_eq!(event.total_attendant, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_event_report_requires_owner() -> Result<()> {
        let (db, event, _category) = setup_with_category(100.0, 10).await?;

        let report = event_report(&db, &organizer_identity(), &event.id).await?;
        assert_eq!(report.categories.len(), 1);
        assert!(report.is_consistent());

        let result = event_report(&db, &buyer_identity(), &event.id).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_event_report_detects_counter_drift() -> Result<()> {
        let (db, event, category) = setup_with_category(100.0, 10).await?;

        // Counters moved without any ticket rows behind them.
        record_sale(&db, &category.id, 1).await?;
        record_event_sale(&db, &event.id, 1, 100.0).await?;

        let report = event_report(&db, &organizer_identity(), &event.id).await?;
        assert!(!report.is_consistent());
        Ok(())
    }
}
