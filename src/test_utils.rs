//! Shared test utilities for the ticketing core.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    config::settings::Settings,
    core::{
        cart, event,
        event::{NewEvent, NewTicketCategory},
        fulfillment,
        identity::{AuthIdentity, Role},
        settlement,
    },
    entities,
    errors::{Error, Result},
    gateway::{GatewayNotification, RecordingGateway},
};
use chrono::{Duration, Utc};
use sea_orm::{DatabaseConnection, EntityTrait};

/// Owner of every test event.
pub const ORGANIZER_ID: &str = "org-1";
/// Default buyer.
pub const BUYER_ID: &str = "user-1";
/// A second, unrelated buyer.
pub const OTHER_BUYER_ID: &str = "user-2";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Organizer who owns every test event.
pub fn organizer_identity() -> AuthIdentity {
    AuthIdentity::new(ORGANIZER_ID, Role::Organizer)
}

/// The default buyer.
pub fn buyer_identity() -> AuthIdentity {
    AuthIdentity::new(BUYER_ID, Role::User)
}

/// A buyer unrelated to [`buyer_identity`].
pub fn other_buyer_identity() -> AuthIdentity {
    AuthIdentity::new(OTHER_BUYER_ID, Role::User)
}

/// An event that started an hour ago and runs for another day.
pub fn sample_new_event() -> NewEvent {
    let now = Utc::now();
    NewEvent {
        name: "Test Fest".to_string(),
        description: "A test event".to_string(),
        rules: "No outside food".to_string(),
        location: "Jl. Test 1".to_string(),
        venue: "Test Arena".to_string(),
        district: "Test District".to_string(),
        category: "music".to_string(),
        date_start: now - Duration::hours(1),
        date_end: now + Duration::days(1),
    }
}

/// A category currently on sale.
pub fn sample_new_category(price: f64, quota: i32) -> NewTicketCategory {
    let now = Utc::now();
    NewTicketCategory {
        name: "Regular".to_string(),
        description: "General admission".to_string(),
        price,
        quota,
        date_time_start: now - Duration::hours(1),
        date_time_end: now + Duration::days(1),
    }
}

/// Creates a test event owned by [`ORGANIZER_ID`].
pub async fn create_test_event(db: &DatabaseConnection, name: &str) -> Result<entities::event::Model> {
    let new_event = NewEvent {
        name: name.to_string(),
        ..sample_new_event()
    };
    event::create_event(db, &organizer_identity(), new_event).await
}

/// Creates an on-sale ticket category on an event.
pub async fn create_test_category(
    db: &DatabaseConnection,
    event_id: &str,
    price: f64,
    quota: i32,
) -> Result<entities::ticket_category::Model> {
    event::add_ticket_category(
        db,
        &organizer_identity(),
        event_id,
        sample_new_category(price, quota),
    )
    .await
}

/// Sets up a complete test environment with an event.
/// Returns (db, event) for common test scenarios.
pub async fn setup_with_event() -> Result<(DatabaseConnection, entities::event::Model)> {
    let db = setup_test_db().await?;
    let event = create_test_event(&db, "Test Fest").await?;
    Ok((db, event))
}

/// Sets up a complete test environment with an event and one category.
/// Returns (db, event, category) for cart and fulfillment tests.
pub async fn setup_with_category(
    price: f64,
    quota: i32,
) -> Result<(
    DatabaseConnection,
    entities::event::Model,
    entities::ticket_category::Model,
)> {
    let (db, event) = setup_with_event().await?;
    let category = create_test_category(&db, &event.id, price, quota).await?;
    Ok((db, event, category))
}

/// Buys and settles a single ticket for [`BUYER_ID`].
/// Returns (db, ticket) with the ticket `active`.
pub async fn setup_with_paid_ticket() -> Result<(DatabaseConnection, entities::ticket::Model)> {
    let (db, _event, category) = setup_with_category(100.0, 10).await?;
    let buyer = buyer_identity();

    cart::add_to_cart(&db, &buyer, &category.id, 1).await?;
    let receipt =
        fulfillment::checkout(&db, &RecordingGateway::new(), &Settings::default(), &buyer).await?;

    let body = serde_json::json!({
        "order_id": receipt.transaction.id,
        "transaction_status": "settlement",
    });
    let notification = GatewayNotification::parse(body.to_string().as_bytes())?;
    settlement::apply_notification(&db, &notification).await?;

    let ticket_id = receipt
        .tickets
        .first()
        .map(|t| t.id.clone())
        .ok_or_else(|| Error::not_found("Ticket", "first issued ticket"))?;
    let ticket = entities::Ticket::find_by_id(ticket_id.clone())
        .one(&db)
        .await?
        .ok_or_else(|| Error::not_found("Ticket", ticket_id))?;
    Ok((db, ticket))
}
