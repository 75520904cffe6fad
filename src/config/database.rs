//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. Composite constraints that entities
//! cannot express (one cart line per owner and category) are added as explicit indexes.

use crate::entities::{
    CartLine, CartLineColumn, Event, Ticket, TicketCategory, Transaction, TransactionDetail,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info, instrument};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/ticketing.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
/// The returned handle is a pool; pass it explicitly to every core operation.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables and indexes if they do not exist yet.
///
/// Tables are created parents-first so foreign keys resolve: events, ticket
/// categories, cart lines, transactions, transaction details, tickets.
#[instrument(skip(db))]
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, Event).await?;
    create_table(db, &schema, TicketCategory).await?;
    create_table(db, &schema, CartLine).await?;
    create_table(db, &schema, Transaction).await?;
    create_table(db, &schema, TransactionDetail).await?;
    create_table(db, &schema, Ticket).await?;

    let cart_line_unique = Index::create()
        .name("idx_cart_lines_owner_category")
        .table(CartLine)
        .col(CartLineColumn::OwnerId)
        .col(CartLineColumn::TicketCategoryId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&cart_line_unique)).await?;

    info!("Database tables ensured");
    Ok(())
}
