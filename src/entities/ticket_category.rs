//! Ticket category entity - A priced, quota-bounded tier of tickets for one event.
//!
//! `sold` only grows when a transaction settles and must never exceed `quota`.
//! `attendant` only grows on check-in.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ticket category database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ticket_categories")]
pub struct Model {
    /// Prefixed surrogate key (`tcat-<uuid>`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Event this category belongs to
    pub event_id: String,
    /// Display name (e.g. "VIP", "Early Bird")
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Unit price
    pub price: f64,
    /// Maximum sellable units
    pub quota: i32,
    /// Units confirmed by settlement
    pub sold: i32,
    /// Units checked in
    pub attendant: i32,
    /// Sales window start (inclusive)
    pub date_time_start: DateTimeUtc,
    /// Sales window end (exclusive)
    pub date_time_end: DateTimeUtc,
    /// When the category was created
    pub created_at: DateTimeUtc,
    /// When the category was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Units still sellable according to the confirmed counter.
    #[must_use]
    pub const fn remaining(&self) -> i32 {
        self.quota - self.sold
    }
}

/// Defines relationships between `TicketCategory` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each category belongs to one event
    #[sea_orm(
        belongs_to = "super::event::Entity",
        from = "Column::EventId",
        to = "super::event::Column::Id"
    )]
    Event,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
