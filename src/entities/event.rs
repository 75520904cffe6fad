//! Event entity - An organizer-owned event that aggregates ticket categories.
//!
//! The `total_*` columns are derived counters. They are only ever moved by
//! relative updates issued from settlement and check-in, never written directly.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Event database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "events")]
pub struct Model {
    /// Prefixed surrogate key (`event-<uuid>`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name of the event
    pub name: String,
    /// User ID of the organizer who owns the event
    pub owner_id: String,
    /// Free-form description
    pub description: String,
    /// House rules shown to attendees
    pub rules: String,
    /// Address or general location
    pub location: String,
    /// Venue name
    pub venue: String,
    /// District or city
    pub district: String,
    /// Event category label (e.g. "music")
    pub category: String,
    /// Doors open; check-in is rejected before this instant
    pub date_start: DateTimeUtc,
    /// Event end; check-in is rejected after this instant
    pub date_end: DateTimeUtc,
    /// Confirmed (settled) tickets across all categories
    pub total_tickets_sold: i32,
    /// Sum of settled transaction detail subtotals
    pub total_sales: f64,
    /// Tickets checked in across all categories
    pub total_attendant: i32,
    /// When the event was created
    pub created_at: DateTimeUtc,
    /// When the event details were last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Event and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One event has many ticket categories
    #[sea_orm(has_many = "super::ticket_category::Entity")]
    TicketCategories,
    /// One event has many tickets
    #[sea_orm(has_many = "super::ticket::Entity")]
    Tickets,
}

impl Related<super::ticket_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TicketCategories.def()
    }
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
