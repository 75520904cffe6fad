//! Ticket entity - One admission unit, issued pending at checkout.
//!
//! Lifecycle: `pending → active → used`, or `pending → payment_failed`, with
//! `cancelled` as an administrative terminal state. The redemption `code`
//! rotates lazily once `expires_at` has passed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Issued at checkout, awaiting settlement
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Paid for and valid for check-in
    #[sea_orm(string_value = "active")]
    Active,
    /// Checked in
    #[sea_orm(string_value = "used")]
    Used,
    /// The paying transaction failed or expired
    #[sea_orm(string_value = "payment_failed")]
    PaymentFailed,
    /// Withdrawn by the organizer or an admin
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Ticket database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    /// Prefixed surrogate key (`ticket-<uuid>`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Event the ticket admits to
    pub event_id: String,
    /// Category the ticket was sold under
    pub ticket_category_id: String,
    /// Transaction that issued the ticket
    pub transaction_id: String,
    /// Buyer
    pub owner_id: String,
    /// Lifecycle state
    pub status: TicketStatus,
    /// Current redemption code
    #[sea_orm(unique)]
    pub code: String,
    /// When the current code stops being served; `None` never expires
    pub expires_at: Option<DateTimeUtc>,
    /// Owner-chosen label
    pub tag: String,
    /// When the ticket was issued
    pub created_at: DateTimeUtc,
    /// When the ticket row last changed
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Ticket and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each ticket belongs to one event
    #[sea_orm(
        belongs_to = "super::event::Entity",
        from = "Column::EventId",
        to = "super::event::Column::Id"
    )]
    Event,
    /// Each ticket belongs to one category
    #[sea_orm(
        belongs_to = "super::ticket_category::Entity",
        from = "Column::TicketCategoryId",
        to = "super::ticket_category::Column::Id"
    )]
    TicketCategory,
    /// Each ticket was issued by one transaction
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::TransactionId",
        to = "super::transaction::Column::Id"
    )]
    Transaction,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl Related<super::ticket_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TicketCategory.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
