//! Transaction detail entity - Immutable per-category snapshot of a checkout.
//!
//! Each row records how many tickets of one category were bought and for how much.
//! Settlement replays these rows against the inventory counters.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction detail database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_details")]
pub struct Model {
    /// Prefixed surrogate key (`tdet-<uuid>`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Parent transaction
    pub transaction_id: String,
    /// Ticket category bought
    pub ticket_category_id: String,
    /// Buyer (denormalised from the transaction)
    pub owner_id: String,
    /// Units bought; equals the number of tickets issued for this line
    pub quantity: i32,
    /// Line price snapshot
    pub subtotal: f64,
}

/// Defines relationships between `TransactionDetail` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each detail belongs to one transaction
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::TransactionId",
        to = "super::transaction::Column::Id"
    )]
    Transaction,
    /// Each detail refers to one ticket category
    #[sea_orm(
        belongs_to = "super::ticket_category::Entity",
        from = "Column::TicketCategoryId",
        to = "super::ticket_category::Column::Id"
    )]
    TicketCategory,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl Related<super::ticket_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TicketCategory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
