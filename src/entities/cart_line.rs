//! Cart line entity - One staged (owner, ticket category) pair before checkout.
//!
//! Cart lines do not reserve inventory. `price_total` is recomputed from the
//! category price on every mutation and snapshotted into the transaction at checkout.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cart line database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cart_lines")]
pub struct Model {
    /// Prefixed surrogate key (`cart-<uuid>`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Buyer who owns the line
    pub owner_id: String,
    /// Ticket category being bought
    pub ticket_category_id: String,
    /// Requested units
    pub quantity: i32,
    /// `quantity × category.price` at the time of the last mutation
    pub price_total: f64,
    /// When the line was first added
    pub created_at: DateTimeUtc,
    /// When the line was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `CartLine` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line points at one ticket category
    #[sea_orm(
        belongs_to = "super::ticket_category::Entity",
        from = "Column::TicketCategoryId",
        to = "super::ticket_category::Column::Id"
    )]
    TicketCategory,
}

impl Related<super::ticket_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TicketCategory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
