//! Transaction entity - One checkout attempt and its payment lifecycle.
//!
//! Status moves `pending → paid | failed | expired` exactly once; terminal
//! states are final. `link_payment`/`payment_token` hold the opaque gateway session.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment lifecycle of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Awaiting gateway settlement
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Funds captured; tickets activated
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Denied or cancelled at the gateway
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Payment window lapsed at the gateway
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl TransactionStatus {
    /// Whether no further transition is allowed out of this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Stable lowercase name, as stored and acknowledged to the gateway.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Prefixed surrogate key (`trans-<uuid>`); doubles as the gateway order id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Buyer who checked out
    pub owner_id: String,
    /// Sum of detail subtotals at checkout time
    pub price_total: f64,
    /// Payment lifecycle state
    pub status: TransactionStatus,
    /// Gateway redirect URL, once a payment session exists
    pub link_payment: Option<String>,
    /// Gateway session token, once a payment session exists
    pub payment_token: Option<String>,
    /// When settlement was recorded
    pub settled_at: Option<DateTimeUtc>,
    /// When the checkout committed
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One transaction has one detail per ticket category
    #[sea_orm(has_many = "super::transaction_detail::Entity")]
    Details,
    /// One transaction issues many tickets
    #[sea_orm(has_many = "super::ticket::Entity")]
    Tickets,
}

impl Related<super::transaction_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Details.def()
    }
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
