//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod cart_line;
pub mod event;
pub mod ticket;
pub mod ticket_category;
pub mod transaction;
pub mod transaction_detail;

// Re-export specific types to avoid conflicts
pub use cart_line::{Column as CartLineColumn, Entity as CartLine, Model as CartLineModel};
pub use event::{Column as EventColumn, Entity as Event, Model as EventModel};
pub use ticket::{Column as TicketColumn, Entity as Ticket, Model as TicketModel, TicketStatus};
pub use ticket_category::{
    Column as TicketCategoryColumn, Entity as TicketCategory, Model as TicketCategoryModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionStatus,
};
pub use transaction_detail::{
    Column as TransactionDetailColumn, Entity as TransactionDetail,
    Model as TransactionDetailModel,
};
