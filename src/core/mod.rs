//! Core business logic - framework-agnostic event, cart, fulfillment, settlement,
//! code rotation, and check-in operations.
//!
//! Every operation takes its database handle explicitly and, where a person is
//! acting, an [`identity::AuthIdentity`].

/// Cart staging area before checkout
pub mod cart;
/// Check-in state machine
pub mod checkin;
/// Event catalogue, ticket categories, and the inventory ledger counters
pub mod event;
/// Checkout: cart to transaction, details, and pending tickets
pub mod fulfillment;
/// Authenticated caller identity and roles
pub mod identity;
/// Prefixed surrogate keys and redemption codes
pub mod ids;
/// Gateway notification reconciliation
pub mod settlement;
/// Owner-facing ticket queries
pub mod ticket;
/// Lazy redemption code rotation
pub mod ticket_code;
