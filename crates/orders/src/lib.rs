//! Orders domain module.
//!
//! This crate contains business rules for orders, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage): the order and line
//! item model, the status lifecycle and its transition policy, creation
//! request pre-checks, and authoritative pricing of validated items.

pub mod order;
pub mod request;
pub mod transition;

pub use order::{NewOrderHeader, Order, OrderFilter, OrderHeader, OrderItem, OrderStatus};
pub use request::{NewOrderRequest, RequestedItem, ValidatedItem, ValidatedOrder, validate_items};
pub use transition::{Transition, TransitionPolicy};
