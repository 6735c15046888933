//! Domain layer: settlement records, catalog entities touched by settlement,
//! the pure revenue and refund rules, and the ports the core consumes.

pub mod booking;
pub mod money;
pub mod notification;
pub mod order;
pub mod payment_code;
pub mod ports;
pub mod refund;
pub mod revenue;
pub mod transaction;
