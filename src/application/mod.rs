//! Application layer containing the settlement orchestration.
//!
//! `SettlementEngine` is the entry point for gateway notifications and drives
//! the resolve → ledger → fan-out pipeline; `CancellationService` applies the
//! refund policy to booking cancellations. Both talk to persistence only
//! through the ports in `domain::ports`.

pub mod cancellation;
pub mod engine;
pub mod fanout;
pub mod ledger;
pub mod resolver;
