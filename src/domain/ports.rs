use super::booking::{AvailabilitySlot, Booking, BookingStatus, PaymentStatus, Tour};
use super::order::{Order, Product};
use super::refund::Refund;
use super::revenue::RevenueShare;
use super::transaction::SettlementTransaction;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// A precondition a [`UnitOfWork`] checks atomically before applying any mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    /// No transaction carries this payment reference yet.
    ReferenceAbsent(String),
    /// The transaction exists and is still `pending`.
    TransactionPending(Uuid),
    /// No revenue share references this transaction yet.
    NoRevenueShares(Uuid),
    /// The booking still has the status and payment status the caller read.
    BookingUnchanged {
        id: Uuid,
        status: BookingStatus,
        payment_status: PaymentStatus,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    PutTransaction(SettlementTransaction),
    PutBooking(Booking),
    PutOrder(Order),
    PutTour(Tour),
    PutProduct(Product),
    PutSlot(AvailabilitySlot),
    IncrementTourBookings(Uuid),
    ReleaseSlotSeats { slot_id: Uuid, participants: u32 },
    InsertRevenueShare(RevenueShare),
    InsertRefund(Refund),
}

/// A batch of writes that commits entirely or not at all.
///
/// Stores evaluate every guard first; a failed guard aborts the unit with
/// `SettlementError::Conflict` and nothing is written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitOfWork {
    guards: Vec<Guard>,
    mutations: Vec<Mutation>,
}

impl Guard {
    pub fn booking_unchanged(booking: &Booking) -> Self {
        Guard::BookingUnchanged {
            id: booking.id,
            status: booking.status,
            payment_status: booking.payment_status,
        }
    }
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(&mut self, guard: Guard) -> &mut Self {
        self.guards.push(guard);
        self
    }

    pub fn push(&mut self, mutation: Mutation) -> &mut Self {
        self.mutations.push(mutation);
        self
    }

    pub fn into_parts(self) -> (Vec<Guard>, Vec<Mutation>) {
        (self.guards, self.mutations)
    }
}

/// Persistence port for the settlement core.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<SettlementTransaction>>;
    async fn transaction_by_gateway_id(
        &self,
        gateway_id: u64,
    ) -> Result<Option<SettlementTransaction>>;
    async fn booking(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn booking_by_number(&self, number: &str) -> Result<Option<Booking>>;
    async fn order(&self, id: Uuid) -> Result<Option<Order>>;
    async fn order_by_number(&self, number: &str) -> Result<Option<Order>>;
    async fn tour(&self, id: Uuid) -> Result<Option<Tour>>;
    async fn product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn slot(&self, id: Uuid) -> Result<Option<AvailabilitySlot>>;
    async fn revenue_shares(&self, transaction_id: Uuid) -> Result<Vec<RevenueShare>>;
    async fn refunds_for_booking(&self, booking_id: Uuid) -> Result<Vec<Refund>>;
    async fn commit(&self, unit: UnitOfWork) -> Result<()>;
}

/// Transactional mail, fire-and-forget from the core's point of view.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_booking_confirmation(
        &self,
        booking: &Booking,
        transaction: &SettlementTransaction,
    ) -> Result<()>;
    async fn send_order_confirmation(
        &self,
        order: &Order,
        transaction: &SettlementTransaction,
    ) -> Result<()>;
}

/// Real-time event channel (websocket hub, push service, ...).
#[async_trait]
pub trait RealtimePublisher: Send + Sync {
    async fn publish_to_channel(
        &self,
        channel: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<()>;
}

pub type SettlementStoreRef = Arc<dyn SettlementStore>;
pub type MailerRef = Arc<dyn Mailer>;
pub type PublisherRef = Arc<dyn RealtimePublisher>;
