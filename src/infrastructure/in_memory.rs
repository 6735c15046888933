use crate::domain::booking::{AvailabilitySlot, Booking, Tour};
use crate::domain::order::{Order, Product};
use crate::domain::ports::{Guard, Mailer, Mutation, RealtimePublisher, SettlementStore, UnitOfWork};
use crate::domain::refund::Refund;
use crate::domain::revenue::RevenueShare;
use crate::domain::transaction::SettlementTransaction;
use crate::error::{Result, SettlementError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
struct Tables {
    transactions: HashMap<Uuid, SettlementTransaction>,
    references: HashMap<String, Uuid>,
    gateway_ids: HashMap<u64, Uuid>,
    bookings: HashMap<Uuid, Booking>,
    booking_numbers: HashMap<String, Uuid>,
    orders: HashMap<Uuid, Order>,
    order_numbers: HashMap<String, Uuid>,
    tours: HashMap<Uuid, Tour>,
    products: HashMap<Uuid, Product>,
    slots: HashMap<Uuid, AvailabilitySlot>,
    revenue_shares: HashMap<Uuid, Vec<RevenueShare>>,
    refunds: HashMap<Uuid, Vec<Refund>>,
}

impl Tables {
    fn check(&self, guard: &Guard) -> Result<()> {
        match guard {
            Guard::ReferenceAbsent(reference) => {
                if self.references.contains_key(reference) {
                    return Err(SettlementError::conflict(format!(
                        "payment reference {} already exists",
                        reference
                    )));
                }
            }
            Guard::TransactionPending(id) => match self.transactions.get(id) {
                Some(tx) if !tx.is_completed() => {}
                Some(_) => {
                    return Err(SettlementError::conflict(format!(
                        "transaction {} already completed",
                        id
                    )));
                }
                None => {
                    return Err(SettlementError::conflict(format!(
                        "transaction {} disappeared",
                        id
                    )));
                }
            },
            Guard::NoRevenueShares(id) => {
                if self.revenue_shares.get(id).is_some_and(|s| !s.is_empty()) {
                    return Err(SettlementError::conflict(format!(
                        "revenue shares already exist for transaction {}",
                        id
                    )));
                }
            }
            Guard::BookingUnchanged {
                id,
                status,
                payment_status,
            } => match self.bookings.get(id) {
                Some(booking)
                    if booking.status == *status && booking.payment_status == *payment_status => {}
                Some(booking) => {
                    return Err(SettlementError::conflict(format!(
                        "booking {} changed to {:?}/{:?}",
                        id, booking.status, booking.payment_status
                    )));
                }
                None => return Err(SettlementError::BookingNotFound(*id)),
            },
        }
        Ok(())
    }

    fn apply(&mut self, mutation: Mutation) -> Result<()> {
        match mutation {
            Mutation::PutTransaction(tx) => {
                if let Some(owner) = self.references.get(&tx.payment_reference)
                    && *owner != tx.id
                {
                    return Err(SettlementError::conflict(format!(
                        "payment reference {} belongs to another transaction",
                        tx.payment_reference
                    )));
                }
                if let Some(previous) = self.transactions.get(&tx.id)
                    && previous.payment_reference != tx.payment_reference
                {
                    self.references.remove(&previous.payment_reference);
                }
                self.references.insert(tx.payment_reference.clone(), tx.id);
                if let Some(gateway_id) = tx.gateway_transaction_id {
                    self.gateway_ids.insert(gateway_id, tx.id);
                }
                self.transactions.insert(tx.id, tx);
            }
            Mutation::PutBooking(booking) => {
                self.booking_numbers
                    .insert(booking.booking_number.clone(), booking.id);
                self.bookings.insert(booking.id, booking);
            }
            Mutation::PutOrder(order) => {
                self.order_numbers.insert(order.order_number.clone(), order.id);
                self.orders.insert(order.id, order);
            }
            Mutation::PutTour(tour) => {
                self.tours.insert(tour.id, tour);
            }
            Mutation::PutProduct(product) => {
                self.products.insert(product.id, product);
            }
            Mutation::PutSlot(slot) => {
                self.slots.insert(slot.id, slot);
            }
            Mutation::IncrementTourBookings(tour_id) => {
                let tour = self
                    .tours
                    .get_mut(&tour_id)
                    .ok_or(SettlementError::TourNotFound(tour_id))?;
                tour.booking_count += 1;
            }
            Mutation::ReleaseSlotSeats {
                slot_id,
                participants,
            } => {
                self.slots
                    .get_mut(&slot_id)
                    .ok_or(SettlementError::SlotNotFound(slot_id))?
                    .release(participants);
            }
            Mutation::InsertRevenueShare(share) => {
                self.revenue_shares
                    .entry(share.transaction_id)
                    .or_default()
                    .push(share);
            }
            Mutation::InsertRefund(refund) => {
                self.refunds.entry(refund.booking_id).or_default().push(refund);
            }
        }
        Ok(())
    }
}

/// A thread-safe in-memory implementation of the settlement store.
///
/// Every unit of work runs under the write lock against a staged copy of the
/// tables, which replaces the live tables only once all mutations succeeded.
/// Every commit clones all tables, so this is meant for tests, replays and
/// small local runs rather than production traffic.
#[derive(Default, Clone)]
pub struct InMemorySettlementStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemorySettlementStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transaction_count(&self) -> usize {
        self.tables.read().await.transactions.len()
    }

    pub async fn revenue_share_count(&self) -> usize {
        self.tables
            .read()
            .await
            .revenue_shares
            .values()
            .map(Vec::len)
            .sum()
    }
}

#[async_trait]
impl SettlementStore for InMemorySettlementStore {
    async fn transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<SettlementTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .references
            .get(reference)
            .and_then(|id| tables.transactions.get(id))
            .cloned())
    }

    async fn transaction_by_gateway_id(
        &self,
        gateway_id: u64,
    ) -> Result<Option<SettlementTransaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .gateway_ids
            .get(&gateway_id)
            .and_then(|id| tables.transactions.get(id))
            .cloned())
    }

    async fn booking(&self, id: Uuid) -> Result<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn booking_by_number(&self, number: &str) -> Result<Option<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .booking_numbers
            .get(number)
            .and_then(|id| tables.bookings.get(id))
            .cloned())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn order_by_number(&self, number: &str) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .order_numbers
            .get(number)
            .and_then(|id| tables.orders.get(id))
            .cloned())
    }

    async fn tour(&self, id: Uuid) -> Result<Option<Tour>> {
        Ok(self.tables.read().await.tours.get(&id).cloned())
    }

    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn slot(&self, id: Uuid) -> Result<Option<AvailabilitySlot>> {
        Ok(self.tables.read().await.slots.get(&id).cloned())
    }

    async fn revenue_shares(&self, transaction_id: Uuid) -> Result<Vec<RevenueShare>> {
        let tables = self.tables.read().await;
        Ok(tables
            .revenue_shares
            .get(&transaction_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn refunds_for_booking(&self, booking_id: Uuid) -> Result<Vec<Refund>> {
        let tables = self.tables.read().await;
        Ok(tables.refunds.get(&booking_id).cloned().unwrap_or_default())
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<()> {
        let mut tables = self.tables.write().await;
        let (guards, mutations) = unit.into_parts();
        for guard in &guards {
            tables.check(guard)?;
        }

        let mut staged = tables.clone();
        for mutation in mutations {
            staged.apply(mutation)?;
        }
        *tables = staged;
        Ok(())
    }
}

/// An event captured by [`InMemoryPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub channel: String,
    pub event: String,
    pub payload: serde_json::Value,
}

/// Records every published event; used by tests and local runs.
#[derive(Default, Clone)]
pub struct InMemoryPublisher {
    events: Arc<RwLock<Vec<PublishedEvent>>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<PublishedEvent> {
        self.events.read().await.clone()
    }

    pub async fn events_on(&self, channel: &str) -> Vec<PublishedEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.channel == channel)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RealtimePublisher for InMemoryPublisher {
    async fn publish_to_channel(
        &self,
        channel: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        self.events.write().await.push(PublishedEvent {
            channel: channel.to_string(),
            event: event.to_string(),
            payload,
        });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SentMail {
    BookingConfirmation { booking_number: String },
    OrderConfirmation { order_number: String },
}

/// Records confirmation mails instead of sending them.
#[derive(Default, Clone)]
pub struct InMemoryMailer {
    sent: Arc<RwLock<Vec<SentMail>>>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentMail> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send_booking_confirmation(
        &self,
        booking: &Booking,
        _transaction: &SettlementTransaction,
    ) -> Result<()> {
        self.sent.write().await.push(SentMail::BookingConfirmation {
            booking_number: booking.booking_number.clone(),
        });
        Ok(())
    }

    async fn send_order_confirmation(
        &self,
        order: &Order,
        _transaction: &SettlementTransaction,
    ) -> Result<()> {
        self.sent.write().await.push(SentMail::OrderConfirmation {
            order_number: order.order_number.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::TransactionStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn tour() -> Tour {
        Tour {
            id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            title: "Sapa trek".to_string(),
            booking_count: 0,
        }
    }

    #[tokio::test]
    async fn test_transaction_lookup_by_reference_and_gateway_id() {
        let store = InMemorySettlementStore::new();
        let mut tx = SettlementTransaction::pending("TK1", dec!(10), "VND", Utc::now());
        tx.complete(42, serde_json::json!({}), Utc::now());

        let mut unit = UnitOfWork::new();
        unit.push(Mutation::PutTransaction(tx.clone()));
        store.commit(unit).await.unwrap();

        let by_ref = store.transaction_by_reference("TK1").await.unwrap().unwrap();
        assert_eq!(by_ref, tx);
        let by_gateway = store.transaction_by_gateway_id(42).await.unwrap().unwrap();
        assert_eq!(by_gateway.status, TransactionStatus::Completed);
        assert!(store.transaction_by_reference("TK2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_guard_writes_nothing() {
        let store = InMemorySettlementStore::new();
        let tx = SettlementTransaction::pending("TK1", dec!(10), "VND", Utc::now());
        let mut unit = UnitOfWork::new();
        unit.push(Mutation::PutTransaction(tx.clone()));
        store.commit(unit).await.unwrap();

        let t = tour();
        let mut unit = UnitOfWork::new();
        unit.guard(Guard::ReferenceAbsent("TK1".to_string()))
            .push(Mutation::PutTour(t.clone()));
        let err = store.commit(unit).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(store.tour(t.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revenue_shares_are_written_once_per_transaction() {
        use crate::domain::revenue::{BeneficiaryRole, PayoutStatus, ShareEntityKind};

        let store = InMemorySettlementStore::new();
        let tx_id = Uuid::new_v4();
        let share = || RevenueShare {
            id: Uuid::new_v4(),
            transaction_id: tx_id,
            beneficiary_id: None,
            role: BeneficiaryRole::Platform,
            entity_id: Uuid::new_v4(),
            entity_kind: ShareEntityKind::Tour,
            gross_amount: dec!(100),
            commission_rate: dec!(0),
            commission_amount: dec!(0),
            net_amount: dec!(100),
            payout_status: PayoutStatus::Pending,
            created_at: Utc::now(),
        };

        let mut unit = UnitOfWork::new();
        unit.guard(Guard::NoRevenueShares(tx_id))
            .push(Mutation::InsertRevenueShare(share()));
        store.commit(unit).await.unwrap();

        let mut unit = UnitOfWork::new();
        unit.guard(Guard::NoRevenueShares(tx_id))
            .push(Mutation::InsertRevenueShare(share()));
        assert!(store.commit(unit).await.unwrap_err().is_conflict());
        assert_eq!(store.revenue_shares(tx_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_booking_guard_rejects_changed_booking() {
        use crate::domain::booking::{BookingStatus, PaymentStatus};

        let store = InMemorySettlementStore::new();
        let t = tour();
        let booking = Booking {
            id: Uuid::new_v4(),
            booking_number: "TK808080".to_string(),
            customer_id: Uuid::new_v4(),
            tour_id: t.id,
            slot_id: None,
            participants: 1,
            total_amount: dec!(100),
            currency: "VND".to_string(),
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            tour_date: Utc::now(),
            cancellation_reason: None,
            cancelled_at: None,
            refund: None,
        };
        let mut unit = UnitOfWork::new();
        unit.push(Mutation::PutBooking(booking.clone()));
        store.commit(unit).await.unwrap();

        let read = booking.clone();
        let mut cancelled = booking.clone();
        cancelled.cancel("weather", Utc::now());
        let mut unit = UnitOfWork::new();
        unit.guard(Guard::booking_unchanged(&read))
            .push(Mutation::PutBooking(cancelled));
        store.commit(unit).await.unwrap();

        // Still holds the pre-cancellation read
        let mut paid = read.clone();
        paid.confirm_payment();
        let mut unit = UnitOfWork::new();
        unit.guard(Guard::booking_unchanged(&read))
            .push(Mutation::PutBooking(paid));
        assert!(store.commit(unit).await.unwrap_err().is_conflict());
        assert!(store.booking(booking.id).await.unwrap().unwrap().is_cancelled());

        let mut unit = UnitOfWork::new();
        unit.guard(Guard::BookingUnchanged {
            id: Uuid::new_v4(),
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
        });
        assert!(matches!(
            store.commit(unit).await.unwrap_err(),
            SettlementError::BookingNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_failed_mutation_rolls_back_earlier_ones() {
        let store = InMemorySettlementStore::new();
        let t = tour();
        let mut unit = UnitOfWork::new();
        unit.push(Mutation::PutTour(t.clone()))
            .push(Mutation::IncrementTourBookings(Uuid::new_v4()));

        let err = store.commit(unit).await.unwrap_err();
        assert!(matches!(err, SettlementError::TourNotFound(_)));
        assert!(store.tour(t.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let store = InMemorySettlementStore::new();
        let first = SettlementTransaction::pending("ORD9", dec!(1), "VND", Utc::now());
        let second = SettlementTransaction::pending("ORD9", dec!(2), "VND", Utc::now());

        let mut unit = UnitOfWork::new();
        unit.push(Mutation::PutTransaction(first));
        store.commit(unit).await.unwrap();

        let mut unit = UnitOfWork::new();
        unit.push(Mutation::PutTransaction(second));
        assert!(store.commit(unit).await.unwrap_err().is_conflict());
        assert_eq!(store.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn test_counters() {
        let store = InMemorySettlementStore::new();
        let t = tour();
        let slot = AvailabilitySlot {
            id: Uuid::new_v4(),
            tour_id: t.id,
            capacity: 10,
            booked_participants: 4,
        };
        let mut unit = UnitOfWork::new();
        unit.push(Mutation::PutTour(t.clone()))
            .push(Mutation::PutSlot(slot.clone()))
            .push(Mutation::IncrementTourBookings(t.id))
            .push(Mutation::ReleaseSlotSeats {
                slot_id: slot.id,
                participants: 6,
            });
        store.commit(unit).await.unwrap();

        assert_eq!(store.tour(t.id).await.unwrap().unwrap().booking_count, 1);
        assert_eq!(store.slot(slot.id).await.unwrap().unwrap().booked_participants, 0);
    }

    #[tokio::test]
    async fn test_in_memory_publisher_records_events() {
        let publisher = InMemoryPublisher::new();
        publisher
            .publish_to_channel("admin-transactions", "transaction-updated", serde_json::json!({"a": 1}))
            .await
            .unwrap();
        publisher
            .publish_to_channel("payment-TK1", "payment-success", serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(publisher.events().await.len(), 2);
        let admin = publisher.events_on("admin-transactions").await;
        assert_eq!(admin.len(), 1);
        assert_eq!(admin[0].event, "transaction-updated");
    }
}
