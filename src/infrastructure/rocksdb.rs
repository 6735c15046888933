use crate::domain::booking::{AvailabilitySlot, Booking, Tour};
use crate::domain::order::{Order, Product};
use crate::domain::ports::{Guard, Mutation, SettlementStore, UnitOfWork};
use crate::domain::refund::Refund;
use crate::domain::revenue::RevenueShare;
use crate::domain::transaction::SettlementTransaction;
use crate::error::{Result, SettlementError};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Settlement transactions keyed by id.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Payment reference -> transaction id.
pub const CF_REFERENCES: &str = "references";
/// Gateway transfer id -> transaction id.
pub const CF_GATEWAY_IDS: &str = "gateway_ids";
pub const CF_BOOKINGS: &str = "bookings";
pub const CF_BOOKING_NUMBERS: &str = "booking_numbers";
pub const CF_ORDERS: &str = "orders";
pub const CF_ORDER_NUMBERS: &str = "order_numbers";
pub const CF_TOURS: &str = "tours";
pub const CF_PRODUCTS: &str = "products";
pub const CF_SLOTS: &str = "slots";
/// Transaction id -> every revenue share recorded for it.
pub const CF_REVENUE_SHARES: &str = "revenue_shares";
/// Booking id -> every refund requested for it.
pub const CF_REFUNDS: &str = "refunds";

const COLUMN_FAMILIES: [&str; 12] = [
    CF_TRANSACTIONS,
    CF_REFERENCES,
    CF_GATEWAY_IDS,
    CF_BOOKINGS,
    CF_BOOKING_NUMBERS,
    CF_ORDERS,
    CF_ORDER_NUMBERS,
    CF_TOURS,
    CF_PRODUCTS,
    CF_SLOTS,
    CF_REVENUE_SHARES,
    CF_REFUNDS,
];

type Key = (&'static str, Vec<u8>);

/// A persistent settlement store backed by RocksDB.
///
/// Entities are stored as JSON, one column family per table plus index
/// families for the lookups by reference and number. Commits are serialized
/// by a mutex and land as a single `WriteBatch`, so a unit of work is
/// applied entirely or not at all.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            SettlementError::InternalError(Box::new(std::io::Error::other(format!(
                "column family {} not found",
                name
            ))))
        })
    }

    fn read<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_pinned_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn read_indexed<T: DeserializeOwned>(
        &self,
        index: &str,
        table: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        match self.read::<Uuid>(index, key)? {
            Some(id) => self.read(table, id.as_bytes()),
            None => Ok(None),
        }
    }
}

/// Pending writes of one commit, readable before they hit the database.
struct Staged<'a> {
    store: &'a RocksDBStore,
    writes: HashMap<Key, Option<Vec<u8>>>,
}

impl<'a> Staged<'a> {
    fn new(store: &'a RocksDBStore) -> Self {
        Self {
            store,
            writes: HashMap::new(),
        }
    }

    fn get<T: DeserializeOwned>(&self, cf: &'static str, key: &[u8]) -> Result<Option<T>> {
        match self.writes.get(&(cf, key.to_vec())) {
            Some(Some(bytes)) => Ok(Some(serde_json::from_slice(bytes)?)),
            Some(None) => Ok(None),
            None => self.store.read(cf, key),
        }
    }

    fn put<T: Serialize>(&mut self, cf: &'static str, key: &[u8], value: &T) -> Result<()> {
        self.writes
            .insert((cf, key.to_vec()), Some(serde_json::to_vec(value)?));
        Ok(())
    }

    fn delete(&mut self, cf: &'static str, key: &[u8]) {
        self.writes.insert((cf, key.to_vec()), None);
    }

    fn check(&self, guard: &Guard) -> Result<()> {
        match guard {
            Guard::ReferenceAbsent(reference) => {
                if self.get::<Uuid>(CF_REFERENCES, reference.as_bytes())?.is_some() {
                    return Err(SettlementError::conflict(format!(
                        "payment reference {} already exists",
                        reference
                    )));
                }
            }
            Guard::TransactionPending(id) => {
                match self.get::<SettlementTransaction>(CF_TRANSACTIONS, id.as_bytes())? {
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
                }
            }
            Guard::NoRevenueShares(id) => {
                let shares: Vec<RevenueShare> = self
                    .get(CF_REVENUE_SHARES, id.as_bytes())?
                    .unwrap_or_default();
                if !shares.is_empty() {
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
            } => match self.get::<Booking>(CF_BOOKINGS, id.as_bytes())? {
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
                let reference = tx.payment_reference.as_bytes();
                if let Some(owner) = self.get::<Uuid>(CF_REFERENCES, reference)?
                    && owner != tx.id
                {
                    return Err(SettlementError::conflict(format!(
                        "payment reference {} belongs to another transaction",
                        tx.payment_reference
                    )));
                }
                if let Some(previous) =
                    self.get::<SettlementTransaction>(CF_TRANSACTIONS, tx.id.as_bytes())?
                    && previous.payment_reference != tx.payment_reference
                {
                    self.delete(CF_REFERENCES, previous.payment_reference.as_bytes());
                }
                self.put(CF_REFERENCES, reference, &tx.id)?;
                if let Some(gateway_id) = tx.gateway_transaction_id {
                    self.put(CF_GATEWAY_IDS, &gateway_id.to_be_bytes(), &tx.id)?;
                }
                self.put(CF_TRANSACTIONS, tx.id.as_bytes(), &tx)?;
            }
            Mutation::PutBooking(booking) => {
                self.put(
                    CF_BOOKING_NUMBERS,
                    booking.booking_number.as_bytes(),
                    &booking.id,
                )?;
                self.put(CF_BOOKINGS, booking.id.as_bytes(), &booking)?;
            }
            Mutation::PutOrder(order) => {
                self.put(CF_ORDER_NUMBERS, order.order_number.as_bytes(), &order.id)?;
                self.put(CF_ORDERS, order.id.as_bytes(), &order)?;
            }
            Mutation::PutTour(tour) => self.put(CF_TOURS, tour.id.as_bytes(), &tour)?,
            Mutation::PutProduct(product) => {
                self.put(CF_PRODUCTS, product.id.as_bytes(), &product)?
            }
            Mutation::PutSlot(slot) => self.put(CF_SLOTS, slot.id.as_bytes(), &slot)?,
            Mutation::IncrementTourBookings(tour_id) => {
                let mut tour: Tour = self
                    .get(CF_TOURS, tour_id.as_bytes())?
                    .ok_or(SettlementError::TourNotFound(tour_id))?;
                tour.booking_count += 1;
                self.put(CF_TOURS, tour_id.as_bytes(), &tour)?;
            }
            Mutation::ReleaseSlotSeats {
                slot_id,
                participants,
            } => {
                let mut slot: AvailabilitySlot = self
                    .get(CF_SLOTS, slot_id.as_bytes())?
                    .ok_or(SettlementError::SlotNotFound(slot_id))?;
                slot.release(participants);
                self.put(CF_SLOTS, slot_id.as_bytes(), &slot)?;
            }
            Mutation::InsertRevenueShare(share) => {
                let key = share.transaction_id;
                let mut shares: Vec<RevenueShare> = self
                    .get(CF_REVENUE_SHARES, key.as_bytes())?
                    .unwrap_or_default();
                shares.push(share);
                self.put(CF_REVENUE_SHARES, key.as_bytes(), &shares)?;
            }
            Mutation::InsertRefund(refund) => {
                let key = refund.booking_id;
                let mut refunds: Vec<Refund> =
                    self.get(CF_REFUNDS, key.as_bytes())?.unwrap_or_default();
                refunds.push(refund);
                self.put(CF_REFUNDS, key.as_bytes(), &refunds)?;
            }
        }
        Ok(())
    }

    fn into_batch(self) -> Result<WriteBatch> {
        let mut batch = WriteBatch::default();
        for ((cf, key), value) in self.writes {
            let handle = self.store.cf(cf)?;
            match value {
                Some(bytes) => batch.put_cf(handle, key, bytes),
                None => batch.delete_cf(handle, key),
            }
        }
        Ok(batch)
    }
}

#[async_trait]
impl SettlementStore for RocksDBStore {
    async fn transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<SettlementTransaction>> {
        self.read_indexed(CF_REFERENCES, CF_TRANSACTIONS, reference.as_bytes())
    }

    async fn transaction_by_gateway_id(
        &self,
        gateway_id: u64,
    ) -> Result<Option<SettlementTransaction>> {
        self.read_indexed(CF_GATEWAY_IDS, CF_TRANSACTIONS, &gateway_id.to_be_bytes())
    }

    async fn booking(&self, id: Uuid) -> Result<Option<Booking>> {
        self.read(CF_BOOKINGS, id.as_bytes())
    }

    async fn booking_by_number(&self, number: &str) -> Result<Option<Booking>> {
        self.read_indexed(CF_BOOKING_NUMBERS, CF_BOOKINGS, number.as_bytes())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>> {
        self.read(CF_ORDERS, id.as_bytes())
    }

    async fn order_by_number(&self, number: &str) -> Result<Option<Order>> {
        self.read_indexed(CF_ORDER_NUMBERS, CF_ORDERS, number.as_bytes())
    }

    async fn tour(&self, id: Uuid) -> Result<Option<Tour>> {
        self.read(CF_TOURS, id.as_bytes())
    }

    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        self.read(CF_PRODUCTS, id.as_bytes())
    }

    async fn slot(&self, id: Uuid) -> Result<Option<AvailabilitySlot>> {
        self.read(CF_SLOTS, id.as_bytes())
    }

    async fn revenue_shares(&self, transaction_id: Uuid) -> Result<Vec<RevenueShare>> {
        Ok(self
            .read(CF_REVENUE_SHARES, transaction_id.as_bytes())?
            .unwrap_or_default())
    }

    async fn refunds_for_booking(&self, booking_id: Uuid) -> Result<Vec<Refund>> {
        Ok(self
            .read(CF_REFUNDS, booking_id.as_bytes())?
            .unwrap_or_default())
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<()> {
        let _guard = self.commit_lock.lock().await;
        let (guards, mutations) = unit.into_parts();

        let mut staged = Staged::new(self);
        for guard in &guards {
            staged.check(guard)?;
        }
        for mutation in mutations {
            staged.apply(mutation)?;
        }
        let batch = staged.into_batch()?;
        self.db.write(batch)?;
        Ok(())
    }
}
