//! Catalog snapshot loader.
//!
//! Bookings, orders and their catalog live in other services; a seed file
//! gives a standalone deployment (or a replay run) the entities that payment
//! references resolve to.

use crate::domain::booking::{AvailabilitySlot, Booking, Tour};
use crate::domain::order::{Order, Product};
use crate::domain::payment_code::ReferenceKind;
use crate::domain::ports::{Mutation, SettlementStore, UnitOfWork};
use crate::error::{Result, SettlementError};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSeed {
    pub tours: Vec<Tour>,
    pub slots: Vec<AvailabilitySlot>,
    pub bookings: Vec<Booking>,
    pub products: Vec<Product>,
    pub orders: Vec<Order>,
}

impl CatalogSeed {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let mut seed: CatalogSeed = serde_json::from_reader(source)?;
        seed.normalize();
        seed.validate()?;
        Ok(seed)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Payment references are matched in upper case.
    fn normalize(&mut self) {
        for booking in &mut self.bookings {
            booking.booking_number = booking.booking_number.trim().to_uppercase();
        }
        for order in &mut self.orders {
            order.order_number = order.order_number.trim().to_uppercase();
        }
    }

    fn validate(&self) -> Result<()> {
        let mut numbers = HashSet::new();
        for booking in &self.bookings {
            if ReferenceKind::of(&booking.booking_number) != ReferenceKind::Booking {
                return Err(SettlementError::ValidationError(format!(
                    "booking number {} does not look like a booking reference",
                    booking.booking_number
                )));
            }
            if !self.tours.iter().any(|t| t.id == booking.tour_id) {
                return Err(SettlementError::TourNotFound(booking.tour_id));
            }
            if !numbers.insert(booking.booking_number.as_str()) {
                return Err(SettlementError::ValidationError(format!(
                    "duplicate booking number {}",
                    booking.booking_number
                )));
            }
        }
        for order in &self.orders {
            if ReferenceKind::of(&order.order_number) != ReferenceKind::Order {
                return Err(SettlementError::ValidationError(format!(
                    "order number {} does not look like an order reference",
                    order.order_number
                )));
            }
            if !numbers.insert(order.order_number.as_str()) {
                return Err(SettlementError::ValidationError(format!(
                    "duplicate order number {}",
                    order.order_number
                )));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.tours.is_empty()
            && self.slots.is_empty()
            && self.bookings.is_empty()
            && self.products.is_empty()
            && self.orders.is_empty()
    }

    /// Writes the whole snapshot in one unit of work.
    pub async fn apply(self, store: &dyn SettlementStore) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let counts = (
            self.tours.len(),
            self.bookings.len(),
            self.products.len(),
            self.orders.len(),
        );

        let mut unit = UnitOfWork::new();
        self.tours
            .into_iter()
            .map(Mutation::PutTour)
            .chain(self.slots.into_iter().map(Mutation::PutSlot))
            .chain(self.bookings.into_iter().map(Mutation::PutBooking))
            .chain(self.products.into_iter().map(Mutation::PutProduct))
            .chain(self.orders.into_iter().map(Mutation::PutOrder))
            .for_each(|mutation| {
                unit.push(mutation);
            });
        store.commit(unit).await?;

        info!(
            tours = counts.0,
            bookings = counts.1,
            products = counts.2,
            orders = counts.3,
            "catalog seeded"
        );
        Ok(())
    }
}
