#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tour_settlement::application::engine::SettlementEngine;
use tour_settlement::config::EngineConfig;
use tour_settlement::domain::booking::{
    AvailabilitySlot, Booking, BookingStatus, PaymentStatus, Tour,
};
use tour_settlement::domain::notification::{GatewayNotification, TransferDirection};
use tour_settlement::domain::order::{Order, OrderItem, OrderStatus, Product};
use tour_settlement::domain::ports::{Mutation, SettlementStore, UnitOfWork};
use tour_settlement::infrastructure::in_memory::{
    InMemoryMailer, InMemoryPublisher, InMemorySettlementStore,
};
use uuid::Uuid;

pub struct Harness {
    pub store: Arc<InMemorySettlementStore>,
    pub publisher: Arc<InMemoryPublisher>,
    pub mailer: Arc<InMemoryMailer>,
    pub engine: Arc<SettlementEngine>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(InMemorySettlementStore::new());
        let publisher = Arc::new(InMemoryPublisher::new());
        let mailer = Arc::new(InMemoryMailer::new());
        let engine = Arc::new(SettlementEngine::new(
            store.clone(),
            publisher.clone(),
            mailer.clone(),
            &config,
        ));
        Self {
            store,
            publisher,
            mailer,
            engine,
        }
    }

    pub async fn put(&self, mutations: Vec<Mutation>) {
        let mut unit = UnitOfWork::new();
        for mutation in mutations {
            unit.push(mutation);
        }
        self.store.commit(unit).await.unwrap();
    }

    /// Stores a tour and one of its bookings.
    pub async fn seed_booking(&self, booking: &Booking, tour: &Tour) {
        self.put(vec![
            Mutation::PutTour(tour.clone()),
            Mutation::PutBooking(booking.clone()),
        ])
        .await;
    }

    pub async fn seed_order(&self, order: &Order, products: &[Product]) {
        let mut mutations: Vec<Mutation> =
            products.iter().cloned().map(Mutation::PutProduct).collect();
        mutations.push(Mutation::PutOrder(order.clone()));
        self.put(mutations).await;
    }
}

pub fn tour(provider_id: Uuid) -> Tour {
    Tour {
        id: Uuid::new_v4(),
        provider_id,
        title: "Ha Giang loop".to_string(),
        booking_count: 0,
    }
}

pub fn booking(number: &str, tour: &Tour, total: Decimal, tour_date: DateTime<Utc>) -> Booking {
    Booking {
        id: Uuid::new_v4(),
        booking_number: number.to_string(),
        customer_id: Uuid::new_v4(),
        tour_id: tour.id,
        slot_id: None,
        participants: 2,
        total_amount: total,
        currency: "VND".to_string(),
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Unpaid,
        tour_date,
        cancellation_reason: None,
        cancelled_at: None,
        refund: None,
    }
}

pub fn paid(mut booking: Booking) -> Booking {
    booking.status = BookingStatus::Confirmed;
    booking.payment_status = PaymentStatus::Paid;
    booking
}

pub fn slot_for(tour: &Tour, booked: u32) -> AvailabilitySlot {
    AvailabilitySlot {
        id: Uuid::new_v4(),
        tour_id: tour.id,
        capacity: 20,
        booked_participants: booked,
    }
}

pub fn product(provider_id: Uuid, name: &str) -> Product {
    Product {
        id: Uuid::new_v4(),
        provider_id,
        name: name.to_string(),
    }
}

pub fn item(product: &Product, quantity: u32, unit_price: Decimal) -> OrderItem {
    OrderItem {
        product_id: product.id,
        quantity,
        unit_price,
        subtotal: unit_price * Decimal::from(quantity),
    }
}

pub fn order(number: &str, items: Vec<OrderItem>) -> Order {
    let total_amount = items.iter().map(|i| i.subtotal).sum();
    Order {
        id: Uuid::new_v4(),
        order_number: number.to_string(),
        customer_id: Uuid::new_v4(),
        items,
        total_amount,
        currency: "VND".to_string(),
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Unpaid,
    }
}

pub fn incoming(id: u64, amount: Decimal, content: &str) -> GatewayNotification {
    GatewayNotification {
        id,
        gateway: "Vietcombank".to_string(),
        transfer_type: TransferDirection::In,
        transfer_amount: amount,
        content: content.to_string(),
        code: None,
        account_number: Some("0071000888888".to_string()),
        sub_account: None,
        reference_code: Some(format!("FT{}", id)),
        transaction_date: None,
    }
}

pub fn days_from(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now + Duration::days(days)
}

pub const BOOKING_TOTAL: Decimal = dec!(4000000);
