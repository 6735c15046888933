use crate::domain::booking::PaymentStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// A marketplace order; its items may come from several vendors.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

impl Order {
    pub fn mark_paid(&mut self) {
        self.status = OrderStatus::Processing;
        self.payment_status = PaymentStatus::Paid;
    }

    pub fn items_subtotal(&self) -> Decimal {
        self.items.iter().map(|item| item.subtotal).sum()
    }
}

/// A catalog product and the vendor who sells it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Product {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
}
