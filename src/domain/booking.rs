use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Refunded,
}

/// Where a cancelled booking's refund should be paid out.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct RefundDetails {
    pub bank_name: String,
    pub bank_account_number: String,
    pub account_holder: String,
    pub refunded_amount: Decimal,
    pub requested_at: Option<DateTime<Utc>>,
}

/// A customer's reservation of seats on a tour slot.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Booking {
    pub id: Uuid,
    pub booking_number: String,
    pub customer_id: Uuid,
    pub tour_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub participants: u32,
    pub total_amount: Decimal,
    pub currency: String,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub tour_date: DateTime<Utc>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refund: Option<RefundDetails>,
}

impl Booking {
    /// Marks the booking as paid and confirmed.
    pub fn confirm_payment(&mut self) {
        self.status = BookingStatus::Confirmed;
        self.payment_status = PaymentStatus::Paid;
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn cancel(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = BookingStatus::Cancelled;
        self.cancellation_reason = Some(reason.into());
        self.cancelled_at = Some(now);
    }
}

/// A tour offered by a provider (tour guide).
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Tour {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub booking_count: u32,
}

/// A dated departure of a tour with a participant counter.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub capacity: u32,
    #[serde(default)]
    pub booked_participants: u32,
}

impl AvailabilitySlot {
    /// Frees `participants` seats, never going below zero.
    pub fn release(&mut self, participants: u32) {
        self.booked_participants = self.booked_participants.saturating_sub(participants);
    }
}
