use crate::domain::booking::Booking;
use crate::domain::money::round_money;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SECONDS_PER_DAY: i64 = 86_400;
const FULL_REFUND_DAYS: i64 = 7;
const PARTIAL_REFUND_DAYS: i64 = 1;

/// Whole days left before the tour, rounded towards negative infinity.
///
/// A tour that started yesterday yields `-1`, one starting in 23 hours yields `0`.
pub fn days_before_tour(tour_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (tour_date - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Refund percentage granted for a cancellation `days_before_tour` days ahead.
///
/// | days      | refund |
/// |-----------|--------|
/// | >= 7      | 100 %  |
/// | 1 ..< 7   | 50 %   |
/// | < 1       | none   |
pub fn refund_percentage(days_before_tour: i64) -> u8 {
    if days_before_tour >= FULL_REFUND_DAYS {
        100
    } else if days_before_tour >= PARTIAL_REFUND_DAYS {
        50
    } else {
        0
    }
}

/// What cancelling a booking right now would refund.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct RefundQuote {
    pub days_before_tour: i64,
    pub percentage: u8,
    pub can_refund: bool,
    pub original_amount: Decimal,
    pub refund_amount: Decimal,
}

impl RefundQuote {
    pub fn for_booking(booking: &Booking, now: DateTime<Utc>) -> Self {
        let days = days_before_tour(booking.tour_date, now);
        let percentage = refund_percentage(days);
        Self {
            days_before_tour: days,
            percentage,
            can_refund: percentage > 0,
            original_amount: booking.total_amount,
            refund_amount: round_money(
                booking.total_amount * Decimal::from(percentage) / Decimal::ONE_HUNDRED,
            ),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum RefundStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Rejected,
}

/// A refund owed to a customer after a cancellation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Refund {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: RefundStatus,
    pub bank_name: String,
    pub bank_account_number: String,
    pub account_holder: String,
    pub reason: String,
    pub days_before_tour: i64,
    pub refund_percentage: u8,
    pub original_amount: Decimal,
    pub notes: Option<String>,
    pub requested_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{BookingStatus, PaymentStatus};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_days_before_tour_floors() {
        let now = now();
        assert_eq!(days_before_tour(now + Duration::days(7), now), 7);
        assert_eq!(
            days_before_tour(now + Duration::days(6) + Duration::hours(23), now),
            6
        );
        assert_eq!(days_before_tour(now + Duration::hours(23), now), 0);
        assert_eq!(days_before_tour(now, now), 0);
        assert_eq!(days_before_tour(now - Duration::hours(1), now), -1);
    }

    #[test]
    fn test_policy_boundaries() {
        assert_eq!(refund_percentage(30), 100);
        assert_eq!(refund_percentage(7), 100);
        assert_eq!(refund_percentage(6), 50);
        assert_eq!(refund_percentage(1), 50);
        assert_eq!(refund_percentage(0), 0);
        assert_eq!(refund_percentage(-3), 0);
    }

    #[test]
    fn test_quote_for_booking() {
        let now = now();
        let mut booking = Booking {
            id: Uuid::new_v4(),
            booking_number: "TK1".to_string(),
            customer_id: Uuid::new_v4(),
            tour_id: Uuid::new_v4(),
            slot_id: None,
            participants: 1,
            total_amount: dec!(1000.01),
            currency: "VND".to_string(),
            status: BookingStatus::Confirmed,
            payment_status: PaymentStatus::Paid,
            tour_date: now + Duration::days(6) + Duration::hours(23),
            cancellation_reason: None,
            cancelled_at: None,
            refund: None,
        };

        let quote = RefundQuote::for_booking(&booking, now);
        assert_eq!(quote.days_before_tour, 6);
        assert_eq!(quote.percentage, 50);
        assert!(quote.can_refund);
        // 500.005 -> 500.01
        assert_eq!(quote.refund_amount, dec!(500.01));

        booking.tour_date = now + Duration::days(7);
        assert_eq!(RefundQuote::for_booking(&booking, now).refund_amount, dec!(1000.01));

        booking.tour_date = now;
        let quote = RefundQuote::for_booking(&booking, now);
        assert!(!quote.can_refund);
        assert_eq!(quote.refund_amount, Decimal::ZERO);
    }
}
