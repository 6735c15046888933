use crate::domain::booking::{Booking, BookingStatus, RefundDetails};
use crate::domain::ports::{Guard, Mutation, SettlementStoreRef, UnitOfWork};
use crate::domain::refund::{Refund, RefundQuote, RefundStatus};
use crate::error::{Result, SettlementError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct CancelBookingRequest {
    pub booking_id: Uuid,
    pub requested_by: Uuid,
    pub reason: String,
    pub bank_name: String,
    pub bank_account_number: String,
    pub account_holder: String,
    pub notes: Option<String>,
    /// Fail instead of cancelling when the policy grants no refund.
    pub require_refund: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancellationOutcome {
    pub booking: Booking,
    pub refund: Option<Refund>,
    pub quote: RefundQuote,
}

/// Cancels bookings under the tiered refund policy.
pub struct CancellationService {
    store: SettlementStoreRef,
}

impl CancellationService {
    pub fn new(store: SettlementStoreRef) -> Self {
        Self { store }
    }

    pub async fn preview_refund(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RefundQuote> {
        let booking = self.load(booking_id).await?;
        Ok(RefundQuote::for_booking(&booking, now))
    }

    /// Cancels a booking in a single unit of work.
    ///
    /// When the policy allows a refund the slot's seats are released, and a
    /// paid booking also gets its refund details and a `Pending` refund row.
    /// Any failure leaves the booking, slot and refunds untouched.
    pub async fn cancel_booking(
        &self,
        request: CancelBookingRequest,
        now: DateTime<Utc>,
    ) -> Result<CancellationOutcome> {
        let mut booking = self.load(request.booking_id).await?;
        match booking.status {
            BookingStatus::Cancelled => return Err(SettlementError::AlreadyCancelled(booking.id)),
            BookingStatus::Completed => {
                return Err(SettlementError::InvalidBookingState {
                    id: booking.id,
                    status: booking.status,
                });
            }
            BookingStatus::Pending | BookingStatus::Confirmed => {}
        }
        if request.reason.trim().is_empty() {
            return Err(SettlementError::ValidationError(
                "cancellation reason is required".to_string(),
            ));
        }

        let quote = RefundQuote::for_booking(&booking, now);
        if request.require_refund && !quote.can_refund {
            return Err(SettlementError::RefundNotAllowed {
                days_before_tour: quote.days_before_tour,
            });
        }

        let owes_refund = quote.can_refund && booking.is_paid();
        if owes_refund {
            validate_payout_details(&request)?;
        }

        let mut unit = UnitOfWork::new();
        unit.guard(Guard::booking_unchanged(&booking));
        booking.cancel(request.reason.clone(), now);

        let mut refund = None;
        if quote.can_refund {
            if owes_refund {
                booking.refund = Some(RefundDetails {
                    bank_name: request.bank_name.clone(),
                    bank_account_number: request.bank_account_number.clone(),
                    account_holder: request.account_holder.clone(),
                    refunded_amount: quote.refund_amount,
                    requested_at: Some(now),
                });
                let row = new_refund(&booking, &request, &quote, now);
                unit.push(Mutation::InsertRefund(row.clone()));
                refund = Some(row);
            }
            if let Some(slot_id) = booking.slot_id {
                unit.push(Mutation::ReleaseSlotSeats {
                    slot_id,
                    participants: booking.participants,
                });
            }
        }
        unit.push(Mutation::PutBooking(booking.clone()));

        if let Err(e) = self.store.commit(unit).await {
            // A payment may have landed since the booking was read
            if e.is_conflict() && self.load(booking.id).await?.is_cancelled() {
                return Err(SettlementError::AlreadyCancelled(booking.id));
            }
            return Err(e);
        }

        info!(
            booking_number = %booking.booking_number,
            days_before_tour = quote.days_before_tour,
            percentage = quote.percentage,
            refund_amount = %quote.refund_amount,
            "booking cancelled"
        );

        Ok(CancellationOutcome {
            booking,
            refund,
            quote,
        })
    }

    async fn load(&self, booking_id: Uuid) -> Result<Booking> {
        self.store
            .booking(booking_id)
            .await?
            .ok_or(SettlementError::BookingNotFound(booking_id))
    }
}

fn validate_payout_details(request: &CancelBookingRequest) -> Result<()> {
    let missing: Vec<&str> = [
        ("bank_name", &request.bank_name),
        ("bank_account_number", &request.bank_account_number),
        ("account_holder", &request.account_holder),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SettlementError::ValidationError(format!(
            "refund payout details missing: {}",
            missing.join(", ")
        )))
    }
}

fn new_refund(
    booking: &Booking,
    request: &CancelBookingRequest,
    quote: &RefundQuote,
    now: DateTime<Utc>,
) -> Refund {
    Refund {
        id: Uuid::new_v4(),
        booking_id: booking.id,
        amount: quote.refund_amount,
        currency: booking.currency.clone(),
        status: RefundStatus::Pending,
        bank_name: request.bank_name.clone(),
        bank_account_number: request.bank_account_number.clone(),
        account_holder: request.account_holder.clone(),
        reason: request.reason.clone(),
        days_before_tour: quote.days_before_tour,
        refund_percentage: quote.percentage,
        original_amount: quote.original_amount,
        notes: request.notes.clone(),
        requested_by: request.requested_by,
        created_at: now,
        updated_at: now,
    }
}
