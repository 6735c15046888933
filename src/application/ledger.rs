use crate::application::resolver::SettlementSubject;
use crate::domain::ports::{Guard, Mutation, SettlementStoreRef, UnitOfWork};
use crate::domain::revenue::RevenueShare;
use crate::domain::transaction::SettlementTransaction;
use crate::error::Result;
use chrono::{DateTime, Utc};
use tracing::warn;

/// A resolved transaction waiting to be completed.
#[derive(Debug, Clone)]
pub struct PendingSettlement {
    pub transaction: SettlementTransaction,
    pub subject: SettlementSubject,
    /// Not persisted yet; completion inserts it.
    pub is_new: bool,
}

/// What the gateway told us about the transfer, kept on the ledger entry.
#[derive(Debug, Clone)]
pub struct GatewayReceipt {
    pub gateway_transaction_id: u64,
    pub payload: serde_json::Value,
}

/// A transaction that really moved to `completed` in this call.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub transaction: SettlementTransaction,
    pub subject: SettlementSubject,
    pub shares: Vec<RevenueShare>,
    /// False when the money landed on a cancelled booking, which stays as it was.
    pub confirmed: bool,
}

#[derive(Debug, Clone)]
pub enum Completion {
    Settled(Settlement),
    AlreadyCompleted(SettlementTransaction),
}

/// The single idempotency boundary of the settlement pipeline.
pub struct SettlementLedger {
    store: SettlementStoreRef,
}

impl SettlementLedger {
    pub fn new(store: SettlementStoreRef) -> Self {
        Self { store }
    }

    /// Completes the transaction, confirms its booking or order and records
    /// `shares`, all in one unit of work.
    ///
    /// The unit is guarded so that a concurrent completion of the same
    /// reference, or a booking cancelled since it was read, surfaces as
    /// `SettlementError::Conflict` instead of overwriting the other write.
    ///
    /// A payment for an already cancelled booking is still recorded, but the
    /// booking, its tour counter and its revenue are left alone.
    pub async fn complete(
        &self,
        pending: PendingSettlement,
        receipt: GatewayReceipt,
        mut shares: Vec<RevenueShare>,
        now: DateTime<Utc>,
    ) -> Result<Completion> {
        let PendingSettlement {
            mut transaction,
            mut subject,
            is_new,
        } = pending;

        if !transaction.complete(receipt.gateway_transaction_id, receipt.payload, now) {
            return Ok(Completion::AlreadyCompleted(transaction));
        }

        let mut unit = UnitOfWork::new();
        if is_new {
            unit.guard(Guard::ReferenceAbsent(transaction.payment_reference.clone()));
        } else {
            unit.guard(Guard::TransactionPending(transaction.id));
        }
        unit.push(Mutation::PutTransaction(transaction.clone()));

        let mut confirmed = true;
        match &mut subject {
            SettlementSubject::Booking { booking, tour } => {
                unit.guard(Guard::booking_unchanged(booking));
                if booking.is_cancelled() {
                    warn!(
                        reference = %transaction.payment_reference,
                        booking_number = %booking.booking_number,
                        amount = %transaction.amount,
                        "payment received for cancelled booking, refund it manually"
                    );
                    confirmed = false;
                    shares.clear();
                } else {
                    booking.confirm_payment();
                    tour.booking_count += 1;
                    unit.push(Mutation::PutBooking(booking.clone()))
                        .push(Mutation::IncrementTourBookings(tour.id));
                }
            }
            SettlementSubject::Order { order, .. } => {
                order.mark_paid();
                unit.push(Mutation::PutOrder(order.clone()));
            }
            SettlementSubject::Unlinked => {}
        }

        if !shares.is_empty() {
            unit.guard(Guard::NoRevenueShares(transaction.id));
            for share in &shares {
                unit.push(Mutation::InsertRevenueShare(share.clone()));
            }
        }

        self.store.commit(unit).await?;

        Ok(Completion::Settled(Settlement {
            transaction,
            subject,
            shares,
            confirmed,
        }))
    }
}
