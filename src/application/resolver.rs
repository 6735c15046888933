use crate::domain::booking::{Booking, Tour};
use crate::domain::order::{Order, Product};
use crate::domain::payment_code::ReferenceKind;
use crate::domain::ports::SettlementStoreRef;
use crate::domain::transaction::{EntityKind, SettlementTransaction};
use crate::error::{Result, SettlementError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

const AMOUNT_TOLERANCE: Decimal = dec!(0.01);

/// The business entity a settlement transaction pays for, loaded with what
/// the revenue split and fan-out need.
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementSubject {
    Booking {
        booking: Booking,
        tour: Tour,
    },
    Order {
        order: Order,
        products: HashMap<Uuid, Product>,
    },
    /// Promotion payments and transactions without a linked entity.
    Unlinked,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved {
        transaction: SettlementTransaction,
        subject: SettlementSubject,
        /// The transaction was built here and is not persisted yet.
        is_new: bool,
    },
    Unresolved,
}

/// Locates the transaction, booking or order a payment reference belongs to.
pub struct EntityResolver {
    store: SettlementStoreRef,
    default_currency: String,
}

impl EntityResolver {
    pub fn new(store: SettlementStoreRef, default_currency: impl Into<String>) -> Self {
        Self {
            store,
            default_currency: default_currency.into(),
        }
    }

    /// Resolves `reference` to an existing transaction, or to a booking/order
    /// for which a new `pending` transaction of `received` is constructed.
    pub async fn resolve(
        &self,
        reference: &str,
        received: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Resolution> {
        if let Some(transaction) = self.store.transaction_by_reference(reference).await? {
            // A pending transaction keeps the amount it was created with and
            // that amount is what gets split. Whether the transfer should
            // overwrite it is still open with the product owner.
            if !transaction.is_completed() {
                warn_on_mismatch(reference, transaction.amount, received);
            }
            let subject = self.load_subject(&transaction).await?;
            return Ok(Resolution::Resolved {
                transaction,
                subject,
                is_new: false,
            });
        }

        let kind = ReferenceKind::of(reference);
        if matches!(kind, ReferenceKind::Booking | ReferenceKind::Unknown)
            && let Some(booking) = self.store.booking_by_number(reference).await?
        {
            warn_on_mismatch(reference, booking.total_amount, received);
            let tour = self.tour(booking.tour_id).await?;
            let transaction = SettlementTransaction::pending(
                reference,
                received,
                self.currency_or_default(&booking.currency),
                now,
            )
            .linked_to(EntityKind::Booking, booking.id, booking.customer_id);
            return Ok(Resolution::Resolved {
                transaction,
                subject: SettlementSubject::Booking { booking, tour },
                is_new: true,
            });
        }

        if matches!(kind, ReferenceKind::Order | ReferenceKind::Unknown)
            && let Some(order) = self.store.order_by_number(reference).await?
        {
            warn_on_mismatch(reference, order.total_amount, received);
            let products = self.products(&order).await?;
            let transaction = SettlementTransaction::pending(
                reference,
                received,
                self.currency_or_default(&order.currency),
                now,
            )
            .linked_to(EntityKind::Order, order.id, order.customer_id);
            return Ok(Resolution::Resolved {
                transaction,
                subject: SettlementSubject::Order { order, products },
                is_new: true,
            });
        }

        debug!(reference, "no transaction, booking or order matches reference");
        Ok(Resolution::Unresolved)
    }

    async fn load_subject(&self, transaction: &SettlementTransaction) -> Result<SettlementSubject> {
        match (transaction.entity_kind, transaction.entity_id) {
            (Some(EntityKind::Booking), Some(id)) => {
                let booking = self
                    .store
                    .booking(id)
                    .await?
                    .ok_or(SettlementError::BookingNotFound(id))?;
                let tour = self.tour(booking.tour_id).await?;
                Ok(SettlementSubject::Booking { booking, tour })
            }
            (Some(EntityKind::Order), Some(id)) => {
                let order = self
                    .store
                    .order(id)
                    .await?
                    .ok_or(SettlementError::OrderNotFound(id))?;
                let products = self.products(&order).await?;
                Ok(SettlementSubject::Order { order, products })
            }
            _ => Ok(SettlementSubject::Unlinked),
        }
    }

    async fn tour(&self, id: Uuid) -> Result<Tour> {
        self.store
            .tour(id)
            .await?
            .ok_or(SettlementError::TourNotFound(id))
    }

    async fn products(&self, order: &Order) -> Result<HashMap<Uuid, Product>> {
        let mut products = HashMap::new();
        for item in &order.items {
            if products.contains_key(&item.product_id) {
                continue;
            }
            let product = self
                .store
                .product(item.product_id)
                .await?
                .ok_or(SettlementError::ProductNotFound(item.product_id))?;
            products.insert(product.id, product);
        }
        Ok(products)
    }

    fn currency_or_default(&self, currency: &str) -> String {
        if currency.trim().is_empty() {
            self.default_currency.clone()
        } else {
            currency.to_string()
        }
    }
}

/// The transfer amount is authoritative; a mismatch is only worth a warning.
fn warn_on_mismatch(reference: &str, expected: Decimal, received: Decimal) {
    if (expected - received).abs() > AMOUNT_TOLERANCE {
        warn!(
            reference,
            %expected,
            %received,
            "transfer amount differs from recorded total"
        );
    }
}
