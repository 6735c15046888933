//! Revenue shares and the splitter that produces them.
//!
//! Every completed transaction yields platform rows that record the full
//! flow-through and provider rows that carry the net payout after commission.

use crate::domain::booking::{Booking, Tour};
use crate::domain::money::CommissionRate;
use crate::domain::order::{Order, OrderItem, Product};
use crate::domain::transaction::SettlementTransaction;
use crate::error::{Result, SettlementError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum BeneficiaryRole {
    Platform,
    Provider,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum ShareEntityKind {
    Tour,
    Booking,
    Product,
    Order,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    #[default]
    Pending,
    Paid,
    OnHold,
}

/// One beneficiary's portion of a completed transaction.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct RevenueShare {
    pub id: Uuid,
    pub transaction_id: Uuid,
    /// `None` for platform rows.
    pub beneficiary_id: Option<Uuid>,
    pub role: BeneficiaryRole,
    pub entity_id: Uuid,
    pub entity_kind: ShareEntityKind,
    pub gross_amount: Decimal,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub net_amount: Decimal,
    pub payout_status: PayoutStatus,
    pub created_at: DateTime<Utc>,
}

impl RevenueShare {
    fn platform(
        transaction_id: Uuid,
        entity_kind: ShareEntityKind,
        entity_id: Uuid,
        gross: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            beneficiary_id: None,
            role: BeneficiaryRole::Platform,
            entity_id,
            entity_kind,
            gross_amount: gross,
            commission_rate: Decimal::ZERO,
            commission_amount: Decimal::ZERO,
            net_amount: gross,
            payout_status: PayoutStatus::Pending,
            created_at: now,
        }
    }

    fn provider(
        transaction_id: Uuid,
        provider_id: Uuid,
        entity_kind: ShareEntityKind,
        entity_id: Uuid,
        gross: Decimal,
        rate: CommissionRate,
        now: DateTime<Utc>,
    ) -> Self {
        let commission = rate.commission_on(gross);
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            beneficiary_id: Some(provider_id),
            role: BeneficiaryRole::Provider,
            entity_id,
            entity_kind,
            gross_amount: gross,
            commission_rate: rate.value(),
            commission_amount: commission,
            net_amount: gross - commission,
            payout_status: PayoutStatus::Pending,
            created_at: now,
        }
    }

    pub fn is_provider(&self) -> bool {
        self.role == BeneficiaryRole::Provider
    }
}

/// Splits completed transactions into platform and provider shares.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevenueSplitter {
    rate: CommissionRate,
}

impl RevenueSplitter {
    pub fn new(rate: CommissionRate) -> Self {
        Self { rate }
    }

    /// One platform row against the tour and one provider row for the tour's guide.
    ///
    /// The gross is the amount actually received, not the booking's recorded total.
    pub fn split_booking(
        &self,
        transaction: &SettlementTransaction,
        booking: &Booking,
        tour: &Tour,
        now: DateTime<Utc>,
    ) -> Vec<RevenueShare> {
        let gross = transaction.amount;
        vec![
            RevenueShare::platform(transaction.id, ShareEntityKind::Tour, tour.id, gross, now),
            RevenueShare::provider(
                transaction.id,
                tour.provider_id,
                ShareEntityKind::Booking,
                booking.id,
                gross,
                self.rate,
                now,
            ),
        ]
    }

    /// One platform row per distinct product and one provider row per distinct vendor.
    ///
    /// `products` must contain every product referenced by the order's items.
    pub fn split_order(
        &self,
        transaction: &SettlementTransaction,
        order: &Order,
        products: &HashMap<Uuid, Product>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RevenueShare>> {
        let by_product = group_subtotals(&order.items, |item| Ok(item.product_id))?;
        let by_provider = group_subtotals(&order.items, |item| {
            products
                .get(&item.product_id)
                .map(|product| product.provider_id)
                .ok_or(SettlementError::ProductNotFound(item.product_id))
        })?;

        let platform_rows = by_product.into_iter().map(|(product_id, gross)| {
            RevenueShare::platform(
                transaction.id,
                ShareEntityKind::Product,
                product_id,
                gross,
                now,
            )
        });
        let provider_rows = by_provider.into_iter().map(|(provider_id, gross)| {
            RevenueShare::provider(
                transaction.id,
                provider_id,
                ShareEntityKind::Order,
                order.id,
                gross,
                self.rate,
                now,
            )
        });

        Ok(platform_rows.chain(provider_rows).collect())
    }
}

/// Sums item subtotals per key, keeping keys in order of first appearance.
fn group_subtotals<F>(items: &[OrderItem], key_of: F) -> Result<Vec<(Uuid, Decimal)>>
where
    F: Fn(&OrderItem) -> Result<Uuid>,
{
    let mut groups: Vec<(Uuid, Decimal)> = Vec::new();
    for item in items {
        let key = key_of(item)?;
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, sum)) => *sum += item.subtotal,
            None => groups.push((key, item.subtotal)),
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{BookingStatus, PaymentStatus};
    use crate::domain::order::OrderStatus;
    use rust_decimal_macros::dec;

    fn booking_fixture() -> (SettlementTransaction, Booking, Tour) {
        let tour = Tour {
            id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            title: "Ha Long Bay".to_string(),
            booking_count: 0,
        };
        let booking = Booking {
            id: Uuid::new_v4(),
            booking_number: "TK20251104001".to_string(),
            customer_id: Uuid::new_v4(),
            tour_id: tour.id,
            slot_id: None,
            participants: 2,
            total_amount: dec!(4000000),
            currency: "VND".to_string(),
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            tour_date: Utc::now(),
            cancellation_reason: None,
            cancelled_at: None,
            refund: None,
        };
        let tx = SettlementTransaction::pending("TK20251104001", dec!(4000000), "VND", Utc::now());
        (tx, booking, tour)
    }

    #[test]
    fn test_booking_split() {
        let (tx, booking, tour) = booking_fixture();
        let shares = RevenueSplitter::default().split_booking(&tx, &booking, &tour, Utc::now());

        assert_eq!(shares.len(), 2);
        let platform = &shares[0];
        assert_eq!(platform.role, BeneficiaryRole::Platform);
        assert_eq!(platform.entity_kind, ShareEntityKind::Tour);
        assert_eq!(platform.gross_amount, dec!(4000000));
        assert_eq!(platform.net_amount, dec!(4000000));
        assert_eq!(platform.commission_amount, Decimal::ZERO);

        let provider = &shares[1];
        assert_eq!(provider.beneficiary_id, Some(tour.provider_id));
        assert_eq!(provider.entity_kind, ShareEntityKind::Booking);
        assert_eq!(provider.entity_id, booking.id);
        assert_eq!(provider.commission_amount, dec!(600000));
        assert_eq!(provider.net_amount, dec!(3400000));
    }

    #[test]
    fn test_booking_split_uses_received_amount() {
        let (mut tx, booking, tour) = booking_fixture();
        tx.amount = dec!(333.33);
        let shares = RevenueSplitter::new(CommissionRate::new(dec!(0.1)).unwrap())
            .split_booking(&tx, &booking, &tour, Utc::now());

        assert_eq!(shares[1].gross_amount, dec!(333.33));
        // 33.333 -> 33.33
        assert_eq!(shares[1].commission_amount, dec!(33.33));
        assert_eq!(shares[1].net_amount, dec!(300.00));
        assert_eq!(shares[1].commission_rate, dec!(0.1));
    }

    #[test]
    fn test_multi_vendor_order_split() {
        let vendor_a = Uuid::new_v4();
        let vendor_b = Uuid::new_v4();
        let hat = Product { id: Uuid::new_v4(), provider_id: vendor_a, name: "Hat".into() };
        let bag = Product { id: Uuid::new_v4(), provider_id: vendor_a, name: "Bag".into() };
        let tea = Product { id: Uuid::new_v4(), provider_id: vendor_b, name: "Tea".into() };
        let item = |product: &Product, subtotal: Decimal| OrderItem {
            product_id: product.id,
            quantity: 1,
            unit_price: subtotal,
            subtotal,
        };
        let order = Order {
            id: Uuid::new_v4(),
            order_number: "ORD77".to_string(),
            customer_id: Uuid::new_v4(),
            items: vec![
                item(&hat, dec!(100)),
                item(&tea, dec!(50.05)),
                item(&bag, dec!(200)),
                item(&hat, dec!(100)),
            ],
            total_amount: dec!(450.05),
            currency: "VND".to_string(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
        };
        let products: HashMap<Uuid, Product> = [hat.clone(), bag.clone(), tea.clone()]
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let tx = SettlementTransaction::pending("ORD77", dec!(450.05), "VND", Utc::now());

        let shares = RevenueSplitter::default()
            .split_order(&tx, &order, &products, Utc::now())
            .unwrap();

        let platform: Vec<_> = shares.iter().filter(|s| !s.is_provider()).collect();
        let providers: Vec<_> = shares.iter().filter(|s| s.is_provider()).collect();
        assert_eq!(platform.len(), 3);
        assert_eq!(providers.len(), 2);

        assert_eq!(platform[0].entity_id, hat.id);
        assert_eq!(platform[0].gross_amount, dec!(200));
        assert_eq!(platform[1].entity_id, tea.id);
        assert_eq!(platform[2].entity_id, bag.id);

        let a = providers.iter().find(|s| s.beneficiary_id == Some(vendor_a)).unwrap();
        assert_eq!(a.gross_amount, dec!(400));
        assert_eq!(a.commission_amount, dec!(60.00));
        assert_eq!(a.net_amount, dec!(340.00));
        assert_eq!(a.entity_id, order.id);

        let b = providers.iter().find(|s| s.beneficiary_id == Some(vendor_b)).unwrap();
        assert_eq!(b.gross_amount, dec!(50.05));
        // 7.5075 -> 7.51
        assert_eq!(b.commission_amount, dec!(7.51));
        assert_eq!(b.net_amount, dec!(42.54));

        let provider_gross: Decimal = providers.iter().map(|s| s.gross_amount).sum();
        assert_eq!(provider_gross, order.items_subtotal());
        assert!(shares.iter().all(|s| s.transaction_id == tx.id));
    }

    #[test]
    fn test_order_split_missing_product() {
        let order = Order {
            id: Uuid::new_v4(),
            order_number: "ORD1".to_string(),
            customer_id: Uuid::new_v4(),
            items: vec![OrderItem {
                product_id: Uuid::new_v4(),
                quantity: 1,
                unit_price: dec!(1),
                subtotal: dec!(1),
            }],
            total_amount: dec!(1),
            currency: "VND".to_string(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
        };
        let tx = SettlementTransaction::pending("ORD1", dec!(1), "VND", Utc::now());
        let result = RevenueSplitter::default().split_order(&tx, &order, &HashMap::new(), Utc::now());
        assert!(matches!(result, Err(SettlementError::ProductNotFound(_))));
    }
}
