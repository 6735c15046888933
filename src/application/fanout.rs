//! Best-effort announcement of completed settlements.
//!
//! Audiences: the paying customer's session (keyed by the public reference),
//! the admin channel, and every provider whose tour or products were paid for.
//! Nothing here can fail a settlement; errors and timeouts are logged.

use crate::application::ledger::Settlement;
use crate::application::resolver::SettlementSubject;
use crate::domain::ports::{MailerRef, PublisherRef};
use crate::error::Result;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

pub const ADMIN_CHANNEL: &str = "admin-transactions";
pub const PAYMENT_SUCCESS_EVENT: &str = "payment-success";
pub const TRANSACTION_UPDATED_EVENT: &str = "transaction-updated";

pub fn payment_channel(reference: &str) -> String {
    format!("payment-{}", reference)
}

pub fn provider_channel(provider_id: Uuid) -> String {
    format!("provider-{}", provider_id)
}

/// How many deliveries went through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: usize,
}

impl FanoutReport {
    fn record(&mut self, ok: bool) {
        if ok {
            self.delivered += 1;
        } else {
            self.failed += 1;
        }
    }
}

pub struct NotificationFanout {
    publisher: PublisherRef,
    mailer: MailerRef,
    timeout: Duration,
}

impl NotificationFanout {
    pub fn new(publisher: PublisherRef, mailer: MailerRef, timeout: Duration) -> Self {
        Self {
            publisher,
            mailer,
            timeout,
        }
    }

    pub async fn announce(&self, settlement: &Settlement) -> FanoutReport {
        let mut report = FanoutReport::default();
        let tx = &settlement.transaction;
        let payload = base_payload(settlement);

        let ok = self
            .publish(
                &payment_channel(&tx.payment_reference),
                PAYMENT_SUCCESS_EVENT,
                payload.clone(),
            )
            .await;
        report.record(ok);

        let ok = self
            .publish(ADMIN_CHANNEL, TRANSACTION_UPDATED_EVENT, payload.clone())
            .await;
        report.record(ok);

        if !settlement.confirmed {
            return report;
        }

        for provider_id in providers(&settlement.subject) {
            let mut provider_payload = payload.clone();
            provider_payload["netAmount"] = net_for(settlement, provider_id)
                .map(|net| json!(net))
                .unwrap_or(Value::Null);
            let ok = self
                .publish(
                    &provider_channel(provider_id),
                    TRANSACTION_UPDATED_EVENT,
                    provider_payload,
                )
                .await;
            report.record(ok);
        }

        let ok = match &settlement.subject {
            SettlementSubject::Booking { booking, .. } => {
                self.bounded(
                    "booking confirmation",
                    self.mailer.send_booking_confirmation(booking, tx),
                )
                .await
            }
            SettlementSubject::Order { order, .. } => {
                self.bounded(
                    "order confirmation",
                    self.mailer.send_order_confirmation(order, tx),
                )
                .await
            }
            SettlementSubject::Unlinked => return report,
        };
        report.record(ok);
        report
    }

    async fn publish(&self, channel: &str, event: &str, payload: Value) -> bool {
        self.bounded(
            event,
            self.publisher.publish_to_channel(channel, event, payload),
        )
        .await
    }

    async fn bounded<F>(&self, what: &str, delivery: F) -> bool
    where
        F: Future<Output = Result<()>>,
    {
        match timeout(self.timeout, delivery).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(what, error = %e, "delivery failed");
                false
            }
            Err(_) => {
                warn!(what, timeout_ms = self.timeout.as_millis() as u64, "delivery timed out");
                false
            }
        }
    }
}

fn base_payload(settlement: &Settlement) -> Value {
    let tx = &settlement.transaction;
    json!({
        "reference": tx.payment_reference,
        "transactionId": tx.id,
        "amount": tx.amount,
        "currency": tx.currency,
        "status": tx.status,
        "entityKind": tx.entity_kind,
        "entityId": tx.entity_id,
        "completedAt": tx.completed_at,
    })
}

/// Distinct providers in order of first appearance.
fn providers(subject: &SettlementSubject) -> Vec<Uuid> {
    match subject {
        SettlementSubject::Booking { tour, .. } => vec![tour.provider_id],
        SettlementSubject::Order { order, products } => {
            let mut seen = Vec::new();
            for item in &order.items {
                if let Some(product) = products.get(&item.product_id)
                    && !seen.contains(&product.provider_id)
                {
                    seen.push(product.provider_id);
                }
            }
            seen
        }
        SettlementSubject::Unlinked => Vec::new(),
    }
}

fn net_for(settlement: &Settlement, provider_id: Uuid) -> Option<Decimal> {
    let mut shares = settlement
        .shares
        .iter()
        .filter(|s| s.is_provider() && s.beneficiary_id == Some(provider_id))
        .peekable();
    shares.peek()?;
    Some(shares.map(|s| s.net_amount).sum())
}
