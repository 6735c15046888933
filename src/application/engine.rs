use crate::application::fanout::NotificationFanout;
use crate::application::ledger::{
    Completion, GatewayReceipt, PendingSettlement, Settlement, SettlementLedger,
};
use crate::application::resolver::{EntityResolver, Resolution, SettlementSubject};
use crate::config::EngineConfig;
use crate::domain::notification::GatewayNotification;
use crate::domain::payment_code::extract_payment_reference;
use crate::domain::ports::{MailerRef, PublisherRef, SettlementStoreRef};
use crate::domain::revenue::{RevenueShare, RevenueSplitter};
use crate::domain::transaction::{EntityKind, SettlementTransaction};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifies the transaction a webhook call settled (or had already settled).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    pub transaction_id: Uuid,
    pub payment_reference: String,
    pub booking_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub amount: Decimal,
    pub processed_at: DateTime<Utc>,
}

impl SettlementReceipt {
    fn of(tx: &SettlementTransaction, now: DateTime<Utc>) -> Self {
        let entity = |kind: EntityKind| {
            if tx.entity_kind == Some(kind) {
                tx.entity_id
            } else {
                None
            }
        };
        Self {
            transaction_id: tx.id,
            payment_reference: tx.payment_reference.clone(),
            booking_id: entity(EntityKind::Booking),
            order_id: entity(EntityKind::Order),
            amount: tx.amount,
            processed_at: tx.completed_at.unwrap_or(now),
        }
    }
}

/// Business result of one gateway notification. None of these are errors.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Completed(SettlementReceipt),
    AlreadyProcessed(SettlementReceipt),
    Skipped { reason: String },
    Unresolved { reference: Option<String> },
}

impl WebhookOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            WebhookOutcome::Completed(_) | WebhookOutcome::AlreadyProcessed(_)
        )
    }

    pub fn receipt(&self) -> Option<&SettlementReceipt> {
        match self {
            WebhookOutcome::Completed(receipt) | WebhookOutcome::AlreadyProcessed(receipt) => {
                Some(receipt)
            }
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            WebhookOutcome::Completed(_) => "payment processed".to_string(),
            WebhookOutcome::AlreadyProcessed(_) => "already processed".to_string(),
            WebhookOutcome::Skipped { reason } => format!("skipped: {}", reason),
            WebhookOutcome::Unresolved { reference: None } => {
                "no payment reference found in transfer content".to_string()
            }
            WebhookOutcome::Unresolved {
                reference: Some(reference),
            } => format!("no booking or order matches payment reference {}", reference),
        }
    }
}

/// The main entry point for settling gateway notifications.
///
/// `SettlementEngine` runs each notification through an explicit pipeline:
/// extract the payment reference, resolve it, split revenue, complete the
/// ledger entry (one unit of work covering transaction, entity and revenue),
/// and finally announce the result on a best-effort basis.
pub struct SettlementEngine {
    store: SettlementStoreRef,
    resolver: EntityResolver,
    ledger: SettlementLedger,
    splitter: RevenueSplitter,
    fanout: NotificationFanout,
    max_conflict_retries: u32,
}

impl SettlementEngine {
    /// Creates a new `SettlementEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence for transactions, entities and revenue shares.
    /// * `publisher` - Real-time channel used for settlement events.
    /// * `mailer` - Sends confirmation mails after settlement.
    /// * `config` - Commission rate, currency and delivery bounds.
    pub fn new(
        store: SettlementStoreRef,
        publisher: PublisherRef,
        mailer: MailerRef,
        config: &EngineConfig,
    ) -> Self {
        Self {
            resolver: EntityResolver::new(store.clone(), config.currency.clone()),
            ledger: SettlementLedger::new(store.clone()),
            splitter: RevenueSplitter::new(config.commission_rate),
            fanout: NotificationFanout::new(publisher, mailer, config.publish_timeout),
            max_conflict_retries: config.max_conflict_retries,
            store,
        }
    }

    pub async fn process_notification(
        &self,
        notification: GatewayNotification,
    ) -> Result<WebhookOutcome> {
        self.process_notification_at(notification, Utc::now()).await
    }

    /// Processes a notification as if received at `now`.
    pub async fn process_notification_at(
        &self,
        notification: GatewayNotification,
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome> {
        notification.validate()?;

        // Only incoming transfers fund bookings and orders
        if !notification.is_incoming() {
            debug!(gateway_id = notification.id, "skipping outgoing transfer");
            return Ok(WebhookOutcome::Skipped {
                reason: "outgoing transfer".to_string(),
            });
        }

        if let Some(tx) = self.store.transaction_by_gateway_id(notification.id).await?
            && tx.is_completed()
        {
            info!(
                gateway_id = notification.id,
                reference = %tx.payment_reference,
                "gateway transfer already processed"
            );
            return Ok(WebhookOutcome::AlreadyProcessed(SettlementReceipt::of(&tx, now)));
        }

        let Some(reference) =
            extract_payment_reference(&notification.content, notification.code.as_deref())
        else {
            warn!(
                gateway_id = notification.id,
                content = %notification.content,
                "no payment reference in transfer"
            );
            return Ok(WebhookOutcome::Unresolved { reference: None });
        };

        let payload = notification.audit_payload()?;
        let mut attempt = 0;
        let settlement = loop {
            let pending = match self
                .resolver
                .resolve(&reference, notification.transfer_amount, now)
                .await?
            {
                Resolution::Unresolved => {
                    warn!(reference = %reference, "unresolved payment reference");
                    return Ok(WebhookOutcome::Unresolved {
                        reference: Some(reference),
                    });
                }
                Resolution::Resolved {
                    transaction,
                    subject,
                    is_new,
                } => PendingSettlement {
                    transaction,
                    subject,
                    is_new,
                },
            };

            if pending.transaction.is_completed() {
                info!(reference = %reference, "payment reference already processed");
                return Ok(WebhookOutcome::AlreadyProcessed(SettlementReceipt::of(
                    &pending.transaction,
                    now,
                )));
            }

            let shares = self
                .split_revenue(&pending.transaction, &pending.subject, now)
                .await?;
            let receipt = GatewayReceipt {
                gateway_transaction_id: notification.id,
                payload: payload.clone(),
            };

            match self.ledger.complete(pending, receipt, shares, now).await {
                Ok(Completion::Settled(settlement)) => break settlement,
                Ok(Completion::AlreadyCompleted(tx)) => {
                    return Ok(WebhookOutcome::AlreadyProcessed(SettlementReceipt::of(&tx, now)));
                }
                Err(e) if e.is_conflict() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    debug!(
                        reference = %reference,
                        attempt,
                        error = %e,
                        "retrying after concurrent update"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        log_settlement(&settlement);
        let report = self.fanout.announce(&settlement).await;
        if report.failed > 0 {
            warn!(
                reference = %reference,
                delivered = report.delivered,
                failed = report.failed,
                "some settlement notifications were not delivered"
            );
        }

        Ok(WebhookOutcome::Completed(SettlementReceipt::of(
            &settlement.transaction,
            now,
        )))
    }

    /// Revenue shares for a transaction about to complete, or none if some
    /// were already recorded for it.
    async fn split_revenue(
        &self,
        transaction: &SettlementTransaction,
        subject: &SettlementSubject,
        now: DateTime<Utc>,
    ) -> Result<Vec<RevenueShare>> {
        if !self.store.revenue_shares(transaction.id).await?.is_empty() {
            debug!(transaction_id = %transaction.id, "revenue already split");
            return Ok(Vec::new());
        }
        match subject {
            SettlementSubject::Booking { booking, .. } if booking.is_cancelled() => Ok(Vec::new()),
            SettlementSubject::Booking { booking, tour } => {
                Ok(self.splitter.split_booking(transaction, booking, tour, now))
            }
            SettlementSubject::Order { order, products } => {
                self.splitter.split_order(transaction, order, products, now)
            }
            SettlementSubject::Unlinked => Ok(Vec::new()),
        }
    }
}

fn log_settlement(settlement: &Settlement) {
    let tx = &settlement.transaction;
    info!(
        reference = %tx.payment_reference,
        transaction_id = %tx.id,
        amount = %tx.amount,
        entity_kind = ?tx.entity_kind,
        shares = settlement.shares.len(),
        confirmed = settlement.confirmed,
        "payment settled"
    );
}
