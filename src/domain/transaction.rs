use crate::domain::notification::TransferDirection;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
}

/// The business entity a settlement transaction pays for.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum EntityKind {
    Booking,
    Order,
    Promotion,
}

/// One incoming money movement, pending until a gateway notification settles it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct SettlementTransaction {
    pub id: Uuid,
    /// Booking or order number; unique across all transactions.
    pub payment_reference: String,
    pub user_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub direction: TransferDirection,
    pub status: TransactionStatus,
    pub entity_id: Option<Uuid>,
    pub entity_kind: Option<EntityKind>,
    pub gateway_transaction_id: Option<u64>,
    pub gateway_payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SettlementTransaction {
    pub fn pending(
        payment_reference: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_reference: payment_reference.into(),
            user_id: None,
            amount,
            currency: currency.into(),
            direction: TransferDirection::In,
            status: TransactionStatus::Pending,
            entity_id: None,
            entity_kind: None,
            gateway_transaction_id: None,
            gateway_payload: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn linked_to(mut self, kind: EntityKind, entity_id: Uuid, user_id: Uuid) -> Self {
        self.entity_kind = Some(kind);
        self.entity_id = Some(entity_id);
        self.user_id = Some(user_id);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// Moves the transaction to `completed`.
    ///
    /// Returns `false` without touching anything when it already was; callers
    /// must only run downstream work on a `true` result.
    pub fn complete(
        &mut self,
        gateway_transaction_id: u64,
        gateway_payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> bool {
        if self.is_completed() {
            return false;
        }
        self.status = TransactionStatus::Completed;
        self.gateway_transaction_id = Some(gateway_transaction_id);
        self.gateway_payload = Some(gateway_payload);
        self.completed_at = Some(now);
        self.updated_at = now;
        true
    }
}
