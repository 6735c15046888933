use crate::domain::money::Amount;
use crate::error::{Result, SettlementError};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const GATEWAY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    In,
    Out,
}

/// A bank-transfer notification as delivered by the payment gateway webhook.
///
/// Deliveries are at-least-once: the same `id` may arrive several times.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GatewayNotification {
    /// Gateway-side transfer id.
    pub id: u64,
    pub gateway: String,
    pub transfer_type: TransferDirection,
    pub transfer_amount: Decimal,
    /// Free-text transfer memo.
    #[serde(default)]
    pub content: String,
    /// Structured payment code, when the gateway recognised one.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub sub_account: Option<String>,
    #[serde(default)]
    pub reference_code: Option<String>,
    #[serde(
        default,
        serialize_with = "serialize_gateway_date",
        deserialize_with = "deserialize_gateway_date"
    )]
    pub transaction_date: Option<NaiveDateTime>,
}

fn serialize_gateway_date<S>(
    date: &Option<NaiveDateTime>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match date {
        Some(date) => serializer.serialize_str(&date.format(GATEWAY_DATE_FORMAT).to_string()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_gateway_date<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(raw) => NaiveDateTime::parse_from_str(&raw, GATEWAY_DATE_FORMAT)
            .or_else(|_| raw.parse::<chrono::DateTime<chrono::Utc>>().map(|d| d.naive_utc()))
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl GatewayNotification {
    /// Checks the fields serde cannot: a non-zero id, a named gateway and a positive amount.
    pub fn validate(&self) -> Result<()> {
        if self.id == 0 {
            return Err(SettlementError::MalformedNotification(
                "missing gateway transaction id".to_string(),
            ));
        }
        if self.gateway.trim().is_empty() {
            return Err(SettlementError::MalformedNotification(
                "missing gateway name".to_string(),
            ));
        }
        Amount::new(self.transfer_amount)
            .map_err(|_| {
                SettlementError::MalformedNotification(format!(
                    "transfer amount must be positive, got {}",
                    self.transfer_amount
                ))
            })
            .map(|_| ())
    }

    pub fn is_incoming(&self) -> bool {
        self.transfer_type == TransferDirection::In
    }

    /// The notification as a JSON value, kept on the ledger entry for audit.
    pub fn audit_payload(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
