use crate::domain::money::CommissionRate;
use crate::error::{Result, SettlementError};
use rust_decimal::Decimal;
use std::time::Duration;

pub const DEFAULT_CURRENCY: &str = "VND";
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Settings for the settlement pipeline.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Platform commission applied to every provider share.
    pub commission_rate: CommissionRate,
    /// Currency stamped on transactions whose entity carries none.
    pub currency: String,
    /// Upper bound for each real-time publish or confirmation mail.
    pub publish_timeout: Duration,
    /// How many times a unit of work is re-resolved after a concurrent update.
    pub max_conflict_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commission_rate: CommissionRate::default(),
            currency: DEFAULT_CURRENCY.to_string(),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

impl EngineConfig {
    pub fn with_commission_rate(mut self, rate: Decimal) -> Result<Self> {
        self.commission_rate = CommissionRate::new(rate)?;
        Ok(self)
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Result<Self> {
        let currency = currency.into().trim().to_uppercase();
        if currency.is_empty() {
            return Err(SettlementError::InvalidConfiguration(
                "currency must not be empty".to_string(),
            ));
        }
        self.currency = currency;
        Ok(self)
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.commission_rate.value(), dec!(0.15));
        assert_eq!(config.currency, "VND");
        assert_eq!(config.publish_timeout, Duration::from_secs(5));
        assert_eq!(config.max_conflict_retries, 3);
    }

    #[test]
    fn test_builder_validation() {
        let config = EngineConfig::default()
            .with_commission_rate(dec!(0.2))
            .unwrap()
            .with_currency(" usd ")
            .unwrap();
        assert_eq!(config.commission_rate.value(), dec!(0.2));
        assert_eq!(config.currency, "USD");

        assert!(matches!(
            EngineConfig::default().with_commission_rate(dec!(2)),
            Err(SettlementError::InvalidConfiguration(_))
        ));
        assert!(EngineConfig::default().with_currency("  ").is_err());
    }
}
