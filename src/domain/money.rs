use crate::error::{Result, SettlementError};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Rounds a monetary value half-up (midpoint away from zero) to 2 decimal places.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Represents a strictly positive transfer amount.
///
/// Gateway notifications carrying a zero or negative amount never reach the
/// ledger; they are rejected as malformed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(SettlementError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }
}

/// Platform commission taken from a provider's gross share, as a fraction in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct CommissionRate(Decimal);

impl CommissionRate {
    pub fn new(rate: Decimal) -> Result<Self> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(SettlementError::InvalidConfiguration(format!(
                "commission rate must be between 0 and 1, got {}",
                rate
            )));
        }
        Ok(Self(rate))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Commission owed on `gross`, rounded once from the unrounded product.
    pub fn commission_on(&self, gross: Decimal) -> Decimal {
        round_money(gross * self.0)
    }
}

impl Default for CommissionRate {
    fn default() -> Self {
        Self(dec!(0.15))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(SettlementError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(SettlementError::ValidationError(_))
        ));
    }

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(1.004)), dec!(1.00));
        assert_eq!(round_money(dec!(-1.005)), dec!(-1.01));
        assert_eq!(round_money(dec!(2.5)), dec!(2.50));
    }

    #[test]
    fn test_commission_rate_bounds() {
        assert!(CommissionRate::new(dec!(0)).is_ok());
        assert!(CommissionRate::new(dec!(1)).is_ok());
        assert!(matches!(
            CommissionRate::new(dec!(1.01)),
            Err(SettlementError::InvalidConfiguration(_))
        ));
        assert!(CommissionRate::new(dec!(-0.1)).is_err());
    }

    #[test]
    fn test_commission_on_rounds_once() {
        let rate = CommissionRate::default();
        assert_eq!(rate.commission_on(dec!(4000000)), dec!(600000.00));
        // 33.33 * 0.15 = 4.9995 -> 5.00
        assert_eq!(rate.commission_on(dec!(33.33)), dec!(5.00));
        // 0.03 * 0.15 = 0.0045 -> 0.00
        assert_eq!(rate.commission_on(dec!(0.03)), dec!(0.00));
    }
}
