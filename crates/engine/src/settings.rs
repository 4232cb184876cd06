//! Finance knobs supplied by the configuration collaborator.
//!
//! The engine never reads files or the environment itself; callers build a
//! [`FinanceSettings`] (usually deserialized with the `config` crate) and
//! hand it to [`EngineBuilder::settings`](crate::EngineBuilder::settings).

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{EngineError, Rate, ResultEngine, money::BPS_DENOMINATOR};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceSettings {
    /// Commission paid to the consumer's direct referrer, in basis points.
    pub direct_rate_bps: u32,
    /// Commission paid to the referrer's own parent, in basis points.
    pub indirect_rate_bps: u32,
    /// Smallest amount accepted by a withdrawal request, in minor units.
    pub min_withdrawal_minor: i64,
    /// Fee withheld from every withdrawal, in basis points.
    pub withdrawal_fee_bps: u32,
    /// Age a pending commission must reach before batch settlement picks it up.
    pub settlement_delay_days: u32,
}

impl Default for FinanceSettings {
    fn default() -> Self {
        Self {
            direct_rate_bps: 1_000,
            indirect_rate_bps: 500,
            min_withdrawal_minor: 100,
            withdrawal_fee_bps: 0,
            settlement_delay_days: 7,
        }
    }
}

impl FinanceSettings {
    pub fn direct_rate(&self) -> Rate {
        Rate::from_bps(self.direct_rate_bps)
    }

    pub fn indirect_rate(&self) -> Rate {
        Rate::from_bps(self.indirect_rate_bps)
    }

    pub fn withdrawal_fee_rate(&self) -> Rate {
        Rate::from_bps(self.withdrawal_fee_bps)
    }

    pub fn settlement_delay(&self) -> Duration {
        Duration::days(i64::from(self.settlement_delay_days))
    }

    pub fn validate(&self) -> ResultEngine<()> {
        for (label, bps) in [
            ("direct_rate_bps", self.direct_rate_bps),
            ("indirect_rate_bps", self.indirect_rate_bps),
            ("withdrawal_fee_bps", self.withdrawal_fee_bps),
        ] {
            if bps > BPS_DENOMINATOR {
                return Err(EngineError::InvalidParameter(format!(
                    "{label} must be <= {BPS_DENOMINATOR}"
                )));
            }
        }
        if self.direct_rate_bps + self.indirect_rate_bps > BPS_DENOMINATOR {
            return Err(EngineError::InvalidParameter(
                "direct and indirect rates exceed 100%".to_string(),
            ));
        }
        if self.min_withdrawal_minor < 0 {
            return Err(EngineError::InvalidParameter(
                "min_withdrawal_minor must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(FinanceSettings::default().validate().is_ok());
    }

    #[test]
    fn rejects_rates_over_full_amount() {
        let settings = FinanceSettings {
            direct_rate_bps: 8_000,
            indirect_rate_bps: 3_000,
            ..Default::default()
        };
        assert_eq!(
            settings.validate(),
            Err(EngineError::InvalidParameter(
                "direct and indirect rates exceed 100%".to_string()
            ))
        );

        let settings = FinanceSettings {
            withdrawal_fee_bps: 10_001,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn deserializes_partial_input_with_defaults() {
        let settings: FinanceSettings =
            serde_json::from_str(r#"{"direct_rate_bps": 1200}"#).unwrap();
        assert_eq!(settings.direct_rate_bps, 1200);
        assert_eq!(settings.indirect_rate_bps, 500);
        assert_eq!(settings.settlement_delay(), Duration::days(7));
    }
}
