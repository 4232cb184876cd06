use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Basis points in 100%.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Money amount represented as **integer minor units** (cents).
///
/// Balances, commissions and withdrawal amounts are all stored as `i64`
/// minor units; this wrapper is the boundary type used to parse and print
/// them.
///
/// # Examples
///
/// ```rust
/// use engine::MoneyCents;
///
/// let amount = MoneyCents::new(12_34);
/// assert_eq!(amount.cents(), 1234);
/// assert_eq!(amount.to_string(), "12.34");
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects >
/// 2 decimals):
///
/// ```rust
/// use engine::MoneyCents;
///
/// assert_eq!("10".parse::<MoneyCents>().unwrap().cents(), 1000);
/// assert_eq!("10,5".parse::<MoneyCents>().unwrap().cents(), 1050);
/// assert!("12.345".parse::<MoneyCents>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for MoneyCents {
    type Err = EngineError;

    /// Parses a decimal string into cents.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let empty = || EngineError::InvalidAmount("empty amount".to_string());
        let invalid = || EngineError::InvalidAmount("invalid amount".to_string());
        let overflow = || EngineError::InvalidAmount("amount too large".to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (true, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (false, stripped)
        } else {
            (false, trimmed)
        };

        let rest = rest.trim().replace(',', ".");
        if rest.is_empty() {
            return Err(empty());
        }

        let (units_str, fraction) = match rest.split_once('.') {
            Some((units, fraction)) => (units, Some(fraction)),
            None => (rest.as_str(), None),
        };

        if units_str.is_empty() || !units_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let units: i64 = units_str.parse().map_err(|_| overflow())?;

        let cents: i64 = match fraction {
            None | Some("") => 0,
            Some(frac) if !frac.chars().all(|c| c.is_ascii_digit()) => return Err(invalid()),
            Some(frac) if frac.len() == 1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            Some(frac) if frac.len() == 2 => frac.parse::<i64>().map_err(|_| invalid())?,
            Some(_) => return Err(EngineError::InvalidAmount("too many decimals".to_string())),
        };

        let total = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(overflow)?;

        Ok(MoneyCents(if negative { -total } else { total }))
    }
}

/// A percentage expressed in basis points (`1000` = 10%).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(u32);

impl Rate {
    #[must_use]
    pub const fn from_bps(bps: u32) -> Self {
        Self(bps)
    }

    #[must_use]
    pub const fn bps(self) -> u32 {
        self.0
    }

    /// Applies the rate to an amount in minor units, rounding toward zero.
    ///
    /// The product is computed in `i128`, so any `i64` amount and any rate up
    /// to 100% fits.
    #[must_use]
    pub fn apply(self, amount_minor: i64) -> i64 {
        let scaled = i128::from(amount_minor) * i128::from(self.0) / i128::from(BPS_DENOMINATOR);
        // |scaled| <= |amount_minor| whenever the rate is at most 100%.
        i64::try_from(scaled).unwrap_or(if scaled < 0 { i64::MIN } else { i64::MAX })
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
