//! Amount in fen (1/100 yuan) with conversions to provider formats.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PayError;

/// Non-negative amount stored in fen.
///
/// Entities carry fen, most providers want a two-decimal yuan string, a few
/// (Wechat, Wtpay, Xfpay) want fen.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Creates an amount from fen.
    pub fn from_fen(fen: i64) -> Result<Self, PayError> {
        if fen < 0 {
            return Err(PayError::InvalidArgument("Amount cannot be negative".into()));
        }
        Ok(Self(fen))
    }

    /// Parses a decimal yuan string (`"12.34"`) into fen without float rounding.
    pub fn from_yuan(yuan: &str) -> Result<Self, PayError> {
        let value = Decimal::from_str(yuan.trim())
            .map_err(|_| PayError::InvalidArgument(format!("Invalid yuan amount [{}]", yuan)))?;
        if value.normalize().scale() > 2 {
            return Err(PayError::InvalidArgument(format!(
                "Yuan amount has more than two decimals [{}]",
                yuan
            )));
        }
        let fen = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|fen| fen.to_i64())
            .ok_or_else(|| PayError::InvalidArgument(format!("Amount out of range [{}]", yuan)))?;
        Self::from_fen(fen)
    }

    pub fn fen(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Two-decimal yuan string, e.g. `1234` fen is `"12.34"`.
    pub fn to_yuan(&self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl TryFrom<i64> for Amount {
    type Error = PayError;

    fn try_from(fen: i64) -> Result<Self, Self::Error> {
        Amount::from_fen(fen)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "¥{}", self.to_yuan())
    }
}
