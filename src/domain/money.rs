use crate::error::CollectionError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A positive KRW amount.
///
/// Wrapper around `rust_decimal::Decimal` enforcing that every collectible
/// amount is strictly positive. Won has no minor unit, but upstream exports
/// occasionally carry fractional adjustment rows, so the inner type stays
/// decimal rather than integer.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, CollectionError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(CollectionError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = CollectionError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Renders an amount the way operator screens show it: `₩55,000`.
///
/// Fractional adjustment digits are dropped; won has no minor unit.
pub fn format_won(value: Decimal) -> String {
    let whole = value.trunc();
    let digits = whole.abs().normalize().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if whole < Decimal::ZERO { "-" } else { "" };
    format!("₩{sign}{grouped}")
}
