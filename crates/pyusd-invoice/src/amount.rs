//! Fixed-point conversion between display amounts and atomic token units.
//!
//! Integer-only: no `f64` anywhere in the pipeline. Amounts with more
//! significant fractional digits than the token supports are rejected rather
//! than rounded, so `parse_units` is exact and reproducible.

use alloy::primitives::U256;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("'{0}' is not a decimal number")]
    NotANumber(String),

    #[error("'{amount}' has more than {decimals} decimal places")]
    TooPrecise { amount: String, decimals: u32 },

    #[error("'{0}' is too large")]
    Overflow(String),
}

/// Parse a decimal string like `"12.5"` into atomic units (`12500000` at 6 decimals).
///
/// Accepts `"1"`, `"1."`, `".5"` and `"0.10"`. Signs, exponents, separators
/// and surrounding text are rejected. Fractional digits past `decimals` are
/// accepted only when they are all zeros.
pub fn parse_units(amount: &str, decimals: u32) -> Result<U256, AmountError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(AmountError::Empty);
    }

    let (integer_part, fractional_part) = amount.split_once('.').unwrap_or((amount, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (integer_part.is_empty() && fractional_part.is_empty())
        || !all_digits(integer_part)
        || !all_digits(fractional_part)
    {
        return Err(AmountError::NotANumber(amount.to_string()));
    }

    let scale = decimals as usize;
    let (kept, dropped) = fractional_part.split_at(fractional_part.len().min(scale));
    if dropped.bytes().any(|b| b != b'0') {
        return Err(AmountError::TooPrecise {
            amount: amount.to_string(),
            decimals,
        });
    }

    let overflow = || AmountError::Overflow(amount.to_string());

    let integer = if integer_part.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(integer_part, 10).map_err(|_| overflow())?
    };

    // Right-pad the kept fraction to exactly `decimals` digits.
    let fractional = if kept.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{kept:0<scale$}");
        U256::from_str_radix(&padded, 10).map_err(|_| overflow())?
    };

    integer
        .checked_mul(pow10(decimals))
        .and_then(|whole| whole.checked_add(fractional))
        .ok_or_else(overflow)
}

/// Parse an atomic amount: a plain base-10 integer string that fits in uint256.
pub fn parse_atomic(value: &str) -> Result<U256, AmountError> {
    if value.is_empty() {
        return Err(AmountError::Empty);
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AmountError::NotANumber(value.to_string()));
    }
    U256::from_str_radix(value, 10).map_err(|_| AmountError::Overflow(value.to_string()))
}

/// Render atomic units as a display amount, trimming trailing fractional zeros.
pub fn format_units(value: U256, decimals: u32) -> String {
    let unit = pow10(decimals);
    let integer = value / unit;
    let fractional = value % unit;
    if fractional.is_zero() {
        return integer.to_string();
    }
    let width = decimals as usize;
    let digits = format!("{:0>width$}", fractional.to_string());
    format!("{integer}.{}", digits.trim_end_matches('0'))
}

fn pow10(decimals: u32) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}
