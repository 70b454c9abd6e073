//! Fixed-point USDC amounts

use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use alloy_primitives::utils::{format_units, parse_units};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::{BulkPayError, Result};

/// USDC uses 6 decimals on every supported chain
pub const USDC_DECIMALS: u8 = 6;

/// An unsigned USDC amount held in atomic units (1 USDC = 1_000_000)
///
/// Parsing accepts plain decimal notation only: no sign, no exponent and at
/// most six fractional digits. Display trims trailing fractional zeros so
/// `"250.50"` prints as `250.5`.
///
/// ```rust
/// use cctp_bulk_pay::UsdcAmount;
///
/// let amount: UsdcAmount = "250.50".parse().unwrap();
/// assert_eq!(amount.atomic().to::<u64>(), 250_500_000);
/// assert_eq!(amount.to_string(), "250.5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UsdcAmount(U256);

impl UsdcAmount {
    pub const ZERO: Self = Self(U256::ZERO);

    pub const fn from_atomic(atomic: U256) -> Self {
        Self(atomic)
    }

    /// Whole USDC, e.g. `UsdcAmount::whole(5)` is 5.00 USDC
    pub fn whole(usdc: u64) -> Self {
        Self(U256::from(usdc) * U256::from(10u64.pow(USDC_DECIMALS as u32)))
    }

    /// Cents, e.g. `UsdcAmount::cents(1550)` is 15.50 USDC
    pub fn cents(cents: u64) -> Self {
        Self(U256::from(cents) * U256::from(10_000u64))
    }

    pub const fn atomic(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn saturating_mul(self, count: u64) -> Self {
        Self(self.0.saturating_mul(U256::from(count)))
    }

    /// Basis-point share of this amount, rounded up to the next atomic unit
    pub fn bps_ceil(self, bps: u32) -> Self {
        let scaled = self.0.saturating_mul(U256::from(bps));
        let divisor = U256::from(10_000u64);
        let (quotient, remainder) = scaled.div_rem(divisor);
        if remainder.is_zero() {
            Self(quotient)
        } else {
            Self(quotient + U256::from(1u8))
        }
    }
}

fn is_plain_decimal(s: &str) -> bool {
    let (integer, fraction) = match s.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (s, None),
    };

    let integer_ok = integer.bytes().all(|b| b.is_ascii_digit());
    let fraction_ok = fraction.is_none_or(|f| {
        !f.is_empty() && f.len() <= USDC_DECIMALS as usize && f.bytes().all(|b| b.is_ascii_digit())
    });
    let has_digits = !integer.is_empty() || fraction.is_some_and(|f| !f.is_empty());

    integer_ok && fraction_ok && has_digits
}

impl FromStr for UsdcAmount {
    type Err = BulkPayError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if !is_plain_decimal(trimmed) {
            return Err(BulkPayError::InvalidAmount(s.to_string()));
        }

        let normalized = if trimmed.starts_with('.') {
            format!("0{trimmed}")
        } else {
            trimmed.to_string()
        };

        let parsed = parse_units(&normalized, USDC_DECIMALS)
            .map_err(|_| BulkPayError::InvalidAmount(s.to_string()))?;

        Ok(Self(parsed.get_absolute()))
    }
}

impl fmt::Display for UsdcAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = format_units(self.0, USDC_DECIMALS).map_err(|_| fmt::Error)?;
        let trimmed = if formatted.contains('.') {
            formatted.trim_end_matches('0').trim_end_matches('.')
        } else {
            formatted.as_str()
        };
        f.write_str(trimmed)
    }
}

impl TryFrom<String> for UsdcAmount {
    type Error = BulkPayError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<UsdcAmount> for String {
    fn from(amount: UsdcAmount) -> Self {
        amount.to_string()
    }
}

impl Add for UsdcAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for UsdcAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}
