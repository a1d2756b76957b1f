use crate::error::{MathError, Result};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Fixed-point decimal with 28 significant digits.
///
/// Every arithmetic operation is checked and reports overflow as a
/// [`MathError`] instead of wrapping or panicking. Values compare by
/// magnitude, so `1.0 == 1.00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Dec(Decimal);

impl Dec {
    pub const ZERO: Self = Self(Decimal::ZERO);
    pub const ONE: Self = Self(Decimal::ONE);

    /// `mantissa * 10^-scale`; `scale` must not exceed 28.
    pub fn new(mantissa: i64, scale: u32) -> Self {
        Self(Decimal::new(mantissa, scale))
    }

    pub fn from_i64(value: i64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn from_u128(value: u128) -> Result<Self> {
        Decimal::from_u128(value)
            .map(Self)
            .ok_or(MathError::Overflow("u128 to decimal"))
    }

    /// Parses plain (`"0.25"`) and scientific (`"1e-4"`) notation.
    pub fn new_from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map(Self)
            .map_err(|_| MathError::InvalidDecimal(s.to_string()))
    }

    pub fn inner(&self) -> Decimal {
        self.0
    }

    pub fn checked_add(&self, other: Dec) -> Result<Dec> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(MathError::Overflow("add"))
    }

    pub fn checked_sub(&self, other: Dec) -> Result<Dec> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(MathError::Overflow("sub"))
    }

    pub fn checked_mul(&self, other: Dec) -> Result<Dec> {
        self.0
            .checked_mul(other.0)
            .map(Self)
            .ok_or(MathError::Overflow("mul"))
    }

    pub fn checked_quo(&self, other: Dec) -> Result<Dec> {
        if other.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        self.0
            .checked_div(other.0)
            .map(Self)
            .ok_or(MathError::Overflow("quo"))
    }

    pub fn sqrt(&self) -> Result<Dec> {
        if self.is_negative() {
            return Err(MathError::OutOfDomain {
                name: "sqrt argument",
                value: self.to_string(),
                expected: ">= 0",
            });
        }
        self.0
            .sqrt()
            .map(Self)
            .ok_or(MathError::Overflow("sqrt"))
    }

    pub fn abs(&self) -> Dec {
        Self(self.0.abs())
    }

    pub fn ceil(&self) -> Dec {
        Self(self.0.ceil())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Truncates toward zero into an unsigned integer amount.
    pub fn trunc_to_u128(&self) -> Result<u128> {
        if self.is_negative() {
            return Err(MathError::NegativeAmount(self.to_string()));
        }
        self.0
            .trunc()
            .to_u128()
            .ok_or(MathError::Overflow("decimal to u128"))
    }

    /// Converts a non-negative integral decimal to `u64`, failing otherwise.
    pub fn to_u64(&self) -> Result<u64> {
        self.0
            .to_u64()
            .ok_or(MathError::Overflow("decimal to u64"))
    }

    /// `|a - b| <= delta`
    pub fn in_delta(a: Dec, b: Dec, delta: Dec) -> bool {
        match a.checked_sub(b) {
            Ok(diff) => diff.abs() <= delta,
            Err(_) => false,
        }
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for Dec {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new_from_str(s)
    }
}

impl From<Decimal> for Dec {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

// Encoded as a canonical string so that binary codecs which lack
// `deserialize_any` (bincode) and text formats (toml, json) agree.
impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.normalize().to_string())
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Dec::new_from_str(&raw).map_err(serde::de::Error::custom)
    }
}
