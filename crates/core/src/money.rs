//! Fixed-point currency amounts (two decimal places).

use core::fmt;
use core::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DomainError;

/// A currency amount stored as an integer number of cents.
///
/// On the wire it is a JSON number with two decimals (`59.98`). Decoding also
/// accepts decimal strings (`"29.99"`), which is what SQL `DECIMAL` columns
/// usually turn into once they leave a catalog service.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `self × quantity`, or `None` on overflow.
    pub fn checked_mul(self, quantity: i64) -> Option<Money> {
        self.0.checked_mul(quantity).map(Money)
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Whole cents only; binary float noise below a millionth of a cent is ignored.
    fn from_f64(value: f64) -> Result<Self, DomainError> {
        let scaled = value * 100.0;
        let cents = scaled.round();
        if !cents.is_finite() || cents.abs() > i64::MAX as f64 {
            return Err(DomainError::validation(format!("amount out of range: {value}")));
        }
        if (scaled - cents).abs() > 1e-6 * scaled.abs().max(1.0) {
            return Err(DomainError::validation(format!("invalid amount: {value}")));
        }
        Ok(Self(cents as i64))
    }

    fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::validation(format!("invalid amount: {s:?}"));

        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        // Trailing zeros past the second decimal are fine ("29.990"), anything else is not.
        let (cents_part, rest) = frac.split_at(frac.len().min(2));
        if rest.bytes().any(|b| b != b'0') {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let cents: i64 = format!("{cents_part:0<2}").parse().map_err(|_| invalid())?;
        let total = whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(cents))
            .ok_or_else(invalid)?;

        Ok(Self(if negative { -total } else { total }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MoneyVisitor;

        impl Visitor<'_> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal amount as a number or string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
                v.checked_mul(100)
                    .map(Money)
                    .ok_or_else(|| E::custom("amount out of range"))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
                i64::try_from(v)
                    .ok()
                    .and_then(|v| v.checked_mul(100))
                    .map(Money)
                    .ok_or_else(|| E::custom("amount out of range"))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
                Money::from_f64(v).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(MoneyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn parses_decimal_strings_exactly() {
        assert_eq!("29.99".parse::<Money>().unwrap(), Money::from_cents(2999));
        assert_eq!("5".parse::<Money>().unwrap(), Money::from_cents(500));
        assert_eq!("0.5".parse::<Money>().unwrap(), Money::from_cents(50));
        assert_eq!("12.340".parse::<Money>().unwrap(), Money::from_cents(1234));
        assert_eq!("-1.05".parse::<Money>().unwrap(), Money::from_cents(-105));
    }

    #[test]
    fn rejects_malformed_or_sub_cent_strings() {
        for bad in ["", "abc", "1.2.3", "1.005", ".50", "1e3"] {
            assert!(bad.parse::<Money>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn sub_cent_numbers_are_rejected_like_strings() {
        for bad in [json!(29.999), json!("29.999"), json!(0.001)] {
            assert!(serde_json::from_value::<Money>(bad.clone()).is_err(), "{bad}");
        }
        let exact: Money = serde_json::from_value(json!(0.1)).unwrap();
        assert_eq!(exact, Money::from_cents(10));
    }

    #[test]
    fn decodes_numbers_and_strings_from_json() {
        let from_float: Money = serde_json::from_value(json!(29.99)).unwrap();
        let from_int: Money = serde_json::from_value(json!(30)).unwrap();
        let from_string: Money = serde_json::from_value(json!("29.99")).unwrap();
        assert_eq!(from_float, Money::from_cents(2999));
        assert_eq!(from_int, Money::from_cents(3000));
        assert_eq!(from_string, Money::from_cents(2999));
    }

    #[test]
    fn encodes_as_two_decimal_number() {
        assert_eq!(serde_json::to_value(Money::from_cents(5998)).unwrap(), json!(59.98));
        assert_eq!(Money::from_cents(5998).to_string(), "59.98");
        assert_eq!(Money::from_cents(-7).to_string(), "-0.07");
    }

    #[test]
    fn checked_arithmetic_detects_overflow() {
        assert_eq!(Money::from_cents(2999).checked_mul(2), Some(Money::from_cents(5998)));
        assert_eq!(Money::from_cents(i64::MAX).checked_mul(2), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
    }

    proptest! {
        #[test]
        fn display_output_parses_back_to_same_amount(cents in -10_000_000_000i64..10_000_000_000i64) {
            let money = Money::from_cents(cents);
            prop_assert_eq!(money.to_string().parse::<Money>().unwrap(), money);
        }
    }
}
