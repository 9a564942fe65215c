use crate::types::decimal128;
use crate::types::errors::MonetaryError;
use bson::Bson;
use rust_decimal::{Decimal, Error, RoundingStrategy};
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::ops::Neg;
use std::str::FromStr;

const DECIMAL_PLACES: u32 = 4;

/// Fixed-point monetary amount with four decimal places.
///
/// Persisted as BSON `Decimal128` so the store applies `$inc` and aggregation
/// arithmetic in decimal rather than binary floating point.
/// Every constructor keeps the inner scale at exactly four places.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Monetary(Decimal);

impl Monetary {
    pub fn new() -> Self {
        Monetary(Decimal::new(0, DECIMAL_PLACES))
    }

    pub fn from_units(units: i64) -> Self {
        Monetary(Decimal::new(units, 0).with_places())
    }

    /// Rounds half away from zero to four places; fails if the result cannot keep them.
    pub fn try_from_decimal(value: Decimal) -> Result<Self, MonetaryError> {
        let value = value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
            .with_places();

        if value.scale() != DECIMAL_PLACES {
            return Err(MonetaryError::Overflow);
        }

        Ok(Monetary(value))
    }

    pub fn from_bson(value: &Bson) -> Result<Self, MonetaryError> {
        match value {
            Bson::String(text) => Monetary::from_str(text),
            other => Monetary::try_from_decimal(decimal128::from_bson(other)?)
        }
    }

    pub fn to_bson(&self) -> Result<Bson, MonetaryError> {
        decimal128::to_bson(self.0)
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

trait WithPlaces {
    fn with_places(self) -> Self;
}

impl WithPlaces for Decimal {
    fn with_places(mut self) -> Self {
        self.rescale(DECIMAL_PLACES);
        self
    }
}

impl Neg for Monetary {
    type Output = Monetary;

    fn neg(self) -> Self::Output {
        if self.is_zero() {
            return self;
        }

        Monetary(-self.0)
    }
}

impl Default for Monetary {
    fn default() -> Self {
        Monetary::new()
    }
}

impl Display for Monetary {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for Monetary {
    type Err = MonetaryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();

        if value.is_empty() {
            return Err(MonetaryError::InvalidFormat("Value is an empty string".to_string()));
        }

        let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);
        let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

        if integer.is_empty() || !integer.bytes().all(|digit| digit.is_ascii_digit()) {
            return Err(MonetaryError::InvalidFormat(format!("Value has an invalid integer part: [{value}]")));
        }

        if !fraction.bytes().all(|digit| digit.is_ascii_digit()) {
            return Err(MonetaryError::InvalidFormat(format!("Value has an invalid fraction part: [{value}]")));
        }

        let mut parsed = Decimal::from_str_exact(value.trim_end_matches('.')).map_err(|error| match error {
            Error::ExceedsMaximumPossibleValue | Error::LessThanMinimumPossibleValue => MonetaryError::Overflow,
            error => MonetaryError::InvalidFormat(format!("Value [{value}] is not a decimal: {error}"))
        })?;

        if parsed.scale() > DECIMAL_PLACES {
            return Err(MonetaryError::InvalidFormat("Value has too many decimal places".to_string()));
        }

        if parsed.is_zero() {
            parsed.set_sign_positive(true);
        }

        Monetary::try_from_decimal(parsed)
    }
}

impl Serialize for Monetary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_bson().map_err(<S::Error as ser::Error>::custom)?.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Monetary {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Bson::deserialize(deserializer)?;
        Monetary::from_bson(&value).map_err(de::Error::custom)
    }
}
