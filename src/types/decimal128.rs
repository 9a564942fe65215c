//! Conversion between `rust_decimal::Decimal` and BSON `Decimal128` through
//! their shared decimal string form.

use std::str::FromStr;

use bson::{Bson, Decimal128};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, Error};

use crate::types::MonetaryError;

pub fn encode(value: Decimal) -> Result<Decimal128, MonetaryError> {
    Decimal128::from_str(&value.to_string())
        .map_err(|error| MonetaryError::NotRepresentable(format!("{value} ({error})")))
}

/// Values carrying more digits than `Decimal` holds are rounded to fit.
/// NaN and infinities are rejected.
pub fn decode(value: &Decimal128) -> Result<Decimal, MonetaryError> {
    let text = value.to_string();

    Decimal::from_str(&text).map_err(|error| match error {
        Error::ExceedsMaximumPossibleValue
        | Error::LessThanMinimumPossibleValue
        | Error::ScaleExceedsMaximumPrecision(_) => MonetaryError::Overflow,
        _ => MonetaryError::NotRepresentable(text)
    })
}

pub fn to_bson(value: Decimal) -> Result<Bson, MonetaryError> {
    encode(value).map(Bson::Decimal128)
}

/// Reads any numeric BSON value as a decimal.
pub fn from_bson(value: &Bson) -> Result<Decimal, MonetaryError> {
    match value {
        Bson::Int32(value) => Ok(Decimal::from(*value)),
        Bson::Int64(value) => Ok(Decimal::from(*value)),
        Bson::Double(value) => Decimal::from_f64(*value)
            .ok_or_else(|| MonetaryError::NotRepresentable(value.to_string())),
        Bson::Decimal128(value) => decode(value),
        other => Err(MonetaryError::UnsupportedType(format!("{:?}", other.element_type())))
    }
}
