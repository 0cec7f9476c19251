#![forbid(unsafe_code)]

//! Conversion of filter literals to typed values.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use tracing::debug;

use super::errors::CoercionError;
use super::schema::LeafType;
use super::value::ComparableValue;

/// Convenience alias for coercion results.
pub type CoerceResult<T> = std::result::Result<T, CoercionError>;

fn failure(literal: &str, leaf: &LeafType, reason: impl Into<String>) -> CoercionError {
    CoercionError {
        literal: literal.to_owned(),
        expected: leaf.to_string(),
        reason: reason.into(),
    }
}

/// Converts `literal` to a value of type `leaf`.
///
/// Strings are trimmed. Booleans must be exactly `true` or `false`. Enum
/// members must match a declared name exactly. Temporal literals use ISO-8601
/// forms. Opaque leaves keep the literal untouched.
pub fn coerce(literal: &str, leaf: &LeafType) -> CoerceResult<ComparableValue> {
    match leaf {
        LeafType::String => Ok(ComparableValue::String(literal.trim().to_owned())),
        LeafType::Integer => literal
            .parse::<i64>()
            .map(ComparableValue::Integer)
            .map_err(|err| failure(literal, leaf, err.to_string())),
        LeafType::Decimal => BigDecimal::from_str(literal)
            .map(ComparableValue::Decimal)
            .map_err(|err| failure(literal, leaf, err.to_string())),
        LeafType::Boolean => match literal {
            "true" => Ok(ComparableValue::Boolean(true)),
            "false" => Ok(ComparableValue::Boolean(false)),
            _ => Err(failure(literal, leaf, "expected `true` or `false`")),
        },
        LeafType::Enumeration(ty) => match ty.ordinal(literal) {
            Some(ordinal) => Ok(ComparableValue::Enum {
                name: literal.to_owned(),
                ordinal,
            }),
            None => Err(failure(
                literal,
                leaf,
                format!("expected one of {}", ty.members.join(", ")),
            )),
        },
        LeafType::Date => Date::parse(literal, format_description!("[year]-[month]-[day]"))
            .map(ComparableValue::Date)
            .map_err(|err| failure(literal, leaf, err.to_string())),
        LeafType::DateTime => parse_datetime(literal)
            .map(ComparableValue::DateTime)
            .map_err(|reason| failure(literal, leaf, reason)),
        LeafType::Time => parse_time(literal)
            .map(ComparableValue::Time)
            .map_err(|reason| failure(literal, leaf, reason)),
        LeafType::Instant => OffsetDateTime::parse(literal, &Rfc3339)
            .map(ComparableValue::Instant)
            .map_err(|err| failure(literal, leaf, err.to_string())),
        LeafType::Opaque(name) => {
            debug!(type_name = %name, "no coercion for leaf type; comparing as text");
            Ok(ComparableValue::Opaque(literal.to_owned()))
        }
    }
}

fn parse_datetime(literal: &str) -> Result<PrimitiveDateTime, String> {
    let formats = [
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    ];
    let mut last = String::new();
    for format in formats {
        match PrimitiveDateTime::parse(literal, format) {
            Ok(value) => return Ok(value),
            Err(err) => last = err.to_string(),
        }
    }
    Err(last)
}

fn parse_time(literal: &str) -> Result<Time, String> {
    let formats = [
        format_description!("[hour]:[minute]:[second].[subsecond]"),
        format_description!("[hour]:[minute]:[second]"),
        format_description!("[hour]:[minute]"),
    ];
    let mut last = String::new();
    for format in formats {
        match Time::parse(literal, format) {
            Ok(value) => return Ok(value),
            Err(err) => last = err.to_string(),
        }
    }
    Err(last)
}
