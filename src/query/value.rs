#![forbid(unsafe_code)]

//! Typed literal values produced by coercion and stored in records.

use std::cmp::Ordering;
use std::fmt;

use bigdecimal::BigDecimal;
use serde_json::Value as JsonValue;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

/// A value of one of the leaf types, comparable with values of the same type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ComparableValue {
    /// Text.
    String(String),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Arbitrary-precision decimal.
    Decimal(BigDecimal),
    /// Boolean.
    Boolean(bool),
    /// Enumeration member; ordered by declaration index.
    Enum {
        /// Member name.
        name: String,
        /// Declaration index.
        ordinal: usize,
    },
    /// Calendar date.
    Date(Date),
    /// Local date-time without offset.
    DateTime(PrimitiveDateTime),
    /// Time of day.
    Time(Time),
    /// Point in time with offset; compared as instants.
    Instant(OffsetDateTime),
    /// Untyped text for leaf types without a dedicated representation.
    Opaque(String),
}

impl ComparableValue {
    /// Orders two values of compatible types. Integers and decimals compare
    /// numerically; any other mix of types is incomparable.
    pub fn compare(&self, other: &ComparableValue) -> Option<Ordering> {
        use ComparableValue as V;
        match (self, other) {
            (V::String(a), V::String(b)) | (V::Opaque(a), V::Opaque(b)) => Some(a.cmp(b)),
            (V::Integer(a), V::Integer(b)) => Some(a.cmp(b)),
            (V::Decimal(a), V::Decimal(b)) => Some(a.cmp(b)),
            (V::Integer(a), V::Decimal(b)) => Some(BigDecimal::from(*a).cmp(b)),
            (V::Decimal(a), V::Integer(b)) => Some(a.cmp(&BigDecimal::from(*b))),
            (V::Boolean(a), V::Boolean(b)) => Some(a.cmp(b)),
            (V::Enum { ordinal: a, .. }, V::Enum { ordinal: b, .. }) => Some(a.cmp(b)),
            (V::Date(a), V::Date(b)) => Some(a.cmp(b)),
            (V::DateTime(a), V::DateTime(b)) => Some(a.cmp(b)),
            (V::Time(a), V::Time(b)) => Some(a.cmp(b)),
            (V::Instant(a), V::Instant(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality under [`compare`](Self::compare).
    pub fn matches(&self, other: &ComparableValue) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Borrowed text for string values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ComparableValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical text form; the coercer parses it back to the same value.
    pub fn render(&self) -> String {
        match self {
            ComparableValue::String(s) | ComparableValue::Opaque(s) => s.clone(),
            ComparableValue::Integer(v) => v.to_string(),
            ComparableValue::Decimal(v) => v.to_string(),
            ComparableValue::Boolean(v) => v.to_string(),
            ComparableValue::Enum { name, .. } => name.clone(),
            ComparableValue::Date(v) => v
                .format(format_description!("[year]-[month]-[day]"))
                .unwrap_or_else(|_| v.to_string()),
            ComparableValue::DateTime(v) => {
                let formatted = if v.nanosecond() == 0 {
                    v.format(format_description!(
                        "[year]-[month]-[day]T[hour]:[minute]:[second]"
                    ))
                } else {
                    v.format(format_description!(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"
                    ))
                };
                formatted.unwrap_or_else(|_| v.to_string())
            }
            ComparableValue::Time(v) => {
                let formatted = if v.nanosecond() == 0 {
                    v.format(format_description!("[hour]:[minute]:[second]"))
                } else {
                    v.format(format_description!("[hour]:[minute]:[second].[subsecond]"))
                };
                formatted.unwrap_or_else(|_| v.to_string())
            }
            ComparableValue::Instant(v) => v.format(&Rfc3339).unwrap_or_else(|_| v.to_string()),
        }
    }

    /// JSON form used when records are written out.
    pub fn to_json(&self) -> JsonValue {
        match self {
            ComparableValue::Integer(v) => JsonValue::from(*v),
            ComparableValue::Boolean(v) => JsonValue::Bool(*v),
            other => JsonValue::String(other.render()),
        }
    }
}

impl fmt::Display for ComparableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparableValue::Integer(_)
            | ComparableValue::Decimal(_)
            | ComparableValue::Boolean(_) => f.write_str(&self.render()),
            _ => write!(f, "{:?}", self.render()),
        }
    }
}

impl From<&str> for ComparableValue {
    fn from(value: &str) -> Self {
        ComparableValue::String(value.to_owned())
    }
}

impl From<String> for ComparableValue {
    fn from(value: String) -> Self {
        ComparableValue::String(value)
    }
}

impl From<i64> for ComparableValue {
    fn from(value: i64) -> Self {
        ComparableValue::Integer(value)
    }
}

impl From<bool> for ComparableValue {
    fn from(value: bool) -> Self {
        ComparableValue::Boolean(value)
    }
}

impl From<BigDecimal> for ComparableValue {
    fn from(value: BigDecimal) -> Self {
        ComparableValue::Decimal(value)
    }
}
