#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Filter expression tree and its JSON wire form.
//!
//! A filter is a tree of logical connectives over leaf comparisons. On the wire
//! every node is an object whose `operator` field selects the node shape; the
//! remaining fields must be exactly those of that shape. Decoding goes through
//! `RawExpression`, which accepts every known key, and is then narrowed to a
//! typed [`Expression`] variant with explicit field checks.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use super::errors::MalformedExpressionError;

macro_rules! operator_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal $(| $alias:literal)*),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                #[allow(missing_docs)]
                $variant,
            )+
        }

        impl $name {
            /// Every operator of this family, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical wire name.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            /// Parses a wire name, accepting legacy spellings.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($wire $(| $alias)* => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

operator_enum! {
    /// Connectives over two or more operands.
    LogicalOperator { And => "And", Or => "Or" }
}

operator_enum! {
    /// Connective over exactly one operand.
    NegationOperator { Not => "Not" }
}

operator_enum! {
    /// Comparisons between a property and one literal.
    ComparisonOperator {
        Equal => "Equal",
        NotEqual => "NotEqual",
        LessThan => "LessThan",
        LessThanEqual => "LessThanEqual",
        GreaterThan => "GreaterThan",
        GreaterThanEqual => "GreaterThanEqual",
        StartsWith => "StartsWith" | "StartWith",
        EndsWith => "EndsWith" | "EndWith",
        Contains => "Contains" | "Contain",
    }
}

operator_enum! {
    /// Set membership tests.
    MembershipOperator { In => "In", NotIn => "NotIn" }
}

operator_enum! {
    /// Inclusive range test.
    RangeOperator { Between => "Between" }
}

operator_enum! {
    /// Null checks.
    PresenceOperator { Empty => "Empty", NotEmpty => "NotEmpty" }
}

/// The six node shapes a filter can contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    LogicalMulti,
    LogicalSingle,
    ComparisonSingle,
    ComparisonMulti,
    ComparisonRange,
    ComparisonNone,
}

impl NodeKind {
    /// Every node kind.
    pub const ALL: [NodeKind; 6] = [
        NodeKind::LogicalMulti,
        NodeKind::LogicalSingle,
        NodeKind::ComparisonSingle,
        NodeKind::ComparisonMulti,
        NodeKind::ComparisonRange,
        NodeKind::ComparisonNone,
    ];

    /// Node kind selected by an operator name.
    ///
    /// Names without a declared family fall through to the single-value shape,
    /// which then rejects anything that is not a comparison operator.
    fn for_operator(name: &str) -> NodeKind {
        match name {
            "And" | "Or" => NodeKind::LogicalMulti,
            "Not" => NodeKind::LogicalSingle,
            "In" | "NotIn" => NodeKind::ComparisonMulti,
            "Between" => NodeKind::ComparisonRange,
            "Empty" | "NotEmpty" => NodeKind::ComparisonNone,
            _ => NodeKind::ComparisonSingle,
        }
    }

    /// Wire fields (besides `operator`) this shape accepts.
    fn fields(self) -> &'static [&'static str] {
        match self {
            NodeKind::LogicalMulti => &["operands"],
            NodeKind::LogicalSingle => &["operand"],
            NodeKind::ComparisonSingle => &["property", "value"],
            NodeKind::ComparisonMulti => &["property", "values"],
            NodeKind::ComparisonRange => &["property", "start", "end"],
            NodeKind::ComparisonNone => &["property"],
        }
    }
}

/// `And`/`Or` over at least two operands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogicalMulti {
    pub operator: LogicalOperator,
    pub operands: Vec<Expression>,
}

/// `Not` over one operand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogicalSingle {
    pub operator: NegationOperator,
    pub operand: Box<Expression>,
}

/// Property compared against a single literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SingleValueComparison {
    pub operator: ComparisonOperator,
    /// Dot-separated property path.
    pub property: String,
    pub value: String,
}

/// Property tested for membership in a literal list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiValueComparison {
    pub operator: MembershipOperator,
    /// Dot-separated property path.
    pub property: String,
    /// Literals as decoded; `None` entries are rejected during validation.
    pub values: Vec<Option<String>>,
}

/// Property tested against an inclusive `[start, end]` range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeComparison {
    pub operator: RangeOperator,
    /// Dot-separated property path.
    pub property: String,
    pub start: String,
    pub end: String,
}

/// Property tested for null / non-null.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoValueComparison {
    pub operator: PresenceOperator,
    /// Dot-separated property path.
    pub property: String,
}

/// A node of a client-supplied filter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawExpression", into = "RawExpression")]
pub enum Expression {
    LogicalMulti(LogicalMulti),
    LogicalSingle(LogicalSingle),
    ComparisonSingle(SingleValueComparison),
    ComparisonMulti(MultiValueComparison),
    ComparisonRange(RangeComparison),
    ComparisonNone(NoValueComparison),
}

impl Expression {
    /// Decodes a filter from JSON text.
    pub fn from_json(text: &str) -> Result<Self, MalformedExpressionError> {
        serde_json::from_str(text).map_err(|err| MalformedExpressionError::new(err.to_string()))
    }

    /// Decodes a filter from an already parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, MalformedExpressionError> {
        serde_json::from_value(value).map_err(|err| MalformedExpressionError::new(err.to_string()))
    }

    /// Shape of this node.
    pub fn kind(&self) -> NodeKind {
        match self {
            Expression::LogicalMulti(_) => NodeKind::LogicalMulti,
            Expression::LogicalSingle(_) => NodeKind::LogicalSingle,
            Expression::ComparisonSingle(_) => NodeKind::ComparisonSingle,
            Expression::ComparisonMulti(_) => NodeKind::ComparisonMulti,
            Expression::ComparisonRange(_) => NodeKind::ComparisonRange,
            Expression::ComparisonNone(_) => NodeKind::ComparisonNone,
        }
    }

    /// Wire name of the node's operator.
    pub fn operator_name(&self) -> &'static str {
        match self {
            Expression::LogicalMulti(node) => node.operator.name(),
            Expression::LogicalSingle(node) => node.operator.name(),
            Expression::ComparisonSingle(node) => node.operator.name(),
            Expression::ComparisonMulti(node) => node.operator.name(),
            Expression::ComparisonRange(node) => node.operator.name(),
            Expression::ComparisonNone(node) => node.operator.name(),
        }
    }

    /// Property path of a comparison node.
    pub fn property(&self) -> Option<&str> {
        match self {
            Expression::ComparisonSingle(node) => Some(&node.property),
            Expression::ComparisonMulti(node) => Some(&node.property),
            Expression::ComparisonRange(node) => Some(&node.property),
            Expression::ComparisonNone(node) => Some(&node.property),
            Expression::LogicalMulti(_) | Expression::LogicalSingle(_) => None,
        }
    }

    pub fn and(operands: Vec<Expression>) -> Self {
        Expression::LogicalMulti(LogicalMulti {
            operator: LogicalOperator::And,
            operands,
        })
    }

    pub fn or(operands: Vec<Expression>) -> Self {
        Expression::LogicalMulti(LogicalMulti {
            operator: LogicalOperator::Or,
            operands,
        })
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Expression) -> Self {
        Expression::LogicalSingle(LogicalSingle {
            operator: NegationOperator::Not,
            operand: Box::new(operand),
        })
    }

    pub fn compare(
        operator: ComparisonOperator,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Expression::ComparisonSingle(SingleValueComparison {
            operator,
            property: property.into(),
            value: value.into(),
        })
    }

    pub fn equal(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::compare(ComparisonOperator::Equal, property, value)
    }

    pub fn membership<I, S>(operator: MembershipOperator, property: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expression::ComparisonMulti(MultiValueComparison {
            operator,
            property: property.into(),
            values: values.into_iter().map(|v| Some(v.into())).collect(),
        })
    }

    pub fn between(
        property: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Expression::ComparisonRange(RangeComparison {
            operator: RangeOperator::Between,
            property: property.into(),
            start: start.into(),
            end: end.into(),
        })
    }

    pub fn presence(operator: PresenceOperator, property: impl Into<String>) -> Self {
        Expression::ComparisonNone(NoValueComparison {
            operator,
            property: property.into(),
        })
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::LogicalMulti(node) => {
                write!(f, "{}[", node.operator)?;
                for (idx, operand) in node.operands.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{operand}")?;
                }
                f.write_str("]")
            }
            Expression::LogicalSingle(node) => write!(f, "{}[{}]", node.operator, node.operand),
            Expression::ComparisonSingle(node) => {
                write!(f, "{}({}, {:?})", node.operator, node.property, node.value)
            }
            Expression::ComparisonMulti(node) => {
                write!(f, "{}({}, [", node.operator, node.property)?;
                for (idx, value) in node.values.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    match value {
                        Some(value) => write!(f, "{value:?}")?,
                        None => f.write_str("null")?,
                    }
                }
                f.write_str("])")
            }
            Expression::ComparisonRange(node) => write!(
                f,
                "{}({}, {:?}, {:?})",
                node.operator, node.property, node.start, node.end
            ),
            Expression::ComparisonNone(node) => write!(f, "{}({})", node.operator, node.property),
        }
    }
}

/// Scalar literal that tolerates JSON numbers and booleans in place of strings.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Literal(String);

impl<'de> Deserialize<'de> for Literal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LiteralVisitor;

        impl<'de> Visitor<'de> for LiteralVisitor {
            type Value = Literal;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a string, number, or boolean literal")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Literal(value.to_owned()))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Literal(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Literal(value.to_string()))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Literal(value.to_string()))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Literal(value.to_string()))
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Literal(value.to_string()))
            }
        }

        deserializer.deserialize_any(LiteralVisitor)
    }
}

impl Serialize for Literal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

/// Union of every field any node shape can carry.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawExpression {
    #[serde(skip_serializing_if = "Option::is_none")]
    operator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Literal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    values: Option<Vec<Option<Literal>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<Literal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end: Option<Literal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operands: Option<Vec<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operand: Option<Box<Expression>>,
}

impl RawExpression {
    fn present_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        [
            ("property", self.property.is_some()),
            ("value", self.value.is_some()),
            ("values", self.values.is_some()),
            ("start", self.start.is_some()),
            ("end", self.end.is_some()),
            ("operands", self.operands.is_some()),
            ("operand", self.operand.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
    }
}

fn required<T>(field: Option<T>, name: &str, operator: &str) -> Result<T, String> {
    field.ok_or_else(|| format!("missing field `{name}` for operator `{operator}`"))
}

fn unknown_operator(operator: &str) -> String {
    format!("unknown operator `{operator}`")
}

// Errors are plain text here; serde attaches the position and the public
// entry points wrap the result in `MalformedExpressionError`.
impl TryFrom<RawExpression> for Expression {
    type Error = String;

    fn try_from(raw: RawExpression) -> Result<Self, Self::Error> {
        let operator = match raw.operator.as_deref() {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => return Err("missing field `operator`".to_owned()),
        };
        let kind = NodeKind::for_operator(&operator);
        let allowed = kind.fields();
        if let Some(extra) = raw.present_fields().find(|field| !allowed.contains(field)) {
            return Err(format!(
                "unexpected field `{extra}` for operator `{operator}`"
            ));
        }
        let op = operator.as_str();
        let node = match kind {
            NodeKind::LogicalMulti => Expression::LogicalMulti(LogicalMulti {
                operator: LogicalOperator::from_name(op).ok_or_else(|| unknown_operator(op))?,
                operands: required(raw.operands, "operands", op)?,
            }),
            NodeKind::LogicalSingle => Expression::LogicalSingle(LogicalSingle {
                operator: NegationOperator::from_name(op).ok_or_else(|| unknown_operator(op))?,
                operand: required(raw.operand, "operand", op)?,
            }),
            NodeKind::ComparisonSingle => Expression::ComparisonSingle(SingleValueComparison {
                operator: ComparisonOperator::from_name(op).ok_or_else(|| unknown_operator(op))?,
                property: required(raw.property, "property", op)?,
                value: required(raw.value, "value", op)?.0,
            }),
            NodeKind::ComparisonMulti => Expression::ComparisonMulti(MultiValueComparison {
                operator: MembershipOperator::from_name(op).ok_or_else(|| unknown_operator(op))?,
                property: required(raw.property, "property", op)?,
                values: required(raw.values, "values", op)?
                    .into_iter()
                    .map(|entry| entry.map(|literal| literal.0))
                    .collect(),
            }),
            NodeKind::ComparisonRange => Expression::ComparisonRange(RangeComparison {
                operator: RangeOperator::from_name(op).ok_or_else(|| unknown_operator(op))?,
                property: required(raw.property, "property", op)?,
                start: required(raw.start, "start", op)?.0,
                end: required(raw.end, "end", op)?.0,
            }),
            NodeKind::ComparisonNone => Expression::ComparisonNone(NoValueComparison {
                operator: PresenceOperator::from_name(op).ok_or_else(|| unknown_operator(op))?,
                property: required(raw.property, "property", op)?,
            }),
        };
        Ok(node)
    }
}

impl From<Expression> for RawExpression {
    fn from(expr: Expression) -> Self {
        let operator = Some(expr.operator_name().to_owned());
        match expr {
            Expression::LogicalMulti(node) => RawExpression {
                operator,
                operands: Some(node.operands),
                ..RawExpression::default()
            },
            Expression::LogicalSingle(node) => RawExpression {
                operator,
                operand: Some(node.operand),
                ..RawExpression::default()
            },
            Expression::ComparisonSingle(node) => RawExpression {
                operator,
                property: Some(node.property),
                value: Some(Literal(node.value)),
                ..RawExpression::default()
            },
            Expression::ComparisonMulti(node) => RawExpression {
                operator,
                property: Some(node.property),
                values: Some(node.values.into_iter().map(|v| v.map(Literal)).collect()),
                ..RawExpression::default()
            },
            Expression::ComparisonRange(node) => RawExpression {
                operator,
                property: Some(node.property),
                start: Some(Literal(node.start)),
                end: Some(Literal(node.end)),
                ..RawExpression::default()
            },
            Expression::ComparisonNone(node) => RawExpression {
                operator,
                property: Some(node.property),
                ..RawExpression::default()
            },
        }
    }
}
