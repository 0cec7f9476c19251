#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Native predicates handed to a [`Store`](super::store::Store).

use std::fmt;

use super::request::SortDirection;
use super::resolve::{ColumnRef, Join};
use super::value::ComparableValue;

/// Ordering comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Position of a literal within a string value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StringMatch {
    Prefix,
    Suffix,
    Contains,
}

/// Boolean predicate over resolved columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: ComparableValue,
    },
    /// Case-sensitive literal match; no wildcard characters.
    Like {
        column: ColumnRef,
        kind: StringMatch,
        pattern: String,
    },
    In {
        column: ColumnRef,
        values: Vec<ComparableValue>,
    },
    /// Inclusive on both ends.
    Between {
        column: ColumnRef,
        low: ComparableValue,
        high: ComparableValue,
    },
    IsNull(ColumnRef),
    IsNotNull(ColumnRef),
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::And(children) | Predicate::Or(children) => {
                let sep = if matches!(self, Predicate::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                f.write_str("(")?;
                for (idx, child) in children.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(sep)?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
            Predicate::Not(inner) => write!(f, "NOT {inner}"),
            Predicate::Compare { column, op, value } => {
                write!(f, "{column} {} {value}", op.symbol())
            }
            Predicate::Like {
                column,
                kind,
                pattern,
            } => {
                let name = match kind {
                    StringMatch::Prefix => "STARTS WITH",
                    StringMatch::Suffix => "ENDS WITH",
                    StringMatch::Contains => "CONTAINS",
                };
                write!(f, "{column} {name} {pattern:?}")
            }
            Predicate::In { column, values } => {
                write!(f, "{column} IN (")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str(")")
            }
            Predicate::Between { column, low, high } => {
                write!(f, "{column} BETWEEN {low} AND {high}")
            }
            Predicate::IsNull(column) => write!(f, "{column} IS NULL"),
            Predicate::IsNotNull(column) => write!(f, "{column} IS NOT NULL"),
        }
    }
}

/// A compiled filter over one root entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledFilter {
    /// Root entity name.
    pub root: String,
    /// Left joins the predicate refers to.
    pub joins: Vec<Join>,
    pub predicate: Predicate,
}

/// One resolved sort key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

/// Everything a store needs to run a search: root, joins, optional
/// predicate, and sort keys. Filter and sort paths share one join set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledQuery {
    pub root: String,
    pub joins: Vec<Join>,
    /// `None` matches every row.
    pub predicate: Option<Predicate>,
    pub sorts: Vec<SortKey>,
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FROM {} root", self.root)?;
        for join in &self.joins {
            let parent = join
                .parent
                .map(|id| id.to_string())
                .unwrap_or_else(|| "root".to_owned());
            writeln!(
                f,
                "LEFT JOIN {} {} ON {parent}.{}",
                join.entity,
                join.id,
                join.hops.join(".")
            )?;
        }
        if let Some(predicate) = &self.predicate {
            writeln!(f, "WHERE {predicate}")?;
        }
        if !self.sorts.is_empty() {
            f.write_str("ORDER BY ")?;
            for (idx, key) in self.sorts.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                let dir = match key.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                write!(f, "{} {dir}", key.column)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
