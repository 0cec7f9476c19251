#![forbid(unsafe_code)]

//! Search request and response envelopes.

use serde::{Deserialize, Deserializer, Serialize};

use super::ast::Expression;
use super::errors::MalformedExpressionError;

/// Sort order for one sort key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    /// Ascending; nulls first.
    #[default]
    Asc,
    /// Descending; nulls last.
    Desc,
}

/// One sort directive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortExpression {
    /// Dot-separated property path.
    pub property: String,
    /// Sort order, `Asc` when omitted.
    #[serde(default, alias = "direction")]
    pub mode: SortDirection,
}

impl SortExpression {
    /// Ascending sort on `property`.
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            mode: SortDirection::Asc,
        }
    }

    /// Descending sort on `property`.
    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            mode: SortDirection::Desc,
        }
    }
}

/// A page request against one entity type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchRequest {
    /// Zero-based offset of the first returned item; negative offsets fail
    /// validation.
    #[serde(default)]
    pub start_index: i64,
    /// Page size; must be at least one.
    #[serde(default)]
    pub count: i64,
    /// Collapse duplicate root entities produced by collection joins.
    #[serde(default)]
    pub distinct: bool,
    /// Optional filter; absent matches every entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expression>,
    /// Sort keys, most significant first.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sorts: Vec<SortExpression>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<SortExpression>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<SortExpression>>::deserialize(deserializer)?.unwrap_or_default())
}

impl SearchRequest {
    /// Unfiltered, unsorted page `[start_index, start_index + count)`.
    pub fn page(start_index: i64, count: i64) -> Self {
        Self {
            start_index,
            count,
            distinct: false,
            filter: None,
            sorts: Vec::new(),
        }
    }

    /// Sets the filter.
    pub fn with_filter(mut self, filter: Expression) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Appends a sort key.
    pub fn sorted_by(mut self, sort: SortExpression) -> Self {
        self.sorts.push(sort);
        self
    }

    /// Sets the distinct flag.
    pub fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Decodes a request from JSON text.
    pub fn from_json(text: &str) -> Result<Self, MalformedExpressionError> {
        serde_json::from_str(text).map_err(|err| MalformedExpressionError::new(err.to_string()))
    }
}

/// A page of results plus the optional total match count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<D> {
    /// Items of the requested window, in sort order.
    pub items: Vec<D>,
    /// Total matches ignoring the window; `None` when not requested.
    pub total_count: Option<u64>,
}

impl<D> SearchResult<D> {
    /// Converts every item, keeping the total.
    pub fn map<T, F>(self, f: F) -> SearchResult<T>
    where
        F: FnMut(D) -> T,
    {
        SearchResult {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
        }
    }
}
