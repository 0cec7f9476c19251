#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::error::Error as StdError;

use thiserror::Error;

/// A filter payload could not be decoded into an expression tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed filter expression: {message}")]
pub struct MalformedExpressionError {
    /// Human-readable description of the decode failure.
    pub message: String,
}

impl MalformedExpressionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Structural violations detected before compilation.
///
/// Every node-level variant carries the rendered form of the offending node so
/// clients can locate it inside a large filter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `And`/`Or` supplied fewer than two operands.
    #[error("more than one operand required (got {found}): {node}")]
    TooFewOperands { found: usize, node: String },
    /// Comparison node with an empty or whitespace-only property.
    #[error("property required: {node}")]
    PropertyRequired { node: String },
    /// Single-value comparison with an empty or whitespace-only value.
    #[error("value required: {node}")]
    ValueRequired { node: String },
    /// Multi-value comparison with an empty value list.
    #[error("values required: {node}")]
    ValuesRequired { node: String },
    /// Multi-value comparison containing a null entry.
    #[error("values[{index}] must not be null: {node}")]
    NullValue { index: usize, node: String },
    /// Multi-value comparison exceeding the configured list length.
    #[error("value list exceeds {max} entries (got {count}): {node}")]
    TooManyValues {
        count: usize,
        max: usize,
        node: String,
    },
    /// Filter nesting exceeds the configured depth.
    #[error("filter exceeds maximum depth {max} (got {depth})")]
    TooDeep { depth: usize, max: usize },
    /// Filter exceeds the configured node count.
    #[error("filter exceeds {max} nodes (got {count})")]
    TooManyNodes { count: usize, max: usize },
    /// Page offset below zero.
    #[error("startIndex must not be negative (got {start_index})")]
    NegativeStartIndex { start_index: i64 },
    /// Page size below one.
    #[error("count must be at least 1 (got {count})")]
    CountRequired { count: i64 },
    /// Page size above the configured maximum.
    #[error("count {count} exceeds maximum page size {max}")]
    PageTooLarge { count: i64, max: u32 },
    /// Sort directive with a blank property.
    #[error("sort property required at sorts[{index}]")]
    SortPropertyRequired { index: usize },
}

/// A property path failed to resolve against the entity schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnknownPropertyError {
    /// The segment does not exist on the entity reached so far.
    #[error("unknown property '{segment}' on {entity} (in path '{path}')")]
    UnknownSegment {
        entity: String,
        segment: String,
        path: String,
    },
    /// The path ended on a reference or collection instead of a scalar.
    #[error("path '{path}' ends on {kind} '{segment}' of {entity}; a scalar property is required")]
    NotALeaf {
        entity: String,
        segment: String,
        kind: &'static str,
        path: String,
    },
    /// The path continues past a scalar property.
    #[error("path '{path}' continues past scalar property '{segment}' of {entity}")]
    PastLeaf {
        entity: String,
        segment: String,
        path: String,
    },
    /// The path contains an empty segment (`a..b`, leading or trailing dot).
    #[error("path '{path}' contains an empty segment")]
    EmptySegment { path: String },
}

/// A literal could not be converted to the leaf property's type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot convert '{literal}' to {expected}: {reason}")]
pub struct CoercionError {
    /// Literal as supplied by the client.
    pub literal: String,
    /// Name of the target leaf type.
    pub expected: String,
    /// Parser diagnostic.
    pub reason: String,
}

/// Operator/type combinations the compiler refuses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Ordering or range operator applied to an unordered leaf type.
    #[error("operator {operator} requires an ordered property, but '{property}' is {leaf}")]
    NotOrderable {
        operator: &'static str,
        property: String,
        leaf: String,
    },
    /// String-match operator applied to a non-string leaf.
    #[error("operator {operator} requires a string property, but '{property}' is {leaf}")]
    NotAString {
        operator: &'static str,
        property: String,
        leaf: String,
    },
    /// A node reached a compiler registered for a different node kind.
    #[error("no compiler for {node}")]
    Unsupported { node: String },
}

/// Opaque failure reported by a backing store.
#[derive(Debug, Error)]
#[error("store execution failed: {message}")]
pub struct StoreError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl StoreError {
    /// Creates an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an underlying store failure.
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Store-supplied description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Every failure a search request can terminate with.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Malformed(#[from] MalformedExpressionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    UnknownProperty(#[from] UnknownPropertyError),
    #[error(transparent)]
    Coercion(#[from] CoercionError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The target entity is not described by the schema provider.
    #[error("unknown entity '{entity}'")]
    UnknownEntity { entity: String },
}

impl SearchError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::Malformed(_) => "MalformedExpression",
            SearchError::Validation(_) => "Validation",
            SearchError::UnknownProperty(_) => "UnknownProperty",
            SearchError::Coercion(_) => "Coercion",
            SearchError::Compile(_) => "Compile",
            SearchError::Store(_) => "StoreExecution",
            SearchError::UnknownEntity { .. } => "UnknownEntity",
        }
    }
}

impl ValidationError {
    /// Fine-grained code for the violated rule.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::TooFewOperands { .. } => "TooFewOperands",
            ValidationError::PropertyRequired { .. } => "PropertyRequired",
            ValidationError::ValueRequired { .. } => "ValueRequired",
            ValidationError::ValuesRequired { .. } => "ValuesRequired",
            ValidationError::NullValue { .. } => "NullValue",
            ValidationError::TooManyValues { .. } => "TooManyValues",
            ValidationError::TooDeep { .. } => "TooDeep",
            ValidationError::TooManyNodes { .. } => "TooManyNodes",
            ValidationError::NegativeStartIndex { .. } => "NegativeStartIndex",
            ValidationError::CountRequired { .. } => "CountRequired",
            ValidationError::PageTooLarge { .. } => "PageTooLarge",
            ValidationError::SortPropertyRequired { .. } => "SortPropertyRequired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_error_kind() {
        let err: SearchError = ValidationError::PropertyRequired {
            node: "Equal(, \"x\")".into(),
        }
        .into();
        assert_eq!(err.code(), "Validation");
        let err: SearchError = StoreError::new("connection reset").into();
        assert_eq!(err.code(), "StoreExecution");
        assert_eq!(err.to_string(), "store execution failed: connection reset");
    }

    #[test]
    fn store_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = StoreError::with_source("scan failed", io);
        assert!(StdError::source(&err).is_some());
        assert_eq!(err.message(), "scan failed");
    }
}
