#![forbid(unsafe_code)]

//! Declarative filter compilation and search execution.
//!
//! A request flows through the submodules in order: the filter is decoded
//! ([`ast`]), checked for shape ([`validate`]), compiled against an entity
//! schema ([`compile`], using [`resolve`] and [`coerce`]), and executed by a
//! [`store::Store`] under the control of [`executor`].

/// Filter expression tree and wire decoding.
pub mod ast;

/// Literal-to-value coercion per leaf type.
pub mod coerce;

/// Dispatch-table filter compiler.
pub mod compile;

/// Error types for every search stage.
pub mod errors;

/// Search entry points.
pub mod executor;

/// Schemas of the forum entities.
pub mod forum;

/// Native predicates and compiled queries.
pub mod predicate;

/// Request and response envelopes.
pub mod request;

/// Property path resolution and join registration.
pub mod resolve;

/// Entity schema description and providers.
pub mod schema;

/// Backing store contract and the in-memory store.
pub mod store;

/// Structural validation.
pub mod validate;

/// Typed comparable values.
pub mod value;

pub use ast::{
    ComparisonOperator, Expression, LogicalOperator, MembershipOperator, NegationOperator,
    NodeKind, PresenceOperator, RangeOperator,
};
pub use compile::{compile, compile_query, Compiler};
pub use errors::{
    CoercionError, CompileError, MalformedExpressionError, SearchError, StoreError,
    UnknownPropertyError, ValidationError,
};
pub use executor::{search, SearchExecutor};
pub use predicate::{CompiledFilter, CompiledQuery, Predicate};
pub use request::{SearchRequest, SearchResult, SortDirection, SortExpression};
pub use schema::{EntitySchema, FieldKind, InMemorySchema, LeafType, SchemaProvider};
pub use store::{InMemoryStore, Record, Store, Window};
pub use validate::{validate, validate_request, validate_with};
pub use value::ComparableValue;
