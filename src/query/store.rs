#![forbid(unsafe_code)]

//! Backing store contract and an in-memory implementation.
//!
//! A store receives a [`CompiledQuery`] and is responsible for the join,
//! filter, sort, distinct, and window mechanics. [`InMemoryStore`] keeps nested
//! [`Record`]s per entity and evaluates queries directly: every root record is
//! expanded into one row per combination of joined collection elements (a
//! row with a null binding when a collection is empty), rows are filtered by
//! the predicate, optionally collapsed to one row per root record, sorted
//! stably, and windowed.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::trace;

use super::coerce::coerce;
use super::errors::StoreError;
use super::predicate::{CompareOp, CompiledQuery, Predicate, StringMatch};
use super::request::SortDirection;
use super::resolve::{ColumnRef, Join, JoinId};
use super::schema::{FieldKind, LeafType, SchemaProvider};
use super::value::ComparableValue;

/// Half-open slice `[offset, offset + limit)` of the sorted result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    /// Rows skipped before the first returned item.
    pub offset: u64,
    /// Maximum number of items returned.
    pub limit: u64,
}

/// Executes compiled queries.
pub trait Store {
    /// Item type returned for each matching root entity.
    type Entity;

    /// Returns the window of matching root entities in sort order.
    fn fetch(
        &self,
        query: &CompiledQuery,
        window: Window,
        distinct: bool,
    ) -> Result<Vec<Self::Entity>, StoreError>;

    /// Counts matching rows; sorts in `query` are ignored.
    fn count(&self, query: &CompiledQuery, distinct: bool) -> Result<u64, StoreError>;
}

/// Field content of a [`Record`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Datum {
    /// Absent value or unset reference.
    Null,
    /// Typed scalar.
    Value(ComparableValue),
    /// Singular reference.
    One(Box<Record>),
    /// Collection; empty behaves as a left-join miss.
    Many(Vec<Record>),
}

/// An entity instance with nested related records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    id: i64,
    fields: BTreeMap<String, Datum>,
}

impl Record {
    /// Creates a record; `id` is also exposed as the `id` field.
    pub fn new(id: i64) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_owned(), Datum::Value(ComparableValue::Integer(id)));
        Self { id, fields }
    }

    /// Identity used for distinct.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Sets a scalar field.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<ComparableValue>) -> Self {
        self.fields
            .insert(field.into(), Datum::Value(value.into()));
        self
    }

    /// Sets a field to null.
    pub fn with_null(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), Datum::Null);
        self
    }

    /// Sets a singular reference.
    pub fn with_one(mut self, field: impl Into<String>, record: Record) -> Self {
        self.fields
            .insert(field.into(), Datum::One(Box::new(record)));
        self
    }

    /// Sets a collection.
    pub fn with_many(mut self, field: impl Into<String>, records: Vec<Record>) -> Self {
        self.fields.insert(field.into(), Datum::Many(records));
        self
    }

    /// Field content; absent fields read as null.
    pub fn get(&self, field: &str) -> Option<&Datum> {
        self.fields.get(field)
    }

    /// Nested JSON form.
    pub fn to_json(&self) -> JsonValue {
        let mut object = JsonMap::new();
        for (name, datum) in &self.fields {
            let value = match datum {
                Datum::Null => JsonValue::Null,
                Datum::Value(value) => value.to_json(),
                Datum::One(record) => record.to_json(),
                Datum::Many(records) => {
                    JsonValue::Array(records.iter().map(Record::to_json).collect())
                }
            };
            object.insert(name.clone(), value);
        }
        JsonValue::Object(object)
    }
}

/// Store holding every record in memory, grouped by entity name.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    tables: BTreeMap<String, Vec<Record>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record to the entity's table.
    pub fn insert(&mut self, entity: impl Into<String>, record: Record) {
        self.tables.entry(entity.into()).or_default().push(record);
    }

    /// Builder form of [`insert`](Self::insert) for several records.
    pub fn with_records(
        mut self,
        entity: impl Into<String>,
        records: impl IntoIterator<Item = Record>,
    ) -> Self {
        self.tables.entry(entity.into()).or_default().extend(records);
        self
    }

    /// Records of one entity in insertion order.
    pub fn records(&self, entity: &str) -> &[Record] {
        self.tables.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Loads a dataset of the form `{"Entity": [{...}, ...], ...}`, typing
    /// every scalar through `schema`.
    pub fn from_json(schema: &dyn SchemaProvider, data: &JsonValue) -> Result<Self, StoreError> {
        let tables = data
            .as_object()
            .ok_or_else(|| StoreError::new("dataset must be an object keyed by entity name"))?;
        let mut store = Self::new();
        for (entity, rows) in tables {
            if schema.entity(entity).is_none() {
                return Err(StoreError::new(format!("dataset names unknown entity '{entity}'")));
            }
            let rows = rows
                .as_array()
                .ok_or_else(|| StoreError::new(format!("'{entity}' must be an array of records")))?;
            for row in rows {
                let record = record_from_json(schema, entity, row)?;
                store.insert(entity.clone(), record);
            }
        }
        Ok(store)
    }

    fn matching_rows<'r>(
        &'r self,
        query: &CompiledQuery,
        distinct: bool,
    ) -> Result<Vec<Row<'r>>, StoreError> {
        let mut rows = Vec::new();
        let mut seen = HashSet::new();
        for record in self.records(&query.root) {
            for row in expand(record, &query.joins)? {
                let keep = match &query.predicate {
                    Some(predicate) => evaluate(predicate, &row)?,
                    None => true,
                };
                if !keep || (distinct && !seen.insert(record.id)) {
                    continue;
                }
                rows.push(row);
            }
        }
        trace!(root = %query.root, rows = rows.len(), distinct, "matched rows");
        Ok(rows)
    }
}

impl Store for InMemoryStore {
    type Entity = Record;

    fn fetch(
        &self,
        query: &CompiledQuery,
        window: Window,
        distinct: bool,
    ) -> Result<Vec<Record>, StoreError> {
        let rows = self.matching_rows(query, distinct)?;
        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let keys = query
                .sorts
                .iter()
                .map(|key| column_value(&row, &key.column))
                .collect::<Result<Vec<_>, _>>()?;
            keyed.push((keys, row));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            for ((left, right), key) in a.iter().zip(b).zip(&query.sorts) {
                let ord = nulls_first(*left, *right);
                let ord = match key.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        let offset = usize::try_from(window.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(window.limit).unwrap_or(usize::MAX);
        Ok(keyed
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, row)| row.root.clone())
            .collect())
    }

    fn count(&self, query: &CompiledQuery, distinct: bool) -> Result<u64, StoreError> {
        Ok(self.matching_rows(query, distinct)?.len() as u64)
    }
}

/// A root record with one binding per join; `None` is a left-join miss.
#[derive(Clone)]
struct Row<'r> {
    root: &'r Record,
    bound: Vec<Option<&'r Record>>,
}

impl<'r> Row<'r> {
    fn base(&self, join: Option<JoinId>) -> Result<Option<&'r Record>, StoreError> {
        match join {
            None => Ok(Some(self.root)),
            Some(id) => self
                .bound
                .get(id.0 as usize)
                .copied()
                .ok_or_else(|| StoreError::new(format!("join {id} referenced before it was bound"))),
        }
    }
}

fn mismatch(record: &Record, field: &str, expected: &str) -> StoreError {
    StoreError::new(format!(
        "field '{field}' of record {} is not {expected}",
        record.id
    ))
}

fn expand<'r>(root: &'r Record, joins: &[Join]) -> Result<Vec<Row<'r>>, StoreError> {
    let mut rows = vec![Row {
        root,
        bound: Vec::with_capacity(joins.len()),
    }];
    for join in joins {
        let mut next = Vec::with_capacity(rows.len());
        for row in rows {
            let elements = match row.base(join.parent)? {
                Some(base) => collection_at(base, &join.hops)?,
                None => Vec::new(),
            };
            if elements.is_empty() {
                let mut missed = row;
                missed.bound.push(None);
                next.push(missed);
                continue;
            }
            for element in elements {
                let mut joined = row.clone();
                joined.bound.push(Some(element));
                next.push(joined);
            }
        }
        rows = next;
    }
    Ok(rows)
}

fn collection_at<'r>(base: &'r Record, hops: &[String]) -> Result<Vec<&'r Record>, StoreError> {
    let Some((last, refs)) = hops.split_last() else {
        return Err(StoreError::new("join without a collection field"));
    };
    let mut record = base;
    for hop in refs {
        match record.get(hop) {
            Some(Datum::One(next)) => record = &**next,
            None | Some(Datum::Null) => return Ok(Vec::new()),
            Some(_) => return Err(mismatch(record, hop, "a reference")),
        }
    }
    match record.get(last) {
        Some(Datum::Many(elements)) => Ok(elements.iter().collect()),
        None | Some(Datum::Null) => Ok(Vec::new()),
        Some(_) => Err(mismatch(record, last, "a collection")),
    }
}

fn column_value<'r>(row: &Row<'r>, column: &ColumnRef) -> Result<Option<&'r ComparableValue>, StoreError> {
    let Some(mut record) = row.base(column.join)? else {
        return Ok(None);
    };
    let Some((last, refs)) = column.hops.split_last() else {
        return Err(StoreError::new(format!("column '{}' has no field", column.path)));
    };
    for hop in refs {
        match record.get(hop) {
            Some(Datum::One(next)) => record = &**next,
            None | Some(Datum::Null) => return Ok(None),
            Some(_) => return Err(mismatch(record, hop, "a reference")),
        }
    }
    match record.get(last) {
        Some(Datum::Value(value)) => Ok(Some(value)),
        None | Some(Datum::Null) => Ok(None),
        Some(_) => Err(mismatch(record, last, "a scalar")),
    }
}

fn nulls_first(left: Option<&ComparableValue>, right: Option<&ComparableValue>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(l), Some(r)) => l.compare(r).unwrap_or(Ordering::Equal),
    }
}

fn evaluate(predicate: &Predicate, row: &Row<'_>) -> Result<bool, StoreError> {
    match predicate {
        Predicate::And(children) => {
            for child in children {
                if !evaluate(child, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(children) => {
            for child in children {
                if evaluate(child, row)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::Not(inner) => Ok(!evaluate(inner, row)?),
        Predicate::Compare { column, op, value } => {
            let Some(actual) = column_value(row, column)? else {
                return Ok(false);
            };
            let ord = actual.compare(value);
            Ok(match op {
                CompareOp::Eq => ord == Some(Ordering::Equal),
                CompareOp::Lt => ord == Some(Ordering::Less),
                CompareOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
                CompareOp::Gt => ord == Some(Ordering::Greater),
                CompareOp::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            })
        }
        Predicate::Like {
            column,
            kind,
            pattern,
        } => {
            let actual = column_value(row, column)?.and_then(ComparableValue::as_str);
            Ok(actual.is_some_and(|text| match kind {
                StringMatch::Prefix => text.starts_with(pattern.as_str()),
                StringMatch::Suffix => text.ends_with(pattern.as_str()),
                StringMatch::Contains => text.contains(pattern.as_str()),
            }))
        }
        Predicate::In { column, values } => Ok(column_value(row, column)?
            .is_some_and(|actual| values.iter().any(|candidate| actual.matches(candidate)))),
        Predicate::Between { column, low, high } => Ok(column_value(row, column)?.is_some_and(|actual| {
            matches!(actual.compare(low), Some(Ordering::Greater | Ordering::Equal))
                && matches!(actual.compare(high), Some(Ordering::Less | Ordering::Equal))
        })),
        Predicate::IsNull(column) => Ok(column_value(row, column)?.is_none()),
        Predicate::IsNotNull(column) => Ok(column_value(row, column)?.is_some()),
    }
}

fn record_from_json(
    schema: &dyn SchemaProvider,
    entity: &str,
    value: &JsonValue,
) -> Result<Record, StoreError> {
    let object = value
        .as_object()
        .ok_or_else(|| StoreError::new(format!("{entity} record must be an object")))?;
    let id = object
        .get("id")
        .and_then(JsonValue::as_i64)
        .ok_or_else(|| StoreError::new(format!("{entity} record requires an integer 'id'")))?;
    let mut record = Record::new(id);
    for (field, raw) in object {
        if field == "id" {
            continue;
        }
        let kind = schema
            .field(entity, field)
            .ok_or_else(|| StoreError::new(format!("unknown field '{field}' on {entity}")))?;
        let datum = match (kind, raw) {
            (_, JsonValue::Null) => match kind {
                FieldKind::Collection(_) => Datum::Many(Vec::new()),
                _ => Datum::Null,
            },
            (FieldKind::Leaf(leaf), raw) => Datum::Value(scalar_from_json(leaf, raw, entity, field)?),
            (FieldKind::Reference(target), raw) => {
                Datum::One(Box::new(record_from_json(schema, target, raw)?))
            }
            (FieldKind::Collection(target), JsonValue::Array(items)) => Datum::Many(
                items
                    .iter()
                    .map(|item| record_from_json(schema, target, item))
                    .collect::<Result<_, _>>()?,
            ),
            (FieldKind::Collection(_), _) => {
                return Err(StoreError::new(format!("{entity}.{field} must be an array")));
            }
        };
        record.fields.insert(field.clone(), datum);
    }
    Ok(record)
}

fn scalar_from_json(
    leaf: &LeafType,
    raw: &JsonValue,
    entity: &str,
    field: &str,
) -> Result<ComparableValue, StoreError> {
    let literal = match raw {
        JsonValue::String(text) if *leaf == LeafType::String => {
            return Ok(ComparableValue::String(text.clone()));
        }
        JsonValue::String(text) => text.clone(),
        JsonValue::Number(number) => number.to_string(),
        JsonValue::Bool(flag) => flag.to_string(),
        _ => return Err(StoreError::new(format!("{entity}.{field} must be a scalar"))),
    };
    coerce(&literal, leaf)
        .map_err(|err| StoreError::with_source(format!("invalid value for {entity}.{field}"), err))
}
