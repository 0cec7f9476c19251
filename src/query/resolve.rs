#![forbid(unsafe_code)]

//! Property path resolution.
//!
//! A path such as `community.members.username` is walked one segment at a
//! time from the root entity. Singular references are followed in place.
//! Every collection hop introduces a left join, identified by the path prefix
//! that ends at the collection field. A prefix that was already joined during
//! the same resolution pass reuses its join, so `members.username` and
//! `members.email` filter the same joined row.

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use super::errors::UnknownPropertyError;
use super::schema::{FieldKind, LeafType, SchemaProvider};

/// Convenience alias for resolution results.
pub type ResolveResult<T> = std::result::Result<T, UnknownPropertyError>;

/// Index of a join within one compiled query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinId(pub u32);

impl fmt::Display for JoinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "j{}", self.0)
    }
}

/// Left join of a to-many relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Join {
    /// Alias used by columns bound to this join.
    pub id: JoinId,
    /// Full path prefix ending at the collection field.
    pub path: String,
    /// Join this one hangs off; `None` for the root entity.
    pub parent: Option<JoinId>,
    /// Fields walked from the parent: singular references, then the collection.
    pub hops: Vec<String>,
    /// Element entity of the collection.
    pub entity: String,
}

/// A resolved scalar column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRef {
    /// Path as written by the client.
    pub path: String,
    /// Innermost join the column hangs off; `None` for the root entity.
    pub join: Option<JoinId>,
    /// Singular references to follow from the join (or root), ending with the
    /// scalar field itself.
    pub hops: Vec<String>,
    /// Type of the scalar field.
    pub leaf: LeafType,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.join {
            Some(join) => write!(f, "{join}.{}", self.hops.join(".")),
            None => write!(f, "root.{}", self.hops.join(".")),
        }
    }
}

/// Resolves paths against one root entity while accumulating joins.
pub struct PathResolver<'s> {
    schema: &'s dyn SchemaProvider,
    root: String,
    joins: Vec<Join>,
    by_path: HashMap<String, JoinId>,
}

impl<'s> PathResolver<'s> {
    /// Starts a resolution pass. Returns `None` when the schema does not know `root`.
    pub fn new(schema: &'s dyn SchemaProvider, root: &str) -> Option<Self> {
        schema.entity(root)?;
        Some(Self {
            schema,
            root: root.to_owned(),
            joins: Vec::new(),
            by_path: HashMap::new(),
        })
    }

    /// Root entity of this pass.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Joins registered so far, in registration order; parents precede children.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Consumes the resolver, yielding the registered joins.
    pub fn into_joins(self) -> Vec<Join> {
        self.joins
    }

    /// Resolves `path` to a scalar column, registering any joins it needs.
    pub fn resolve(&mut self, path: &str) -> ResolveResult<ColumnRef> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(UnknownPropertyError::EmptySegment {
                path: path.to_owned(),
            });
        }
        let schema = self.schema;
        let mut entity = self.root.clone();
        let mut join: Option<JoinId> = None;
        let mut hops: Vec<String> = Vec::new();
        for (idx, segment) in segments.iter().enumerate() {
            let is_last = idx + 1 == segments.len();
            let kind = schema
                .field(&entity, segment)
                .ok_or_else(|| UnknownPropertyError::UnknownSegment {
                    entity: entity.clone(),
                    segment: (*segment).to_owned(),
                    path: path.to_owned(),
                })?;
            match kind {
                FieldKind::Leaf(leaf) => {
                    if !is_last {
                        return Err(UnknownPropertyError::PastLeaf {
                            entity,
                            segment: (*segment).to_owned(),
                            path: path.to_owned(),
                        });
                    }
                    hops.push((*segment).to_owned());
                    return Ok(ColumnRef {
                        path: path.to_owned(),
                        join,
                        hops,
                        leaf: leaf.clone(),
                    });
                }
                FieldKind::Reference(_) | FieldKind::Collection(_) if is_last => {
                    return Err(UnknownPropertyError::NotALeaf {
                        entity,
                        segment: (*segment).to_owned(),
                        kind: kind.describe(),
                        path: path.to_owned(),
                    });
                }
                FieldKind::Reference(target) => {
                    hops.push((*segment).to_owned());
                    entity = target.clone();
                }
                FieldKind::Collection(target) => {
                    hops.push((*segment).to_owned());
                    let prefix = segments[..=idx].join(".");
                    let target = target.clone();
                    join = Some(self.join_for(prefix, join, std::mem::take(&mut hops), &target));
                    entity = target;
                }
            }
        }
        // Every iteration either returns or advances; an empty path is caught above.
        Err(UnknownPropertyError::EmptySegment {
            path: path.to_owned(),
        })
    }

    fn join_for(
        &mut self,
        prefix: String,
        parent: Option<JoinId>,
        hops: Vec<String>,
        entity: &str,
    ) -> JoinId {
        if let Some(id) = self.by_path.get(&prefix) {
            return *id;
        }
        let id = JoinId(self.joins.len() as u32);
        trace!(join = %id, path = %prefix, entity, "registering left join");
        self.by_path.insert(prefix.clone(), id);
        self.joins.push(Join {
            id,
            path: prefix,
            parent,
            hops,
            entity: entity.to_owned(),
        });
        id
    }
}
