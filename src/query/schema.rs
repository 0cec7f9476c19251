#![forbid(unsafe_code)]

//! Static entity schemas used to resolve property paths.
//!
//! Every entity is a flat map from field name to [`FieldKind`]: a scalar leaf,
//! a singular reference to another entity, or a collection of references.
//! Schemas are plain data; nothing is discovered at run time.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

/// Enumeration type with an ordered member list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumType {
    /// Type name used in diagnostics.
    pub name: String,
    /// Member names in declaration order.
    pub members: Vec<String>,
}

impl EnumType {
    /// Creates an enumeration from its members in declaration order.
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// Declaration index of `member`, matched exactly.
    pub fn ordinal(&self, member: &str) -> Option<usize> {
        self.members.iter().position(|m| m == member)
    }
}

/// Scalar types a property path may end on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LeafType {
    String,
    Integer,
    Decimal,
    Boolean,
    Enumeration(EnumType),
    Date,
    DateTime,
    Time,
    Instant,
    /// Any other named type; literals are compared as raw text.
    Opaque(String),
}

impl LeafType {
    /// Parses a schema-file type name. Unrecognised names become opaque.
    pub fn from_name(name: &str) -> LeafType {
        match name {
            "string" => LeafType::String,
            "integer" | "long" => LeafType::Integer,
            "decimal" => LeafType::Decimal,
            "boolean" => LeafType::Boolean,
            "date" => LeafType::Date,
            "datetime" => LeafType::DateTime,
            "time" => LeafType::Time,
            "instant" => LeafType::Instant,
            other => LeafType::Opaque(other.to_owned()),
        }
    }

    /// Whether ordering and range operators apply.
    pub fn is_orderable(&self) -> bool {
        !matches!(self, LeafType::Boolean | LeafType::Opaque(_))
    }
}

impl fmt::Display for LeafType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafType::String => f.write_str("string"),
            LeafType::Integer => f.write_str("integer"),
            LeafType::Decimal => f.write_str("decimal"),
            LeafType::Boolean => f.write_str("boolean"),
            LeafType::Enumeration(ty) => write!(f, "enumeration {}", ty.name),
            LeafType::Date => f.write_str("date"),
            LeafType::DateTime => f.write_str("datetime"),
            LeafType::Time => f.write_str("time"),
            LeafType::Instant => f.write_str("instant"),
            LeafType::Opaque(name) => write!(f, "opaque type {name}"),
        }
    }
}

/// Declared kind of one entity field.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "RawField")]
pub enum FieldKind {
    /// Scalar property.
    Leaf(LeafType),
    /// Singular reference to the named entity.
    Reference(String),
    /// To-many relation to the named entity.
    Collection(String),
}

impl FieldKind {
    /// Short description used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            FieldKind::Leaf(_) => "scalar",
            FieldKind::Reference(_) => "reference",
            FieldKind::Collection(_) => "collection",
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawField {
    Leaf(String),
    Reference { reference: String },
    Collection { collection: String },
    Enumeration { enumeration: String, members: Vec<String> },
}

impl From<RawField> for FieldKind {
    fn from(raw: RawField) -> Self {
        match raw {
            RawField::Leaf(name) => FieldKind::Leaf(LeafType::from_name(&name)),
            RawField::Reference { reference } => FieldKind::Reference(reference),
            RawField::Collection { collection } => FieldKind::Collection(collection),
            RawField::Enumeration {
                enumeration,
                members,
            } => FieldKind::Leaf(LeafType::Enumeration(EnumType::new(enumeration, members))),
        }
    }
}

/// Field declarations of one entity type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntitySchema {
    name: String,
    fields: BTreeMap<String, FieldKind>,
}

impl EntitySchema {
    /// Creates an entity with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Declares a scalar field.
    pub fn with_leaf(mut self, field: impl Into<String>, ty: LeafType) -> Self {
        self.fields.insert(field.into(), FieldKind::Leaf(ty));
        self
    }

    /// Declares a singular reference to `target`.
    pub fn with_reference(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.fields
            .insert(field.into(), FieldKind::Reference(target.into()));
        self
    }

    /// Declares a to-many relation to `target`.
    pub fn with_collection(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.fields
            .insert(field.into(), FieldKind::Collection(target.into()));
        self
    }

    /// Entity type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up one field.
    pub fn field(&self, name: &str) -> Option<&FieldKind> {
        self.fields.get(name)
    }

    /// Iterates fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), kind))
    }
}

/// Provides entity schemas to the path resolver. Providers are shared
/// read-only between threads.
pub trait SchemaProvider: Send + Sync {
    /// Returns the schema of the named entity.
    fn entity(&self, name: &str) -> Option<&EntitySchema>;

    /// Returns the declared kind of `entity.field`.
    fn field(&self, entity: &str, field: &str) -> Option<&FieldKind> {
        self.entity(entity)?.field(field)
    }
}

/// Schema provider holding every entity in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "SchemaDocument")]
pub struct InMemorySchema {
    entities: BTreeMap<String, EntitySchema>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDocument {
    entities: BTreeMap<String, BTreeMap<String, FieldKind>>,
}

impl From<SchemaDocument> for InMemorySchema {
    fn from(doc: SchemaDocument) -> Self {
        let entities = doc
            .entities
            .into_iter()
            .map(|(name, fields)| {
                let schema = EntitySchema {
                    name: name.clone(),
                    fields,
                };
                (name, schema)
            })
            .collect();
        Self { entities }
    }
}

impl InMemorySchema {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity, replacing any previous one of the same name.
    pub fn with_entity(mut self, entity: EntitySchema) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Parses a JSON schema document.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Parses a TOML schema document.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Entity names in sorted order.
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// References and collections whose target entity is not registered,
    /// as `(entity, field, target)`.
    pub fn dangling_references(&self) -> Vec<(&str, &str, &str)> {
        let mut dangling = Vec::new();
        for entity in self.entities.values() {
            for (field, kind) in entity.fields() {
                if let FieldKind::Reference(target) | FieldKind::Collection(target) = kind {
                    if !self.entities.contains_key(target) {
                        dangling.push((entity.name(), field, target.as_str()));
                    }
                }
            }
        }
        dangling
    }
}

impl SchemaProvider for InMemorySchema {
    fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }
}
