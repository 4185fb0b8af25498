//! Entity descriptors and legacy document aliases
//!
//! Every table the API exposes is described by a static [`EntityDef`]. The
//! descriptor drives filter translation, `sort`/`select` validation and
//! `populate`, and lists the legacy field aliases (`_id`, `createdAt`,
//! `doctor`, ...) that older clients still read from responses.

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// Storage type of a column, used to coerce loosely-typed filter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Text,
    Timestamp,
    Date,
    Bool,
    Integer,
    /// JSONB payloads. Selectable, but neither filterable nor sortable.
    Json,
}

#[derive(Debug)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    /// Legacy field name mirrored into every returned document.
    pub alias: Option<&'static str>,
    /// Hidden columns are never selected, filtered or sorted on.
    pub hidden: bool,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            alias: None,
            hidden: false,
        }
    }

    pub const fn alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// A foreign key that can be populated with the referenced document.
#[derive(Debug)]
pub struct Relation {
    /// Field the populated document is written to. Matches the alias of
    /// `local_key`, so an unpopulated document carries the bare id there.
    pub path: &'static str,
    pub local_key: &'static str,
    pub target: fn() -> &'static EntityDef,
}

#[derive(Debug)]
pub struct EntityDef {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [Column],
    pub relations: &'static [Relation],
    /// Sort applied when the caller gives none, in `sort()` syntax.
    pub default_sort: &'static str,
}

impl EntityDef {
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Resolve a caller-supplied field name: a column name, a legacy alias,
    /// or `_id`.
    pub fn resolve_field(&self, key: &str) -> Option<&'static Column> {
        if key == "_id" {
            return self.column("id");
        }
        self.columns
            .iter()
            .find(|c| c.name == key || c.alias == Some(key))
    }

    /// Like [`resolve_field`](Self::resolve_field) but rejects unknown and
    /// hidden fields.
    pub fn visible_field(&self, key: &str) -> Result<&'static Column> {
        match self.resolve_field(key) {
            Some(column) if !column.hidden => Ok(column),
            _ => Err(Error::InvalidQuery(format!(
                "unknown field '{}' for {}",
                key, self.name
            ))),
        }
    }

    pub fn visible_columns(&self) -> impl Iterator<Item = &'static Column> {
        self.columns.iter().filter(|c| !c.hidden)
    }

    pub fn relation(&self, path: &str) -> Option<&'static Relation> {
        self.relations.iter().find(|r| r.path == path)
    }
}

/// Mirror `id` into `_id` and every aliased column into its legacy name.
///
/// Existing keys are left alone, so a populated relation written at its
/// alias is never replaced by the bare foreign key.
pub fn attach_aliases(def: &EntityDef, doc: &mut JsonValue) {
    let Some(obj) = doc.as_object_mut() else {
        return;
    };

    if let Some(id) = obj.get("id").cloned() {
        obj.entry("_id").or_insert(id);
    }

    for column in def.columns {
        let Some(alias) = column.alias else {
            continue;
        };
        if let Some(value) = obj.get(column.name).cloned() {
            obj.entry(alias).or_insert(value);
        }
    }
}

/// Serialize a typed record and attach its legacy aliases.
pub fn to_document<T: Serialize>(def: &EntityDef, record: &T) -> Result<JsonValue> {
    let mut doc = serde_json::to_value(record)
        .map_err(|e| Error::Internal(format!("failed to serialize {}: {e}", def.name)))?;
    attach_aliases(def, &mut doc);
    Ok(doc)
}
