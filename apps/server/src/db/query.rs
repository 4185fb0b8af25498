//! Chainable, deferred document queries
//!
//! [`FindQuery`] offers the familiar `find().populate().sort().select()`
//! call chain over PostgreSQL. Building a query is pure; the database is
//! only touched by [`exec`](FindQuery::exec), [`exec_one`](FindQuery::exec_one)
//! or [`count`](FindQuery::count).
//!
//! Rows come back as JSON documents assembled with `jsonb_build_object`, so
//! handlers can return them as-is. Every document carries the entity's
//! legacy aliases (see [`attach_aliases`]).

use futures::future::BoxFuture;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::{collections::HashMap, time::Instant};
use uuid::Uuid;

use super::document::{attach_aliases, ColumnType, EntityDef};
use super::filter::{Filter, FilterArray, FilterValue};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateSpec {
    pub path: String,
    pub select: Option<String>,
    pub nested: Vec<PopulateSpec>,
}

impl PopulateSpec {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            select: None,
            nested: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FindQuery {
    def: &'static EntityDef,
    filter: Filter,
    sort: Option<String>,
    select: Option<String>,
    populate: Vec<PopulateSpec>,
    limit: Option<i64>,
    skip: Option<i64>,
}

impl FindQuery {
    pub fn new(def: &'static EntityDef) -> Self {
        Self {
            def,
            filter: Filter::new(),
            sort: None,
            select: None,
            populate: Vec::new(),
            limit: None,
            skip: None,
        }
    }

    pub fn entity(&self) -> &'static EntityDef {
        self.def
    }

    /// AND another filter into the query.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and(filter);
        self
    }

    pub fn where_eq(mut self, column: &'static str, value: FilterValue) -> Self {
        self.filter = self.filter.eq(column, value);
        self
    }

    pub fn by_id(self, id: Uuid) -> Self {
        self.where_eq("id", FilterValue::Uuid(id))
    }

    /// Space or comma separated fields; a leading `-` sorts descending.
    pub fn sort(mut self, spec: &str) -> Self {
        self.sort = Some(spec.to_string());
        self
    }

    /// Space or comma separated fields to include, or `-field` to exclude.
    /// Inclusion and exclusion cannot be mixed. `id` is always returned.
    pub fn select(mut self, spec: &str) -> Self {
        self.select = Some(spec.to_string());
        self
    }

    /// Embed the referenced document at `path`. Dotted paths populate
    /// nested relations (`"doctor.user"`).
    pub fn populate(mut self, path: &str) -> Self {
        self.populate_node(path);
        self
    }

    /// Populate `path`, restricting the embedded document to `select`.
    pub fn populate_select(mut self, path: &str, select: &str) -> Self {
        self.populate_node(path).select = Some(select.to_string());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    fn populate_node(&mut self, path: &str) -> &mut PopulateSpec {
        let mut parents: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let leaf = parents.pop().unwrap_or(path);

        let mut level = &mut self.populate;
        for segment in parents {
            let index = find_or_insert(level, segment);
            level = &mut level[index].nested;
        }
        let index = find_or_insert(level, leaf);
        &mut level[index]
    }

    /// Column list after applying `select` and the populate requirements.
    fn selected_columns(&self) -> Result<Vec<&'static str>> {
        let mut include: Vec<&'static str> = Vec::new();
        let mut exclude: Vec<&'static str> = Vec::new();

        if let Some(spec) = &self.select {
            for token in split_fields(spec) {
                match token.strip_prefix('-') {
                    Some(field) => exclude.push(self.def.visible_field(field)?.name),
                    None => include.push(self.def.visible_field(token.trim_start_matches('+'))?.name),
                }
            }
        }

        if !include.is_empty() && !exclude.is_empty() {
            return Err(Error::InvalidQuery(
                "select cannot mix inclusion and exclusion".to_string(),
            ));
        }
        if exclude.contains(&"id") {
            return Err(Error::InvalidQuery("the id field cannot be excluded".to_string()));
        }

        let mut required: Vec<&'static str> = vec!["id"];
        for spec in &self.populate {
            let relation = self.def.relation(&spec.path).ok_or_else(|| {
                Error::InvalidQuery(format!(
                    "cannot populate '{}' on {}",
                    spec.path, self.def.name
                ))
            })?;
            required.push(relation.local_key);
        }

        let columns = self
            .def
            .visible_columns()
            .map(|c| c.name)
            .filter(|name| {
                required.contains(name)
                    || if include.is_empty() {
                        !exclude.contains(name)
                    } else {
                        include.contains(name)
                    }
            })
            .collect();
        Ok(columns)
    }

    fn order_by(&self) -> Result<Vec<(&'static str, SortDirection)>> {
        let spec = self.sort.as_deref().unwrap_or(self.def.default_sort);
        let mut order = Vec::new();
        for token in split_fields(spec) {
            let (field, direction) = match token.strip_prefix('-') {
                Some(field) => (field, SortDirection::Desc),
                None => (token.trim_start_matches('+'), SortDirection::Asc),
            };
            let column = self.def.visible_field(field)?;
            if column.ty == ColumnType::Json {
                return Err(Error::InvalidQuery(format!("cannot sort on '{field}'")));
            }
            if !order.iter().any(|(name, _)| *name == column.name) {
                order.push((column.name, direction));
            }
        }
        Ok(order)
    }

    /// Render the SELECT statement without executing it.
    pub fn build_select(&self) -> Result<QueryBuilder<'static, Postgres>> {
        let columns = self.selected_columns()?;
        let order = self.order_by()?;

        let mut qb = QueryBuilder::new("SELECT jsonb_build_object(");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push("'").push(*column).push("', ").push(*column);
        }
        qb.push(") AS doc FROM ").push(self.def.table);

        self.filter.push_where(&mut qb);

        for (i, (column, direction)) in order.iter().enumerate() {
            qb.push(if i == 0 { " ORDER BY " } else { ", " });
            qb.push(*column);
            qb.push(match direction {
                SortDirection::Asc => " ASC",
                SortDirection::Desc => " DESC",
            });
        }

        if let Some(limit) = self.limit {
            if limit < 0 {
                return Err(Error::InvalidQuery("limit must not be negative".to_string()));
            }
            qb.push(" LIMIT ").push_bind(limit);
        }
        if let Some(skip) = self.skip {
            if skip < 0 {
                return Err(Error::InvalidQuery("skip must not be negative".to_string()));
            }
            qb.push(" OFFSET ").push_bind(skip);
        }

        Ok(qb)
    }

    pub fn build_count(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM ");
        qb.push(self.def.table);
        self.filter.push_where(&mut qb);
        qb
    }

    /// Run the query and return every matching document.
    pub async fn exec(&self, pool: &PgPool) -> Result<Vec<JsonValue>> {
        self.exec_docs(pool).await
    }

    /// Run the query and return the first document, or `None`.
    pub async fn exec_one(&self, pool: &PgPool) -> Result<Option<JsonValue>> {
        let query = self.clone().limit(1);
        Ok(query.exec_docs(pool).await?.into_iter().next())
    }

    pub async fn count(&self, pool: &PgPool) -> Result<i64> {
        let mut qb = self.build_count();
        let count = qb.build_query_scalar::<i64>().fetch_one(pool).await?;
        Ok(count)
    }

    fn exec_docs<'a>(&'a self, pool: &'a PgPool) -> BoxFuture<'a, Result<Vec<JsonValue>>> {
        Box::pin(async move {
            let mut qb = self.build_select()?;
            let start = Instant::now();
            let mut docs = qb.build_query_scalar::<JsonValue>().fetch_all(pool).await?;
            super::observe(self.def.name, "find", start);

            for doc in docs.iter_mut() {
                attach_aliases(self.def, doc);
            }

            for spec in &self.populate {
                populate_relation(self.def, spec, &mut docs, pool).await?;
            }

            tracing::trace!(entity = self.def.name, rows = docs.len(), "find executed");
            Ok(docs)
        })
    }
}

async fn populate_relation(
    def: &'static EntityDef,
    spec: &PopulateSpec,
    docs: &mut [JsonValue],
    pool: &PgPool,
) -> Result<()> {
    let relation = def.relation(&spec.path).ok_or_else(|| {
        Error::InvalidQuery(format!("cannot populate '{}' on {}", spec.path, def.name))
    })?;

    let mut ids: Vec<Uuid> = docs
        .iter()
        .filter_map(|doc| doc.get(relation.local_key)?.as_str()?.parse().ok())
        .collect();
    ids.sort_unstable();
    ids.dedup();

    let mut by_id: HashMap<String, JsonValue> = HashMap::new();
    if !ids.is_empty() {
        let mut query = FindQuery::new((relation.target)())
            .filter(Filter::new().is_in("id", FilterArray::Uuid(ids)));
        if let Some(select) = &spec.select {
            query = query.select(select);
        }
        query.populate = spec.nested.clone();

        for related in query.exec_docs(pool).await? {
            if let Some(id) = related.get("id").and_then(JsonValue::as_str) {
                by_id.insert(id.to_string(), related.clone());
            }
        }
    }

    for doc in docs.iter_mut() {
        let embedded = doc
            .get(relation.local_key)
            .and_then(JsonValue::as_str)
            .and_then(|key| by_id.get(key).cloned())
            .unwrap_or(JsonValue::Null);
        if let Some(obj) = doc.as_object_mut() {
            obj.insert(relation.path.to_string(), embedded);
        }
    }
    Ok(())
}

fn find_or_insert(level: &mut Vec<PopulateSpec>, segment: &str) -> usize {
    match level.iter().position(|p| p.path == segment) {
        Some(index) => index,
        None => {
            level.push(PopulateSpec::new(segment));
            level.len() - 1
        }
    }
}

fn split_fields(spec: &str) -> impl Iterator<Item = &str> {
    spec.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
}
