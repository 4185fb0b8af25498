//! Translation of loosely-typed query objects into SQL conditions
//!
//! Callers hand over document-style query objects such as
//! `{"status": "pending", "scheduledAt": {"$gte": "2024-05-01"}}` or URL
//! query maps (`status=pending&scheduled_at[$gte]=2024-05-01`). Each key is
//! resolved against the entity's [`EntityDef`], each value is coerced to the
//! column type, and the result renders as a parameterised `WHERE` clause.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value as JsonValue};
use sqlx::{Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use super::document::{Column, ColumnType, EntityDef};
use crate::{Error, Result};

/// Query-string keys that steer the query rather than filter it.
pub const RESERVED_PARAMS: &[&str] = &["sort", "select", "limit", "skip", "populate"];

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Uuid(Uuid),
    Text(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Bool(bool),
    Integer(i64),
}

/// Homogeneous list bound as a single Postgres array parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArray {
    Uuid(Vec<Uuid>),
    Text(Vec<String>),
    Timestamp(Vec<DateTime<Utc>>),
    Date(Vec<NaiveDate>),
    Bool(Vec<bool>),
    Integer(Vec<i64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => " = ",
            CompareOp::Ne => " <> ",
            CompareOp::Gt => " > ",
            CompareOp::Gte => " >= ",
            CompareOp::Lt => " < ",
            CompareOp::Lte => " <= ",
        }
    }

    fn from_operator(op: &str) -> Option<Self> {
        Some(match op {
            "$eq" => CompareOp::Eq,
            "$ne" => CompareOp::Ne,
            "$gt" => CompareOp::Gt,
            "$gte" => CompareOp::Gte,
            "$lt" => CompareOp::Lt,
            "$lte" => CompareOp::Lte,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        column: &'static str,
        op: CompareOp,
        value: FilterValue,
    },
    In {
        column: &'static str,
        values: FilterArray,
        negated: bool,
    },
    IsNull {
        column: &'static str,
        negated: bool,
    },
}

/// Conjunction of conditions. Empty filters match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document-style query object.
    pub fn parse(def: &EntityDef, query: &Map<String, JsonValue>) -> Result<Self> {
        let mut filter = Filter::new();
        for (key, value) in query {
            if key.starts_with('$') {
                return Err(Error::InvalidQuery(format!(
                    "top-level operator '{key}' is not supported"
                )));
            }
            let column = filterable(def, key)?;
            filter.push_value(column, value)?;
        }
        Ok(filter)
    }

    /// Parse URL query parameters, skipping [`RESERVED_PARAMS`].
    ///
    /// `field=value` is equality, `field[$op]=value` applies an operator and
    /// `$in`/`$nin` take comma-separated lists. The literal `null` matches
    /// missing values.
    pub fn from_query_params(def: &EntityDef, params: &HashMap<String, String>) -> Result<Self> {
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();

        let mut filter = Filter::new();
        for key in keys {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                continue;
            }
            let raw = &params[key];
            let (field, operator) = split_operator(key)?;
            let column = filterable(def, field)?;

            match operator {
                None if raw == "null" => filter.conditions.push(Condition::IsNull {
                    column: column.name,
                    negated: false,
                }),
                None => filter.push_compare(column, CompareOp::Eq, &JsonValue::String(raw.clone()))?,
                Some(op @ ("$in" | "$nin")) => {
                    let items: Vec<JsonValue> = raw
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| JsonValue::String(s.to_string()))
                        .collect();
                    filter.push_in(column, &items, op == "$nin")?;
                }
                Some(op) => {
                    let compare = CompareOp::from_operator(op).ok_or_else(|| {
                        Error::InvalidQuery(format!("unsupported operator '{op}'"))
                    })?;
                    filter.push_compare(column, compare, &JsonValue::String(raw.clone()))?;
                }
            }
        }
        Ok(filter)
    }

    /// Add an equality condition on a known column.
    pub fn eq(mut self, column: &'static str, value: FilterValue) -> Self {
        self.conditions.push(Condition::Compare {
            column,
            op: CompareOp::Eq,
            value,
        });
        self
    }

    pub fn is_in(mut self, column: &'static str, values: FilterArray) -> Self {
        self.conditions.push(Condition::In {
            column,
            values,
            negated: false,
        });
        self
    }

    pub fn and(mut self, other: Filter) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Append ` WHERE a AND b ...` to `qb`; nothing when empty.
    pub fn push_where(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        for (i, condition) in self.conditions.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            match condition {
                Condition::Compare { column, op, value } => {
                    qb.push(*column).push(op.sql());
                    bind_value(qb, value);
                }
                Condition::In {
                    column,
                    values,
                    negated,
                } => {
                    qb.push(*column);
                    qb.push(if *negated { " <> ALL(" } else { " = ANY(" });
                    bind_array(qb, values);
                    qb.push(")");
                }
                Condition::IsNull { column, negated } => {
                    qb.push(*column);
                    qb.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
                }
            }
        }
    }

    fn push_value(&mut self, column: &'static Column, value: &JsonValue) -> Result<()> {
        match value {
            JsonValue::Null => {
                self.conditions.push(Condition::IsNull {
                    column: column.name,
                    negated: false,
                });
                Ok(())
            }
            JsonValue::Array(_) => Err(Error::InvalidQuery(format!(
                "field '{}' takes a single value; use $in for lists",
                column.name
            ))),
            JsonValue::Object(ops) => {
                if ops.is_empty() {
                    return Err(Error::InvalidQuery(format!(
                        "empty operator object for field '{}'",
                        column.name
                    )));
                }
                for (op, operand) in ops {
                    match op.as_str() {
                        "$in" | "$nin" => {
                            let items = operand.as_array().ok_or_else(|| {
                                Error::InvalidQuery(format!("{op} expects an array"))
                            })?;
                            self.push_in(column, items, op == "$nin")?;
                        }
                        "$eq" | "$ne" if operand.is_null() => {
                            self.conditions.push(Condition::IsNull {
                                column: column.name,
                                negated: op == "$ne",
                            });
                        }
                        other => {
                            let compare = CompareOp::from_operator(other).ok_or_else(|| {
                                Error::InvalidQuery(format!("unsupported operator '{other}'"))
                            })?;
                            self.push_compare(column, compare, operand)?;
                        }
                    }
                }
                Ok(())
            }
            scalar => self.push_compare(column, CompareOp::Eq, scalar),
        }
    }

    fn push_compare(
        &mut self,
        column: &'static Column,
        op: CompareOp,
        value: &JsonValue,
    ) -> Result<()> {
        let value = coerce(column, value)?;
        if matches!(value, FilterValue::Bool(_) | FilterValue::Uuid(_))
            && !matches!(op, CompareOp::Eq | CompareOp::Ne)
        {
            return Err(Error::InvalidQuery(format!(
                "field '{}' only supports equality",
                column.name
            )));
        }
        self.conditions.push(Condition::Compare {
            column: column.name,
            op,
            value,
        });
        Ok(())
    }

    fn push_in(&mut self, column: &'static Column, items: &[JsonValue], negated: bool) -> Result<()> {
        let values = items
            .iter()
            .map(|item| coerce(column, item))
            .collect::<Result<Vec<_>>>()?;
        self.conditions.push(Condition::In {
            column: column.name,
            values: FilterArray::from_values(column.ty, values)?,
            negated,
        });
        Ok(())
    }
}

impl FilterArray {
    fn from_values(ty: ColumnType, values: Vec<FilterValue>) -> Result<Self> {
        macro_rules! collect {
            ($variant:ident) => {
                FilterArray::$variant(
                    values
                        .into_iter()
                        .filter_map(|v| match v {
                            FilterValue::$variant(inner) => Some(inner),
                            _ => None,
                        })
                        .collect(),
                )
            };
        }

        Ok(match ty {
            ColumnType::Uuid => collect!(Uuid),
            ColumnType::Text => collect!(Text),
            ColumnType::Timestamp => collect!(Timestamp),
            ColumnType::Date => collect!(Date),
            ColumnType::Bool => collect!(Bool),
            ColumnType::Integer => collect!(Integer),
            ColumnType::Json => {
                return Err(Error::InvalidQuery("JSON fields cannot be filtered".to_string()))
            }
        })
    }
}

fn filterable(def: &EntityDef, key: &str) -> Result<&'static Column> {
    let column = def.visible_field(key)?;
    if column.ty == ColumnType::Json {
        return Err(Error::InvalidQuery(format!(
            "field '{key}' cannot be used in a filter"
        )));
    }
    Ok(column)
}

fn split_operator(key: &str) -> Result<(&str, Option<&str>)> {
    match key.find('[') {
        None => Ok((key, None)),
        Some(open) => {
            let op = key[open + 1..]
                .strip_suffix(']')
                .filter(|op| op.starts_with('$'))
                .ok_or_else(|| Error::InvalidQuery(format!("malformed filter key '{key}'")))?;
            Ok((&key[..open], Some(op)))
        }
    }
}

/// Coerce a JSON value into the column's storage type.
pub fn coerce(column: &Column, value: &JsonValue) -> Result<FilterValue> {
    let invalid = || {
        Error::InvalidQuery(format!(
            "invalid value {} for field '{}'",
            value, column.name
        ))
    };

    match column.ty {
        ColumnType::Uuid => value
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(FilterValue::Uuid)
            .ok_or_else(invalid),
        ColumnType::Text => match value {
            JsonValue::String(s) => Ok(FilterValue::Text(s.clone())),
            JsonValue::Number(n) => Ok(FilterValue::Text(n.to_string())),
            JsonValue::Bool(b) => Ok(FilterValue::Text(b.to_string())),
            _ => Err(invalid()),
        },
        ColumnType::Timestamp => value
            .as_str()
            .and_then(parse_timestamp)
            .map(FilterValue::Timestamp)
            .ok_or_else(invalid),
        ColumnType::Date => value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .map(FilterValue::Date)
            .ok_or_else(invalid),
        ColumnType::Bool => match value {
            JsonValue::Bool(b) => Ok(FilterValue::Bool(*b)),
            JsonValue::String(s) if s == "true" => Ok(FilterValue::Bool(true)),
            JsonValue::String(s) if s == "false" => Ok(FilterValue::Bool(false)),
            _ => Err(invalid()),
        },
        ColumnType::Integer => match value {
            JsonValue::Number(n) => n.as_i64().map(FilterValue::Integer).ok_or_else(invalid),
            JsonValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map(FilterValue::Integer)
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        ColumnType::Json => Err(invalid()),
    }
}

/// RFC 3339 instants, or bare `YYYY-MM-DD` dates meaning midnight UTC.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn bind_value(qb: &mut QueryBuilder<'static, Postgres>, value: &FilterValue) {
    match value {
        FilterValue::Uuid(v) => {
            qb.push_bind(*v);
        }
        FilterValue::Text(v) => {
            qb.push_bind(v.clone());
        }
        FilterValue::Timestamp(v) => {
            qb.push_bind(*v);
        }
        FilterValue::Date(v) => {
            qb.push_bind(*v);
        }
        FilterValue::Bool(v) => {
            qb.push_bind(*v);
        }
        FilterValue::Integer(v) => {
            qb.push_bind(*v);
        }
    }
}

fn bind_array(qb: &mut QueryBuilder<'static, Postgres>, values: &FilterArray) {
    match values {
        FilterArray::Uuid(v) => {
            qb.push_bind(v.clone());
        }
        FilterArray::Text(v) => {
            qb.push_bind(v.clone());
        }
        FilterArray::Timestamp(v) => {
            qb.push_bind(v.clone());
        }
        FilterArray::Date(v) => {
            qb.push_bind(v.clone());
        }
        FilterArray::Bool(v) => {
            qb.push_bind(v.clone());
        }
        FilterArray::Integer(v) => {
            qb.push_bind(v.clone());
        }
    }
}
