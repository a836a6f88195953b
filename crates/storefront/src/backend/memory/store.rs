//! In-process record store.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::db::query::{Direction, Filter, Ordering};
use crate::db::{DataStore, Query, StoreError, collections};

/// A [`DataStore`] that keeps every collection in memory.
///
/// Enforces the `id` primary key and any unique columns registered with
/// [`with_unique`](Self::with_unique). Rows inserted without an `id` get a
/// random UUID.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Map<String, Value>>>>,
    unique: HashMap<String, Vec<String>>,
}

impl MemoryStore {
    /// An empty store with no constraints beyond primary keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store with the storefront's constraints (unique usernames).
    #[must_use]
    pub fn storefront() -> Self {
        Self::new().with_unique(collections::PROFILES, "username")
    }

    /// Require `column` to be unique within `collection`.
    #[must_use]
    pub fn with_unique(mut self, collection: &str, column: &str) -> Self {
        self.unique
            .entry(collection.to_owned())
            .or_default()
            .push(column.to_owned());
        self
    }

    /// Insert rows directly, bypassing constraints.
    ///
    /// Non-object values are ignored.
    pub fn seed(&self, collection: &str, rows: impl IntoIterator<Item = Value>) {
        let mut tables = self.tables();
        let table = tables.entry(collection.to_owned()).or_default();
        for row in rows {
            if let Value::Object(mut row) = row {
                ensure_id(&mut row);
                table.push(row);
            }
        }
    }

    /// Every row of `collection` in insertion order.
    #[must_use]
    pub fn rows(&self, collection: &str) -> Vec<Value> {
        self.tables()
            .get(collection)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<String, Vec<Map<String, Value>>>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check primary key and unique columns of `row` against `table`,
    /// ignoring the row at `replacing`.
    fn check_constraints(
        &self,
        collection: &str,
        table: &[Map<String, Value>],
        row: &Map<String, Value>,
        replacing: Option<usize>,
    ) -> Result<(), StoreError> {
        let unique = self.unique.get(collection).map_or(&[][..], Vec::as_slice);
        let columns = std::iter::once("id").chain(unique.iter().map(String::as_str));

        for column in columns {
            let Some(value) = row.get(column).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = table
                .iter()
                .enumerate()
                .any(|(i, existing)| Some(i) != replacing && existing.get(column) == Some(value));
            if clash {
                return Err(StoreError::Conflict(format!(
                    "duplicate key value violates unique constraint \"{collection}_{column}_key\""
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables();
        let Some(table) = tables.get(query.collection()) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<&Map<String, Value>> = table
            .iter()
            .filter(|row| query.filters().iter().all(|f| matches_filter(row, f)))
            .collect();

        if !query.ordering().is_empty() {
            rows.sort_by(|a, b| compare_rows(a, b, query.ordering()));
        }

        let limit = query.row_limit().unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|row| project(row, query.columns()))
            .collect())
    }

    async fn insert(&self, collection: &str, row: Value) -> Result<Value, StoreError> {
        let mut row = into_object(row)?;
        ensure_id(&mut row);

        let mut tables = self.tables();
        let table = tables.entry(collection.to_owned()).or_default();
        self.check_constraints(collection, table, &row, None)?;
        table.push(row.clone());
        Ok(Value::Object(row))
    }

    async fn upsert(&self, collection: &str, row: Value) -> Result<Value, StoreError> {
        let mut row = into_object(row)?;
        ensure_id(&mut row);

        let mut tables = self.tables();
        let table = tables.entry(collection.to_owned()).or_default();
        let existing = table.iter().position(|r| r.get("id") == row.get("id"));
        self.check_constraints(collection, table, &row, existing)?;

        match existing.and_then(|index| table.get_mut(index)) {
            Some(stored) => {
                stored.extend(row);
                Ok(Value::Object(stored.clone()))
            }
            None => {
                table.push(row.clone());
                Ok(Value::Object(row))
            }
        }
    }
}

fn into_object(row: Value) -> Result<Map<String, Value>, StoreError> {
    match row {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Api {
            code: "PGRST102".to_owned(),
            message: format!("expected a JSON object row, got {other}"),
        }),
    }
}

fn ensure_id(row: &mut Map<String, Value>) {
    if row.get("id").is_none_or(Value::is_null) {
        row.insert(
            "id".to_owned(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
    }
}

fn project(row: &Map<String, Value>, columns: Option<&[String]>) -> Value {
    match columns {
        None => Value::Object(row.clone()),
        Some(columns) => Value::Object(
            columns
                .iter()
                .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                .collect(),
        ),
    }
}

static NULL: Value = Value::Null;

fn matches_filter(row: &Map<String, Value>, filter: &Filter) -> bool {
    let cell = row.get(filter.column()).unwrap_or(&NULL);
    match filter {
        Filter::Eq(_, value) => compare_values(cell, value) == Some(CmpOrdering::Equal),
        Filter::Neq(_, value) => {
            !cell.is_null() && compare_values(cell, value) != Some(CmpOrdering::Equal)
        }
        Filter::Gte(_, value) => matches!(
            compare_values(cell, value),
            Some(CmpOrdering::Greater | CmpOrdering::Equal)
        ),
        Filter::Lte(_, value) => matches!(
            compare_values(cell, value),
            Some(CmpOrdering::Less | CmpOrdering::Equal)
        ),
        Filter::ILike(_, pattern) => cell
            .as_str()
            .is_some_and(|text| ilike(&text.to_lowercase(), &pattern.to_lowercase())),
    }
}

/// Numeric when both sides parse as decimals (numbers or numeric strings),
/// otherwise same-type comparison. `None` means incomparable.
fn compare_values(a: &Value, b: &Value) -> Option<CmpOrdering> {
    if let (Some(x), Some(y)) = (as_decimal(a), as_decimal(b)) {
        return Some(x.cmp(&y));
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

/// Nulls sort last in either direction.
fn compare_rows(
    a: &Map<String, Value>,
    b: &Map<String, Value>,
    ordering: &[Ordering],
) -> CmpOrdering {
    for Ordering { column, direction } in ordering {
        let x = a.get(column).filter(|v| !v.is_null());
        let y = b.get(column).filter(|v| !v.is_null());
        let ord = match (x, y) {
            (None, None) => CmpOrdering::Equal,
            (None, Some(_)) => return CmpOrdering::Greater,
            (Some(_), None) => return CmpOrdering::Less,
            (Some(x), Some(y)) => {
                let ord = compare_values(x, y).unwrap_or(CmpOrdering::Equal);
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            }
        };
        if ord != CmpOrdering::Equal {
            return ord;
        }
    }
    CmpOrdering::Equal
}

/// SQL `LIKE` matching: `%` is any run, `_` any single char, `\` escapes.
fn ilike(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    like_from(&text, &pattern)
}

fn like_from(text: &[char], pattern: &[char]) -> bool {
    match (pattern, text) {
        ([], _) => text.is_empty(),
        (['%', rest @ ..], _) => {
            (0..=text.len()).any(|skip| text.get(skip..).is_some_and(|t| like_from(t, rest)))
        }
        (['_', rest @ ..], [_, tail @ ..]) => like_from(tail, rest),
        (['\\', escaped, rest @ ..], [c, tail @ ..]) => c == escaped && like_from(tail, rest),
        ([p, rest @ ..], [c, tail @ ..]) => p == c && like_from(tail, rest),
        (_, []) => false,
    }
}
