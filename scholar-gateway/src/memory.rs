use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{rows_of, QueryGateway};
use crate::query::{Filter, Select};

pub type RpcHandler = Arc<dyn Fn(&Value) -> GatewayResult<Value> + Send + Sync>;

/// In-memory [`QueryGateway`].
///
/// Rows are JSON objects; inserts without an `id` get a UUID. Every call
/// is appended to a log (`"select tenants"`, `"rpc is_super_admin"`) so
/// tests can assert which backend traffic happened.
#[derive(Default)]
pub struct MemoryGateway {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    rpcs: RwLock<HashMap<String, RpcHandler>>,
    failing: RwLock<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
    access_token: RwLock<Option<String>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a relation with rows.
    pub fn with_rows(self, relation: &str, rows: Vec<Value>) -> Self {
        self.tables.write().entry(relation.to_string()).or_default().extend(rows);
        self
    }

    pub fn with_rpc<F>(self, function: &str, handler: F) -> Self
    where
        F: Fn(&Value) -> GatewayResult<Value> + Send + Sync + 'static,
    {
        self.rpcs.write().insert(function.to_string(), Arc::new(handler));
        self
    }

    /// Make every call touching `relation` fail with a transport error.
    pub fn fail_relation(&self, relation: &str, message: &str) {
        self.failing.write().insert(relation.to_string(), message.to_string());
    }

    pub fn heal_relation(&self, relation: &str) {
        self.failing.write().remove(relation);
    }

    pub fn rows(&self, relation: &str) -> Vec<Value> {
        self.tables.read().get(relation).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Token last handed over through [`QueryGateway::set_access_token`].
    pub fn access_token(&self) -> Option<String> {
        self.access_token.read().clone()
    }

    fn record(&self, op: &str, target: &str) -> GatewayResult<()> {
        self.calls.lock().push(format!("{op} {target}"));
        match self.failing.read().get(target) {
            Some(message) => Err(GatewayError::Transport(message.clone())),
            None => Ok(()),
        }
    }
}

fn compare_cells(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}

fn as_object(row: Value) -> GatewayResult<Map<String, Value>> {
    match row {
        Value::Object(map) => Ok(map),
        other => Err(GatewayError::Invalid(format!("row must be an object, got {other}"))),
    }
}

fn with_id(mut row: Map<String, Value>) -> Map<String, Value> {
    if !row.get("id").is_some_and(|v| !v.is_null()) {
        row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    row
}

fn merge(target: &mut Value, patch: &Map<String, Value>) {
    if let Value::Object(existing) = target {
        for (k, v) in patch {
            existing.insert(k.clone(), v.clone());
        }
    }
}

fn project(row: &Value, columns: Option<&str>) -> Value {
    let Some(columns) = columns.filter(|c| c.trim() != "*") else {
        return row.clone();
    };
    let mut out = Map::new();
    for col in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if let Some(v) = row.get(col) {
            out.insert(col.to_string(), v.clone());
        }
    }
    Value::Object(out)
}

#[async_trait]
impl QueryGateway for MemoryGateway {
    async fn select(&self, query: &Select) -> GatewayResult<Vec<Value>> {
        self.record("select", &query.relation)?;
        let tables = self.tables.read();
        let mut rows: Vec<Value> = tables
            .get(&query.relation)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| f.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        for order in query.order.iter().rev() {
            rows.sort_by(|a, b| {
                let ord = compare_cells(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                );
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows
            .iter()
            .map(|row| project(row, query.columns.as_deref()))
            .collect())
    }

    async fn insert(&self, relation: &str, rows: Value) -> GatewayResult<Vec<Value>> {
        self.record("insert", relation)?;
        let mut inserted = Vec::new();
        for row in rows_of(rows) {
            inserted.push(Value::Object(with_id(as_object(row)?)));
        }
        self.tables
            .write()
            .entry(relation.to_string())
            .or_default()
            .extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn update(&self, relation: &str, filters: &[Filter], patch: Value) -> GatewayResult<Vec<Value>> {
        self.record("update", relation)?;
        if filters.is_empty() {
            return Err(GatewayError::Invalid(format!("refusing to update {relation} without filters")));
        }
        let patch = as_object(patch)?;
        let mut tables = self.tables.write();
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(relation) {
            for row in rows.iter_mut().filter(|row| filters.iter().all(|f| f.matches(row))) {
                merge(row, &patch);
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, relation: &str, filters: &[Filter]) -> GatewayResult<Vec<Value>> {
        self.record("delete", relation)?;
        if filters.is_empty() {
            return Err(GatewayError::Invalid(format!("refusing to delete {relation} without filters")));
        }
        let mut tables = self.tables.write();
        let mut removed = Vec::new();
        if let Some(rows) = tables.get_mut(relation) {
            let (gone, kept): (Vec<Value>, Vec<Value>) = rows
                .drain(..)
                .partition(|row| filters.iter().all(|f| f.matches(row)));
            *rows = kept;
            removed = gone;
        }
        Ok(removed)
    }

    async fn upsert(&self, relation: &str, rows: Value, on_conflict: &[&str]) -> GatewayResult<Vec<Value>> {
        self.record("upsert", relation)?;
        let keys: Vec<&str> = if on_conflict.is_empty() { vec!["id"] } else { on_conflict.to_vec() };

        let mut tables = self.tables.write();
        let table = tables.entry(relation.to_string()).or_default();
        let mut out = Vec::new();

        for row in rows_of(rows) {
            let row = as_object(row)?;
            let filters: Vec<Filter> = keys
                .iter()
                .map(|k| Filter::Eq((*k).to_string(), row.get(*k).cloned().unwrap_or(Value::Null)))
                .collect();

            match table.iter_mut().find(|existing| filters.iter().all(|f| f.matches(existing))) {
                Some(existing) => {
                    merge(existing, &row);
                    out.push(existing.clone());
                }
                None => {
                    let row = Value::Object(with_id(row));
                    table.push(row.clone());
                    out.push(row);
                }
            }
        }
        Ok(out)
    }

    async fn rpc(&self, function: &str, args: Value) -> GatewayResult<Value> {
        self.record("rpc", function)?;
        let handler = self
            .rpcs
            .read()
            .get(function)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownRpc(function.to_string()))?;
        handler(&args)
    }

    fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }
}
