use async_trait::async_trait;
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};
use crate::query::{Filter, Select};

/// Row-filtered CRUD and RPC access to the hosted backend.
///
/// Writes return the affected rows (`return=representation`). `update`
/// and `delete` refuse to run without filters.
#[async_trait]
pub trait QueryGateway: Send + Sync {
    async fn select(&self, query: &Select) -> GatewayResult<Vec<Value>>;

    /// Insert one row (an object) or many (an array).
    async fn insert(&self, relation: &str, rows: Value) -> GatewayResult<Vec<Value>>;

    async fn update(&self, relation: &str, filters: &[Filter], patch: Value) -> GatewayResult<Vec<Value>>;

    async fn delete(&self, relation: &str, filters: &[Filter]) -> GatewayResult<Vec<Value>>;

    /// Insert or merge on the `on_conflict` columns.
    async fn upsert(&self, relation: &str, rows: Value, on_conflict: &[&str]) -> GatewayResult<Vec<Value>>;

    async fn rpc(&self, function: &str, args: Value) -> GatewayResult<Value>;

    /// Bearer token of the signed-in user; `None` falls back to the
    /// public key. Gateways without auth ignore it.
    fn set_access_token(&self, _token: Option<String>) {}
}

/// Conveniences layered on any [`QueryGateway`].
#[async_trait]
pub trait QueryGatewayExt: QueryGateway {
    /// Exactly one row, like PostgREST's `.single()`.
    async fn select_single(&self, query: &Select) -> GatewayResult<Value> {
        match self.select_maybe_single(query).await? {
            Some(row) => Ok(row),
            None => Err(GatewayError::NoRows {
                relation: query.relation.clone(),
            }),
        }
    }

    /// Zero or one row; more than one is an error.
    async fn select_maybe_single(&self, query: &Select) -> GatewayResult<Option<Value>> {
        let mut query = query.clone();
        if query.limit.is_none() {
            query.limit = Some(2);
        }
        let mut rows = self.select(&query).await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            count => Err(GatewayError::MultipleRows {
                relation: query.relation.clone(),
                count,
            }),
        }
    }

    /// RPC returning a boolean (the authorization checks).
    async fn rpc_bool(&self, function: &str, args: Value) -> GatewayResult<bool> {
        match self.rpc(function, args).await? {
            Value::Bool(b) => Ok(b),
            other => Err(GatewayError::Decode(format!(
                "rpc {function} returned {other}, expected a boolean"
            ))),
        }
    }
}

impl<T: QueryGateway + ?Sized> QueryGatewayExt for T {}

pub(crate) fn rows_of(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        row => vec![row],
    }
}
