use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use scholar_core::errors::ScholarError;
use scholar_core::{ScholarService, ServiceCapabilities, ServiceParams, TenantContext};
use scholar_gateway::{Filter, GatewayError, QueryGateway, Select};
use serde_json::{Map, Value};

/// Static description of one backend relation exposed as a service.
#[derive(Debug, Clone, Copy)]
pub struct EntitySpec {
    pub relation: &'static str,
    /// Human label used in messages (`"Class"`).
    pub label: &'static str,
    /// Columns `find` accepts as `?column=value` equality filters.
    pub filter_columns: &'static [&'static str],
    pub order_by: &'static str,
}

/// CRUD over one relation through the query gateway.
///
/// `find` is narrowed to the school in scope; single-row operations
/// address rows by id and rely on the backend's row policy.
#[derive(Clone)]
pub struct GatewayCrud {
    pub spec: EntitySpec,
    pub gateway: Arc<dyn QueryGateway>,
}

fn gateway_err(err: GatewayError) -> anyhow::Error {
    err.into_anyhow()
}

pub(crate) fn by_id(id: &str) -> Vec<Filter> {
    vec![Filter::Eq("id".to_string(), Value::String(id.to_string()))]
}

/// Payload as an object without the columns callers may not set.
pub(crate) fn writable(data: Value) -> Result<Map<String, Value>> {
    let Value::Object(mut obj) = data else {
        return Err(ScholarError::bad_request("Payload must be a JSON object").into_anyhow());
    };
    obj.remove("id");
    obj.remove("created_at");
    Ok(obj)
}

impl GatewayCrud {
    pub fn new(spec: EntitySpec, gateway: Arc<dyn QueryGateway>) -> Self {
        Self { spec, gateway }
    }

    fn not_found(&self, id: &str) -> anyhow::Error {
        ScholarError::not_found(format!("{} not found: {id}", self.spec.label)).into_anyhow()
    }

    fn first_or_not_found(&self, rows: Vec<Value>, id: &str) -> Result<Value> {
        rows.into_iter().next().ok_or_else(|| self.not_found(id))
    }

    pub fn find_query(&self, ctx: &TenantContext, params: &ServiceParams) -> Select {
        let mut query = Select::from(self.spec.relation);
        if let Some(school_id) = &ctx.school_id {
            query = query.eq("school_id", school_id.as_str());
        }
        for column in self.spec.filter_columns {
            if let Some(value) = params.get(column) {
                query = query.eq(*column, value);
            }
        }
        query = query.order(self.spec.order_by, true);
        if let Some(limit) = params.limit() {
            query = query.limit(limit);
        }
        query
    }

    pub async fn find_rows(&self, ctx: &TenantContext, params: &ServiceParams) -> Result<Vec<Value>> {
        self.gateway
            .select(&self.find_query(ctx, params))
            .await
            .map_err(gateway_err)
    }

    pub async fn get_row(&self, id: &str) -> Result<Value> {
        let query = Select::from(self.spec.relation).eq("id", id).limit(1);
        let rows = self.gateway.select(&query).await.map_err(gateway_err)?;
        self.first_or_not_found(rows, id)
    }

    pub async fn insert_row(&self, data: Value) -> Result<Value> {
        let row = writable(data)?;
        let rows = self
            .gateway
            .insert(self.spec.relation, Value::Object(row))
            .await
            .map_err(gateway_err)?;
        rows.into_iter().next().ok_or_else(|| {
            ScholarError::bad_gateway(format!("{} insert returned no row", self.spec.label)).into_anyhow()
        })
    }

    pub async fn update_row(&self, id: &str, data: Value) -> Result<Value> {
        let row = writable(data)?;
        let rows = self
            .gateway
            .update(self.spec.relation, &by_id(id), Value::Object(row))
            .await
            .map_err(gateway_err)?;
        self.first_or_not_found(rows, id)
    }

    pub async fn delete_row(&self, id: &str) -> Result<Value> {
        let rows = self
            .gateway
            .delete(self.spec.relation, &by_id(id))
            .await
            .map_err(gateway_err)?;
        self.first_or_not_found(rows, id)
    }
}

/// A plain entity service: every method maps onto [`GatewayCrud`].
pub struct EntityService {
    pub crud: GatewayCrud,
}

impl EntityService {
    pub fn new(spec: EntitySpec, gateway: Arc<dyn QueryGateway>) -> Self {
        Self {
            crud: GatewayCrud::new(spec, gateway),
        }
    }
}

#[async_trait]
impl ScholarService<Value, ServiceParams> for EntityService {
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::standard_crud()
    }

    async fn find(&self, ctx: &TenantContext, params: ServiceParams) -> Result<Vec<Value>> {
        self.crud.find_rows(ctx, &params).await
    }

    async fn get(&self, _ctx: &TenantContext, id: &str, _params: ServiceParams) -> Result<Value> {
        self.crud.get_row(id).await
    }

    async fn create(&self, _ctx: &TenantContext, data: Value, _params: ServiceParams) -> Result<Value> {
        self.crud.insert_row(data).await
    }

    // PUT and PATCH differ only in which schema validated the payload.
    async fn update(&self, _ctx: &TenantContext, id: &str, data: Value, _params: ServiceParams) -> Result<Value> {
        self.crud.update_row(id, data).await
    }

    async fn patch(&self, _ctx: &TenantContext, id: &str, data: Value, _params: ServiceParams) -> Result<Value> {
        self.crud.update_row(id, data).await
    }

    async fn remove(&self, _ctx: &TenantContext, id: &str, _params: ServiceParams) -> Result<Value> {
        self.crud.delete_row(id).await
    }
}
