use std::sync::Arc;

use anyhow::Result;
use scholar_gateway::QueryGateway;
use scholar_schema::SchemaHook;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{mount_plain, PortalApp};
use crate::adapter::EntitySpec;

pub const SERVICE: &str = "routes";

/// Transport routes.
pub const SPEC: EntitySpec = EntitySpec {
    relation: "routes",
    label: "Route",
    filter_columns: &["vehicle_number"],
    order_by: "route_name",
};

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateRoute {
    #[validate(length(min = 1, max = 100, message = "route_name must be 1-100 characters"))]
    pub route_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 30))]
    pub vehicle_number: Option<String>,

    #[serde(default)]
    #[validate(range(min = 0.0, message = "fare must not be negative"))]
    pub fare: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stops: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PatchRoute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100, message = "route_name must be 1-100 characters"))]
    pub route_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 30))]
    pub vehicle_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, message = "fare must not be negative"))]
    pub fare: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stops: Option<Vec<String>>,
}

pub fn register(app: &PortalApp, gateway: &Arc<dyn QueryGateway>) -> Result<()> {
    let schema = SchemaHook::<CreateRoute, PatchRoute>::new("Routes schema validation failed");
    mount_plain(app, gateway, SERVICE, SPEC, Arc::new(schema))
}
