use std::sync::Arc;

use anyhow::Result;
use scholar_gateway::QueryGateway;
use scholar_schema::SchemaHook;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{mount_plain, PortalApp};
use crate::adapter::EntitySpec;

pub const SERVICE: &str = "mediums";

/// Language of instruction.
pub const SPEC: EntitySpec = EntitySpec {
    relation: "mediums",
    label: "Medium",
    filter_columns: &[],
    order_by: "name",
};

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateMedium {
    #[validate(length(min = 1, max = 60, message = "name must be 1-60 characters"))]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PatchMedium {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 60, message = "name must be 1-60 characters"))]
    pub name: Option<String>,
}

pub fn register(app: &PortalApp, gateway: &Arc<dyn QueryGateway>) -> Result<()> {
    let schema = SchemaHook::<CreateMedium, PatchMedium>::new("Mediums schema validation failed");
    mount_plain(app, gateway, SERVICE, SPEC, Arc::new(schema))
}
