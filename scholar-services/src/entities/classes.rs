use std::sync::Arc;

use anyhow::Result;
use scholar_gateway::QueryGateway;
use scholar_schema::SchemaHook;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{mount_plain, PortalApp};
use crate::adapter::EntitySpec;

pub const SERVICE: &str = "classes";

pub const SPEC: EntitySpec = EntitySpec {
    relation: "classes",
    label: "Class",
    filter_columns: &["medium_id", "section"],
    order_by: "name",
};

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateClass {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 20))]
    pub section: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PatchClass {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 20))]
    pub section: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium_id: Option<String>,
}

pub fn register(app: &PortalApp, gateway: &Arc<dyn QueryGateway>) -> Result<()> {
    let schema = SchemaHook::<CreateClass, PatchClass>::new("Classes schema validation failed");
    mount_plain(app, gateway, SERVICE, SPEC, Arc::new(schema))
}
