use std::sync::Arc;

use anyhow::Result;
use scholar_gateway::QueryGateway;
use scholar_schema::SchemaHook;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{mount_plain, PortalApp};
use crate::adapter::EntitySpec;

pub const SERVICE: &str = "hostel-rooms";

pub const SPEC: EntitySpec = EntitySpec {
    relation: "hostel_rooms",
    label: "Hostel room",
    filter_columns: &["hostel_name"],
    order_by: "room_number",
};

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateHostelRoom {
    #[validate(length(min = 1, max = 100, message = "hostel_name must be 1-100 characters"))]
    pub hostel_name: String,

    #[validate(length(min = 1, max = 20, message = "room_number must be 1-20 characters"))]
    pub room_number: String,

    #[validate(range(min = 1, max = 100, message = "capacity must be between 1 and 100"))]
    pub capacity: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PatchHostelRoom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100, message = "hostel_name must be 1-100 characters"))]
    pub hostel_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 20, message = "room_number must be 1-20 characters"))]
    pub room_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 100, message = "capacity must be between 1 and 100"))]
    pub capacity: Option<u32>,
}

pub fn register(app: &PortalApp, gateway: &Arc<dyn QueryGateway>) -> Result<()> {
    let schema = SchemaHook::<CreateHostelRoom, PatchHostelRoom>::new("Hostel rooms schema validation failed");
    mount_plain(app, gateway, SERVICE, SPEC, Arc::new(schema))
}
