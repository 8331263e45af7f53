//! scholar-services: the portal's school-scoped entity services.
//!
//! Each entity is a [`ScholarService`](scholar_core::ScholarService) over
//! one backend relation. Writes pass through the same hook chain:
//! schema validation, `school_id` defaulting from the current-school
//! selection, then the authorization RPCs.

use std::sync::Arc;

use anyhow::Result;
use scholar_gateway::QueryGateway;

pub mod adapter;
pub mod dashboard;
pub mod entities;
pub mod hooks;

pub use adapter::{EntityService, EntitySpec, GatewayCrud};
pub use dashboard::{Dashboard, DashboardSummary};
pub use entities::PortalApp;
pub use hooks::{IS_SCHOOL_ADMIN_FOR_SCHOOL, IS_SUPER_ADMIN};

/// Service names in mount order.
pub const SERVICE_NAMES: [&str; 6] = [
    entities::classes::SERVICE,
    entities::mediums::SERVICE,
    entities::student_types::SERVICE,
    entities::routes::SERVICE,
    entities::lessons::SERVICE,
    entities::hostel_rooms::SERVICE,
];

/// Register every entity service and its hooks on `app`.
pub fn configure(app: &PortalApp, gateway: Arc<dyn QueryGateway>) -> Result<()> {
    hooks::global_hooks(app);

    entities::classes::register(app, &gateway)?;
    entities::mediums::register(app, &gateway)?;
    entities::student_types::register(app, &gateway)?;
    entities::routes::register(app, &gateway)?;
    entities::lessons::register(app, &gateway)?;
    entities::hostel_rooms::register(app, &gateway)?;

    tracing::info!(services = ?SERVICE_NAMES, "entity services registered");
    Ok(())
}
