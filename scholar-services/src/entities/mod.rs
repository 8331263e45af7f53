//! One module per school-scoped entity: its schemas, relation and
//! registration.

use std::sync::Arc;

use anyhow::Result;
use scholar_core::{BeforeHook, ScholarApp, ScholarService, ServiceParams};
use scholar_gateway::QueryGateway;
use serde_json::Value;

use crate::adapter::{EntityService, EntitySpec};
use crate::hooks::school_scoped_hooks;

pub mod classes;
pub mod hostel_rooms;
pub mod lessons;
pub mod mediums;
pub mod routes;
pub mod student_types;

pub type PortalApp = ScholarApp<Value, ServiceParams>;

/// Register `service` under `name` with its schema hook followed by the
/// shared school-scoped write hooks.
pub(crate) fn mount(
    app: &PortalApp,
    gateway: &Arc<dyn QueryGateway>,
    name: &str,
    relation: &'static str,
    service: Arc<dyn ScholarService<Value, ServiceParams>>,
    schema: Arc<dyn BeforeHook<Value, ServiceParams>>,
) -> Result<()> {
    app.register_service(name, service);
    app.service(name)?.hooks(|h| {
        h.before_all(schema);
    });
    school_scoped_hooks(app, name, relation, gateway)
}

/// [`mount`] for entities served by a plain [`EntityService`].
pub(crate) fn mount_plain(
    app: &PortalApp,
    gateway: &Arc<dyn QueryGateway>,
    name: &str,
    spec: EntitySpec,
    schema: Arc<dyn BeforeHook<Value, ServiceParams>>,
) -> Result<()> {
    let service = Arc::new(EntityService::new(spec, Arc::clone(gateway)));
    mount(app, gateway, name, spec.relation, service, schema)
}
