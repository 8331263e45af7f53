//! scholar-core: transport-agnostic core for the Scholar portal.
//!
//! Tenant-aware CRUD services, a before/after/error hook pipeline,
//! structured errors and a key/value configuration store.

pub mod app;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod params;
pub mod registry;
pub mod service;
pub mod tenant;

pub use app::{ScholarApp, ServiceHandle};
pub use config::{ScholarConfig, ScholarConfigSnapshot};
pub use errors::{ErrorKind, ScholarError};
pub use hooks::{AfterHook, BeforeHook, ErrorHook, HookContext, HookResult, ServiceHooks};
pub use params::ServiceParams;
pub use registry::ServiceRegistry;
pub use service::{ScholarService, ServiceCapabilities, ServiceMethodKind};
pub use tenant::{Identity, TenantContext, TenantId, UserRole};
