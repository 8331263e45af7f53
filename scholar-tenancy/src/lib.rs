//! scholar-tenancy: who may see what.
//!
//! - [`AssignmentResolver`] maps an identity to its tenant.
//! - [`TenantResolution`] keeps the reactive `{tenant, isLoading, error}`
//!   state for the signed-in identity, guarded by generations.
//! - [`CurrentSchoolStore`] persists the advisory school selection.
//! - [`PortalScope`] owns both providers for the lifetime of the portal.

mod context;
mod models;
mod resolver;
mod school;
mod scope;
mod storage;

pub use context::{TenantPhase, TenantResolution, TenantState};
pub use models::{
    Assignment, Branding, FeatureFlags, Limits, School, Tenant, TenantPlan, TenantSettings,
    TenantStatus,
};
pub use resolver::{AssignmentResolver, MultipleAssignmentPolicy, ResolveError, TENANTS, TENANT_USERS};
pub use school::{CurrentSchoolStore, CURRENT_SCHOOL_KEY, SCHOOLS};
pub use scope::{PortalScope, PortalScopeBuilder, ScopeError};
pub use storage::{DurableStorage, FileStorage, MemoryStorage, StorageError};
