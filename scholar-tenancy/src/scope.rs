use std::sync::Arc;

use parking_lot::RwLock;
use scholar_core::errors::ScholarError;
use scholar_core::TenantContext;
use scholar_gateway::QueryGateway;
use thiserror::Error;
use tracing::info;

use crate::context::{TenantPhase, TenantResolution};
use crate::resolver::{AssignmentResolver, MultipleAssignmentPolicy};
use crate::school::CurrentSchoolStore;
use crate::storage::{DurableStorage, MemoryStorage};

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("tenant context accessed outside of its scope")]
    TenantOutsideScope,

    #[error("current-school store accessed outside of its scope")]
    SchoolOutsideScope,
}

impl From<ScopeError> for ScholarError {
    fn from(err: ScopeError) -> Self {
        ScholarError::unavailable(err.to_string())
    }
}

#[derive(Default)]
struct Providers {
    tenant: Option<TenantResolution>,
    school: Option<Arc<CurrentSchoolStore>>,
}

/// Root container for the session providers.
///
/// Created once at startup and passed around explicitly. Asking for a
/// provider that was never installed, or after [`PortalScope::shutdown`],
/// fails immediately with a [`ScopeError`].
pub struct PortalScope {
    providers: RwLock<Providers>,
}

pub struct PortalScopeBuilder {
    gateway: Arc<dyn QueryGateway>,
    storage: Arc<dyn DurableStorage>,
    policy: MultipleAssignmentPolicy,
}

impl PortalScopeBuilder {
    pub fn storage(mut self, storage: Arc<dyn DurableStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn policy(mut self, policy: MultipleAssignmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Install both providers. The tenant context starts signed out.
    pub fn build(self) -> PortalScope {
        let resolver = AssignmentResolver::new(Arc::clone(&self.gateway)).with_policy(self.policy);
        let tenant = TenantResolution::new(resolver);
        tenant.set_identity(None);

        let school = Arc::new(CurrentSchoolStore::new(self.storage, self.gateway));

        info!(policy = %self.policy, "portal scope ready");
        PortalScope {
            providers: RwLock::new(Providers {
                tenant: Some(tenant),
                school: Some(school),
            }),
        }
    }
}

impl PortalScope {
    pub fn builder(gateway: Arc<dyn QueryGateway>) -> PortalScopeBuilder {
        PortalScopeBuilder {
            gateway,
            storage: Arc::new(MemoryStorage::new()),
            policy: MultipleAssignmentPolicy::default(),
        }
    }

    /// A scope with no providers installed.
    pub fn empty() -> Self {
        Self {
            providers: RwLock::new(Providers::default()),
        }
    }

    pub fn tenant(&self) -> Result<TenantResolution, ScopeError> {
        self.providers
            .read()
            .tenant
            .clone()
            .ok_or(ScopeError::TenantOutsideScope)
    }

    pub fn current_school(&self) -> Result<Arc<CurrentSchoolStore>, ScopeError> {
        self.providers
            .read()
            .school
            .clone()
            .ok_or(ScopeError::SchoolOutsideScope)
    }

    pub fn is_live(&self) -> bool {
        let providers = self.providers.read();
        providers.tenant.is_some() && providers.school.is_some()
    }

    /// Tear down the providers. Later access fails with [`ScopeError`].
    pub fn shutdown(&self) {
        let mut providers = self.providers.write();
        if let Some(tenant) = providers.tenant.take() {
            tenant.shutdown();
        }
        providers.school = None;
        info!("portal scope shut down");
    }

    /// Service context for the signed-in user.
    ///
    /// Fails with `NotAuthenticated` when nobody is signed in, `Unavailable`
    /// while the tenant is still loading and `Forbidden` when the user has
    /// no tenant.
    pub fn tenant_context(&self) -> Result<TenantContext, ScholarError> {
        let tenant = self.tenant()?;
        let school = self.current_school()?;

        let identity = tenant
            .identity()
            .ok_or_else(|| ScholarError::not_authenticated("Not signed in"))?;

        match tenant.phase() {
            TenantPhase::Resolved(Some(t)) => Ok(TenantContext::new(t.id.0)
                .with_school(school.current_school_id())
                .with_user(identity.id, identity.role)),
            TenantPhase::Resolved(None) => Err(ScholarError::forbidden("No tenant selected")),
            TenantPhase::Unassigned(message) => Err(ScholarError::forbidden(message)),
            TenantPhase::Failed(message) => Err(ScholarError::unavailable(message)),
            TenantPhase::Idle | TenantPhase::Loading => {
                Err(ScholarError::unavailable("Tenant is still loading"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_gateway::MemoryGateway;

    #[test]
    fn empty_scope_fails_fast() {
        let scope = PortalScope::empty();
        assert_eq!(scope.tenant().err(), Some(ScopeError::TenantOutsideScope));
        assert_eq!(scope.current_school().err(), Some(ScopeError::SchoolOutsideScope));
        assert!(!scope.is_live());
    }

    #[test]
    fn shutdown_revokes_access() {
        let scope = PortalScope::builder(Arc::new(MemoryGateway::new())).build();
        assert!(scope.is_live());
        scope.shutdown();

        let err = scope.tenant().err().unwrap();
        assert_eq!(err.to_string(), "tenant context accessed outside of its scope");
        assert!(scope.current_school().is_err());
    }

    #[test]
    fn signed_out_scope_yields_not_authenticated() {
        let scope = PortalScope::builder(Arc::new(MemoryGateway::new())).build();
        let err = scope.tenant_context().unwrap_err();
        assert_eq!(err.code(), 401);
    }
}
