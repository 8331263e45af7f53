use std::sync::Arc;

use scholar_core::{ScholarApp, TenantContext};
use scholar_tenancy::PortalScope;

use crate::ScholarAxumError;

pub struct ScholarAxumState<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub app: Arc<ScholarApp<R, P>>,
    pub scope: Arc<PortalScope>,
}

impl<R, P> Clone for ScholarAxumState<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: Arc::clone(&self.app),
            scope: Arc::clone(&self.scope),
        }
    }
}

impl<R, P> ScholarAxumState<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub fn new(app: ScholarApp<R, P>, scope: Arc<PortalScope>) -> Self {
        Self {
            app: Arc::new(app),
            scope,
        }
    }
}

/// Tenant context for a request.
///
/// Waits for an in-flight resolution to settle so a request made right
/// after sign-in sees its outcome rather than a loading state.
pub async fn scoped_context(scope: &PortalScope) -> Result<TenantContext, ScholarAxumError> {
    let tenant = scope.tenant()?;
    if tenant.identity().is_some() {
        tenant.settled().await;
    }
    Ok(scope.tenant_context()?)
}
