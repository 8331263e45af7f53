use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use scholar_core::{Identity, TenantId, UserRole};
use scholar_gateway::{Filter, GatewayResult, MemoryGateway, QueryGateway, Select};
use scholar_tenancy::{
    AssignmentResolver, CurrentSchoolStore, DurableStorage, MemoryStorage, MultipleAssignmentPolicy,
    PortalScope, ScopeError, TenantResolution, TenantState, CURRENT_SCHOOL_KEY, SCHOOLS, TENANTS,
    TENANT_USERS,
};

/// Test factory functions
fn tenant_row(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Tenant {id}"),
        "code": id.to_uppercase(),
        "domain": null,
        "status": status,
        "plan": "basic",
        "settings": {"features": {"hostel": false}}
    })
}

fn assignment_row(id: &str, user: &str, tenant: &str, updated_at: &str) -> Value {
    json!({
        "id": id,
        "user_id": user,
        "tenant_id": tenant,
        "role": "school_admin",
        "permissions": ["classes.write"],
        "is_active": true,
        "attributes": {"department": "admin"},
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": updated_at
    })
}

fn seeded_gateway() -> MemoryGateway {
    MemoryGateway::new()
        .with_rows(
            TENANTS,
            vec![
                tenant_row("t-alpha", "active"),
                tenant_row("t-beta", "active"),
                tenant_row("t-closed", "inactive"),
            ],
        )
        .with_rows(
            TENANT_USERS,
            vec![
                assignment_row("a1", "u-alpha", "t-alpha", "2024-01-01T00:00:00Z"),
                assignment_row("a2", "u-beta", "t-beta", "2024-01-01T00:00:00Z"),
                assignment_row("a3", "u-closed", "t-closed", "2024-01-01T00:00:00Z"),
                assignment_row("a4", "u-multi", "t-alpha", "2024-02-01T00:00:00Z"),
                assignment_row("a5", "u-multi", "t-beta", "2024-05-01T00:00:00Z"),
                json!({
                    "id": "a6", "user_id": "u-gone", "tenant_id": "t-alpha", "role": "teacher",
                    "permissions": [], "is_active": false, "attributes": {}
                }),
            ],
        )
}

fn context_over(gateway: Arc<dyn QueryGateway>) -> TenantResolution {
    TenantResolution::new(AssignmentResolver::new(gateway))
}

fn settled_tenant(state: &TenantState) -> Option<&str> {
    state.tenant.as_ref().map(|t| t.id.as_str())
}

/// Parks assignment lookups for one user until released.
struct GatedGateway {
    inner: MemoryGateway,
    gated_user: String,
    entered: Notify,
    release: Notify,
}

impl GatedGateway {
    fn new(inner: MemoryGateway, gated_user: &str) -> Self {
        Self {
            inner,
            gated_user: gated_user.to_string(),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl QueryGateway for GatedGateway {
    async fn select(&self, query: &Select) -> GatewayResult<Vec<Value>> {
        let gated = query.relation == TENANT_USERS
            && query
                .filters
                .contains(&Filter::Eq("user_id".to_string(), json!(self.gated_user)));
        if gated {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.select(query).await
    }

    async fn insert(&self, relation: &str, rows: Value) -> GatewayResult<Vec<Value>> {
        self.inner.insert(relation, rows).await
    }

    async fn update(&self, relation: &str, filters: &[Filter], patch: Value) -> GatewayResult<Vec<Value>> {
        self.inner.update(relation, filters, patch).await
    }

    async fn delete(&self, relation: &str, filters: &[Filter]) -> GatewayResult<Vec<Value>> {
        self.inner.delete(relation, filters).await
    }

    async fn upsert(&self, relation: &str, rows: Value, on_conflict: &[&str]) -> GatewayResult<Vec<Value>> {
        self.inner.upsert(relation, rows, on_conflict).await
    }

    async fn rpc(&self, function: &str, args: Value) -> GatewayResult<Value> {
        self.inner.rpc(function, args).await
    }
}

/// T1. Signed out resolves to nothing without backend traffic
#[tokio::test]
async fn test_signed_out_resolves_to_null_without_calls() {
    let gw = Arc::new(seeded_gateway());
    let ctx = context_over(gw.clone());

    ctx.set_identity(None);
    let state = ctx.settled().await;

    assert_eq!(
        state,
        TenantState {
            tenant: None,
            is_loading: false,
            error: None
        }
    );
    assert_eq!(gw.call_count(), 0);
}

/// T2. Super-admins use the selected tenant and skip assignment lookup
#[tokio::test]
async fn test_super_admin_uses_selection() {
    let gw = Arc::new(seeded_gateway());
    let ctx = context_over(gw.clone());

    ctx.select_tenant(Some(TenantId::from("t-beta")));
    ctx.set_identity(Some(Identity::new("root", UserRole::SuperAdmin)));
    let state = ctx.settled().await;

    assert_eq!(settled_tenant(&state), Some("t-beta"));
    assert_eq!(state.error, None);
    assert_eq!(gw.calls(), vec!["select tenants".to_string()]);

    // Changing the selection re-resolves.
    ctx.select_tenant(Some(TenantId::from("t-alpha")));
    let state = ctx.settled().await;
    assert_eq!(settled_tenant(&state), Some("t-alpha"));
    assert!(!gw.calls().iter().any(|c| c == "select tenant_users"));
}

/// T3. A single active assignment resolves to its tenant
#[tokio::test]
async fn test_single_assignment_resolves() {
    let ctx = context_over(Arc::new(seeded_gateway()));

    ctx.set_identity(Some(Identity::new("u-alpha", UserRole::SchoolAdmin)));
    let state = ctx.settled().await;

    assert_eq!(settled_tenant(&state), Some("t-alpha"));
    assert!(!state.is_loading);
    assert_eq!(state.error, None);
    let tenant = state.tenant.unwrap();
    assert!(!tenant.settings.feature_enabled("hostel"));
}

/// T4. No active assignment is reported, not thrown
#[tokio::test]
async fn test_unassigned_user_gets_message() {
    let ctx = context_over(Arc::new(seeded_gateway()));

    ctx.set_identity(Some(Identity::new("u-gone", UserRole::Teacher)));
    let state = ctx.settled().await;

    assert_eq!(state.tenant, None);
    assert!(!state.is_loading);
    assert_eq!(state.error.as_deref(), Some("No tenant assigned to user"));
}

/// T5. A later identity wins over an earlier one still in flight
#[tokio::test]
async fn test_latest_identity_wins_race() {
    let gw = Arc::new(GatedGateway::new(seeded_gateway(), "u-alpha"));
    let ctx = context_over(gw.clone());

    ctx.set_identity(Some(Identity::new("u-alpha", UserRole::SchoolAdmin)));
    gw.entered.notified().await;
    assert!(ctx.state().is_loading);

    ctx.set_identity(Some(Identity::new("u-beta", UserRole::SchoolAdmin)));
    let state = ctx.settled().await;
    assert_eq!(settled_tenant(&state), Some("t-beta"));

    gw.release.notify_waiters();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(settled_tenant(&ctx.state()), Some("t-beta"));
}

/// T6. School selection is write-through
#[tokio::test]
async fn test_school_selection_write_through() {
    let storage = Arc::new(MemoryStorage::new());
    let store = CurrentSchoolStore::new(storage.clone(), Arc::new(MemoryGateway::new()));

    assert_eq!(store.initialize().await, None);

    store.set_current_school_id(Some("s-42".to_string())).unwrap();
    assert_eq!(storage.get(CURRENT_SCHOOL_KEY).unwrap().as_deref(), Some("s-42"));
    assert_eq!(store.current_school_id().as_deref(), Some("s-42"));

    store.set_current_school_id(None).unwrap();
    assert_eq!(storage.get(CURRENT_SCHOOL_KEY).unwrap(), None);
    assert_eq!(store.current_school_id(), None);

    // A fresh store over the same storage and no default school stays empty.
    let gw = MemoryGateway::new().with_rows(SCHOOLS, vec![json!({"id": "s1", "name": "North", "is_default": false})]);
    let fresh = CurrentSchoolStore::new(storage, Arc::new(gw));
    assert_eq!(fresh.initialize().await, None);
}

/// T7. Providers fail fast outside a live scope
#[tokio::test]
async fn test_providers_outside_scope() {
    let scope = PortalScope::builder(Arc::new(seeded_gateway())).build();
    let tenant = scope.tenant().unwrap();
    tenant.set_identity(Some(Identity::new("u-alpha", UserRole::SchoolAdmin)));
    tenant.settled().await;
    assert!(scope.tenant_context().is_ok());

    scope.shutdown();

    assert_eq!(scope.tenant().err(), Some(ScopeError::TenantOutsideScope));
    assert_eq!(scope.current_school().err(), Some(ScopeError::SchoolOutsideScope));
    let err = scope.tenant_context().unwrap_err();
    assert_eq!(err.message, "tenant context accessed outside of its scope");
}

/// T8. Multiple assignments follow the configured policy
#[tokio::test]
async fn test_multiple_assignment_policy() {
    let rejecting = context_over(Arc::new(seeded_gateway()));
    rejecting.set_identity(Some(Identity::new("u-multi", UserRole::SchoolAdmin)));
    let state = rejecting.settled().await;
    assert_eq!(state.tenant, None);
    assert_eq!(state.error.as_deref(), Some("Multiple active tenant assignments for user"));

    let recent = TenantResolution::new(
        AssignmentResolver::new(Arc::new(seeded_gateway())).with_policy(MultipleAssignmentPolicy::MostRecent),
    );
    recent.set_identity(Some(Identity::new("u-multi", UserRole::SchoolAdmin)));
    let state = recent.settled().await;
    assert_eq!(settled_tenant(&state), Some("t-beta"));
}

/// T9. Inactive tenants are not resolvable
#[tokio::test]
async fn test_inactive_tenant_is_rejected() {
    let ctx = context_over(Arc::new(seeded_gateway()));

    ctx.set_identity(Some(Identity::new("u-closed", UserRole::SchoolAdmin)));
    let state = ctx.settled().await;

    assert_eq!(state.tenant, None);
    assert_eq!(state.error.as_deref(), Some("Tenant not found or inactive"));
}

/// T10. Transport failures are retryable through refresh
#[tokio::test]
async fn test_transport_failure_then_refresh() {
    let gw = Arc::new(seeded_gateway());
    gw.fail_relation(TENANT_USERS, "connection refused");
    let ctx = context_over(gw.clone());

    ctx.set_identity(Some(Identity::new("u-alpha", UserRole::SchoolAdmin)));
    let state = ctx.settled().await;
    assert_eq!(
        state.error.as_deref(),
        Some("Failed to load tenant: transport error: connection refused")
    );

    gw.heal_relation(TENANT_USERS);
    ctx.refresh();
    let state = ctx.settled().await;
    assert_eq!(settled_tenant(&state), Some("t-alpha"));
    assert_eq!(state.error, None);
}

/// T11. Shutdown releases callers waiting on a resolution that never answers
#[tokio::test]
async fn test_shutdown_releases_pending_waiters() {
    let gw = Arc::new(GatedGateway::new(seeded_gateway(), "u-alpha"));
    let scope = PortalScope::builder(gw.clone()).build();
    let tenant = scope.tenant().unwrap();

    tenant.set_identity(Some(Identity::new("u-alpha", UserRole::SchoolAdmin)));
    gw.entered.notified().await;

    let waiter = tokio::spawn({
        let tenant = tenant.clone();
        async move { tenant.settled().await }
    });
    tokio::task::yield_now().await;

    scope.shutdown();

    let state = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("waiter released by shutdown")
        .unwrap();
    assert!(!state.is_loading);
    assert_eq!(state.error.as_deref(), Some("Tenant context shut down"));
    assert_eq!(tenant.state(), state);
}
