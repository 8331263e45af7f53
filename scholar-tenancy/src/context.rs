use std::sync::Arc;

use parking_lot::Mutex;
use scholar_core::{Identity, TenantId};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::Tenant;
use crate::resolver::{AssignmentResolver, ResolveError};

/// Where a resolution stands.
#[derive(Debug, Clone, PartialEq)]
pub enum TenantPhase {
    /// No identity has been observed yet.
    Idle,
    Loading,
    /// Resolved; `None` for signed-out users and super-admins without a
    /// selection.
    Resolved(Option<Tenant>),
    /// The user has no usable tenant (unassigned, ambiguous, inactive).
    Unassigned(String),
    /// The backend could not be reached; a refresh may succeed.
    Failed(String),
}

impl TenantPhase {
    pub fn state(&self) -> TenantState {
        match self {
            TenantPhase::Idle | TenantPhase::Loading => TenantState {
                tenant: None,
                is_loading: true,
                error: None,
            },
            TenantPhase::Resolved(tenant) => TenantState {
                tenant: tenant.clone(),
                is_loading: false,
                error: None,
            },
            TenantPhase::Unassigned(message) | TenantPhase::Failed(message) => TenantState {
                tenant: None,
                is_loading: false,
                error: Some(message.clone()),
            },
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, TenantPhase::Idle | TenantPhase::Loading)
    }

    fn from_outcome(outcome: Result<Option<Tenant>, ResolveError>) -> Self {
        match outcome {
            Ok(tenant) => TenantPhase::Resolved(tenant),
            Err(err) if err.is_fetch_failure() => TenantPhase::Failed(err.to_string()),
            Err(err) => TenantPhase::Unassigned(err.to_string()),
        }
    }
}

/// The `{tenant, isLoading, error}` triple consumers read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantState {
    pub tenant: Option<Tenant>,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Default)]
struct Session {
    generation: u64,
    identity: Option<Identity>,
    selection: Option<TenantId>,
    observed: bool,
    closed: bool,
    task: Option<JoinHandle<()>>,
}

const SHUT_DOWN: &str = "Tenant context shut down";

struct Inner {
    resolver: AssignmentResolver,
    tx: watch::Sender<TenantPhase>,
    session: Mutex<Session>,
}

impl Inner {
    /// Publish the outcome of resolution `generation` unless a newer one
    /// has started since.
    fn commit(&self, generation: u64, phase: TenantPhase) -> bool {
        let session = self.session.lock();
        if session.generation != generation {
            debug!(generation, current = session.generation, "discarding superseded tenant resolution");
            return false;
        }
        self.tx.send_replace(phase);
        true
    }
}

/// Reactive tenant state for the signed-in identity.
///
/// Every change of identity (or an explicit refresh) starts a new
/// generation; only the latest generation may publish its result, and the
/// task of a superseded generation is aborted. Consumers read snapshots or
/// subscribe, they never write the state.
#[derive(Clone)]
pub struct TenantResolution {
    inner: Arc<Inner>,
}

impl TenantResolution {
    pub fn new(resolver: AssignmentResolver) -> Self {
        let (tx, _rx) = watch::channel(TenantPhase::Idle);
        Self {
            inner: Arc::new(Inner {
                resolver,
                tx,
                session: Mutex::new(Session::default()),
            }),
        }
    }

    pub fn resolver(&self) -> &AssignmentResolver {
        &self.inner.resolver
    }

    pub fn phase(&self) -> TenantPhase {
        self.inner.tx.borrow().clone()
    }

    pub fn state(&self) -> TenantState {
        self.inner.tx.borrow().state()
    }

    pub fn subscribe(&self) -> watch::Receiver<TenantPhase> {
        self.inner.tx.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.inner.session.lock().generation
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.session.lock().identity.clone()
    }

    pub fn selected_tenant(&self) -> Option<TenantId> {
        self.inner.session.lock().selection.clone()
    }

    /// Observe the upstream identity.
    ///
    /// Re-resolves when the id or role changed; the same identity again is
    /// a no-op. Returns whether a resolution started. A present identity
    /// spawns onto the current tokio runtime.
    pub fn set_identity(&self, identity: Option<Identity>) -> bool {
        let mut session = self.inner.session.lock();
        if session.closed || (session.observed && session.identity == identity) {
            return false;
        }
        session.observed = true;
        session.identity = identity;
        self.start(&mut session);
        true
    }

    /// Super-admin tenant selection. Re-resolves only when it matters for
    /// the current identity.
    pub fn select_tenant(&self, tenant: Option<TenantId>) -> bool {
        let mut session = self.inner.session.lock();
        if session.closed || session.selection == tenant {
            return false;
        }
        session.selection = tenant;
        let applies = session
            .identity
            .as_ref()
            .is_some_and(|identity| identity.role.is_super_admin());
        if applies {
            self.start(&mut session);
        }
        applies
    }

    /// Re-run resolution for the current identity.
    pub fn refresh(&self) {
        let mut session = self.inner.session.lock();
        if session.closed {
            return;
        }
        session.observed = true;
        self.start(&mut session);
    }

    /// Wait until the current generation has settled.
    pub async fn settled(&self) -> TenantState {
        let mut rx = self.subscribe();
        let settled = rx.wait_for(TenantPhase::is_settled).await.map(|phase| phase.state());
        match settled {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }

    /// Stop resolving; anything in flight is dropped without committing.
    ///
    /// The phase ends as `Failed`, so pending `settled()` calls return.
    /// Later identity changes and refreshes are ignored.
    pub fn shutdown(&self) {
        let mut session = self.inner.session.lock();
        if session.closed {
            return;
        }
        session.closed = true;
        session.generation += 1;
        if let Some(task) = session.task.take() {
            task.abort();
        }
        self.inner.tx.send_replace(TenantPhase::Failed(SHUT_DOWN.to_string()));
        info!("tenant resolution shut down");
    }

    fn start(&self, session: &mut Session) {
        session.generation += 1;
        let generation = session.generation;

        if let Some(previous) = session.task.take() {
            previous.abort();
        }

        let Some(identity) = session.identity.clone() else {
            debug!(generation, "no identity, tenant resolved to none");
            self.inner.tx.send_replace(TenantPhase::Resolved(None));
            return;
        };

        self.inner.tx.send_replace(TenantPhase::Loading);
        debug!(generation, user_id = %identity.id, role = %identity.role, "resolving tenant");

        let selection = session.selection.clone();
        let inner = Arc::clone(&self.inner);
        session.task = Some(tokio::spawn(async move {
            let outcome = inner
                .resolver
                .resolve_tenant(Some(&identity), selection.as_ref())
                .await;
            if let Err(err) = &outcome {
                warn!(generation, user_id = %identity.id, error = %err, "tenant resolution failed");
            }
            inner.commit(generation, TenantPhase::from_outcome(outcome));
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_core::UserRole;
    use scholar_gateway::MemoryGateway;

    fn resolution(gw: Arc<MemoryGateway>) -> TenantResolution {
        TenantResolution::new(AssignmentResolver::new(gw))
    }

    #[test]
    fn phases_flatten_into_the_triple() {
        assert!(TenantPhase::Loading.state().is_loading);
        let failed = TenantPhase::Failed("Failed to load tenant: x".into()).state();
        assert_eq!(failed.error.as_deref(), Some("Failed to load tenant: x"));
        assert!(!failed.is_loading);
    }

    #[test]
    fn signed_out_resolves_without_a_runtime_or_gateway() {
        let gw = Arc::new(MemoryGateway::new());
        let ctx = resolution(gw.clone());
        assert_eq!(ctx.phase(), TenantPhase::Idle);

        assert!(ctx.set_identity(None));
        assert_eq!(
            ctx.state(),
            TenantState {
                tenant: None,
                is_loading: false,
                error: None
            }
        );
        assert!(!ctx.set_identity(None));
        assert_eq!(gw.call_count(), 0);
    }

    #[tokio::test]
    async fn same_identity_twice_does_not_restart() {
        let ctx = resolution(Arc::new(MemoryGateway::new()));
        let teacher = Identity::new("u1", UserRole::Teacher);
        assert!(ctx.set_identity(Some(teacher.clone())));
        let generation = ctx.generation();
        assert!(!ctx.set_identity(Some(teacher)));
        assert_eq!(ctx.generation(), generation);

        assert!(ctx.set_identity(Some(Identity::new("u1", UserRole::Staff))));
        assert_eq!(ctx.generation(), generation + 1);
    }

    #[tokio::test]
    async fn stale_generations_cannot_commit() {
        let ctx = resolution(Arc::new(MemoryGateway::new()));
        ctx.set_identity(None);
        let stale = ctx.generation();
        ctx.refresh();

        assert!(!ctx.inner.commit(stale, TenantPhase::Failed("late".into())));
        assert_eq!(ctx.state().error, None);
    }

    #[tokio::test]
    async fn selection_only_restarts_for_super_admins() {
        let ctx = resolution(Arc::new(MemoryGateway::new()));
        ctx.set_identity(Some(Identity::new("u1", UserRole::Teacher)));
        assert!(!ctx.select_tenant(Some(TenantId::from("t9"))));
        assert_eq!(ctx.selected_tenant(), Some(TenantId::from("t9")));

        ctx.set_identity(Some(Identity::new("root", UserRole::SuperAdmin)));
        assert!(ctx.select_tenant(Some(TenantId::from("t1"))));
    }

    #[tokio::test]
    async fn shutdown_releases_waiters_and_ignores_later_changes() {
        let gw = Arc::new(MemoryGateway::new());
        let ctx = resolution(gw.clone());
        ctx.shutdown();

        assert!(!ctx.set_identity(Some(Identity::new("u1", UserRole::Teacher))));
        ctx.refresh();
        let state = ctx.settled().await;
        assert_eq!(state.error.as_deref(), Some(SHUT_DOWN));
        assert!(!state.is_loading);
        assert_eq!(gw.call_count(), 0);
    }
}
