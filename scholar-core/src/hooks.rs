use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::ScholarConfigSnapshot;
use crate::service::ServiceMethodKind;
use crate::tenant::TenantContext;

/// Output of a service call as seen by hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum HookResult<R> {
    One(R),
    Many(Vec<R>),
}

/// Context passed to hooks.
///
/// R = record type
/// P = params type (query, headers, ...)
#[derive(Debug)]
pub struct HookContext<R, P> {
    pub tenant: TenantContext,
    pub service_name: String,
    pub method: ServiceMethodKind,
    pub id: Option<String>,
    pub params: P,
    /// Input payload for create/update/patch. Before hooks may rewrite it.
    pub data: Option<R>,
    /// Output, filled by the service call and visible to after hooks.
    pub result: Option<HookResult<R>>,
    /// Set while error hooks run. An error hook may clear it to recover.
    pub error: Option<anyhow::Error>,
    pub config: ScholarConfigSnapshot,
}

impl<R, P> HookContext<R, P> {
    pub fn new(
        tenant: TenantContext,
        service_name: impl Into<String>,
        method: ServiceMethodKind,
        params: P,
        config: ScholarConfigSnapshot,
    ) -> Self {
        Self {
            tenant,
            service_name: service_name.into(),
            method,
            id: None,
            params,
            data: None,
            result: None,
            error: None,
            config,
        }
    }
}

#[async_trait]
pub trait BeforeHook<R, P>: Send + Sync {
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

#[async_trait]
pub trait AfterHook<R, P>: Send + Sync {
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

#[async_trait]
pub trait ErrorHook<R, P>: Send + Sync {
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

type HookMap<H> = HashMap<ServiceMethodKind, Vec<Arc<H>>>;

/// Hooks registered globally or for one service.
///
/// Order of execution for a call: `before` hooks (all, then by method)
/// → service → `after` hooks in reverse registration order. `error`
/// hooks run when any of those fail.
pub struct ServiceHooks<R, P> {
    pub(crate) before_all: Vec<Arc<dyn BeforeHook<R, P>>>,
    pub(crate) before_by_method: HookMap<dyn BeforeHook<R, P>>,
    pub(crate) after_all: Vec<Arc<dyn AfterHook<R, P>>>,
    pub(crate) after_by_method: HookMap<dyn AfterHook<R, P>>,
    pub(crate) error_all: Vec<Arc<dyn ErrorHook<R, P>>>,
    pub(crate) error_by_method: HookMap<dyn ErrorHook<R, P>>,
}

impl<R, P> Default for ServiceHooks<R, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> ServiceHooks<R, P> {
    pub fn new() -> Self {
        Self {
            before_all: Vec::new(),
            before_by_method: HashMap::new(),
            after_all: Vec::new(),
            after_by_method: HashMap::new(),
            error_all: Vec::new(),
            error_by_method: HashMap::new(),
        }
    }

    pub fn before_all(&mut self, hook: Arc<dyn BeforeHook<R, P>>) -> &mut Self {
        self.before_all.push(hook);
        self
    }

    pub fn before(&mut self, method: ServiceMethodKind, hook: Arc<dyn BeforeHook<R, P>>) -> &mut Self {
        self.before_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn after_all(&mut self, hook: Arc<dyn AfterHook<R, P>>) -> &mut Self {
        self.after_all.push(hook);
        self
    }

    pub fn after(&mut self, method: ServiceMethodKind, hook: Arc<dyn AfterHook<R, P>>) -> &mut Self {
        self.after_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn error_all(&mut self, hook: Arc<dyn ErrorHook<R, P>>) -> &mut Self {
        self.error_all.push(hook);
        self
    }

    pub fn error(&mut self, method: ServiceMethodKind, hook: Arc<dyn ErrorHook<R, P>>) -> &mut Self {
        self.error_by_method.entry(method).or_default().push(hook);
        self
    }
}

pub(crate) fn collect_method_hooks<H: ?Sized>(
    all: &[Arc<H>],
    by_method: &HookMap<H>,
    method: &ServiceMethodKind,
) -> Vec<Arc<H>> {
    let mut out: Vec<Arc<H>> = all.to_vec();
    if let Some(specific) = by_method.get(method) {
        out.extend(specific.iter().cloned());
    }
    out
}
