use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::debug;

use crate::errors::ScholarError;
use crate::hooks::{collect_method_hooks, AfterHook, BeforeHook, ErrorHook};
use crate::{
    HookContext, HookResult, ScholarConfig, ScholarConfigSnapshot, ScholarService,
    ServiceHooks, ServiceMethodKind, ServiceRegistry, TenantContext,
};

struct ScholarAppInner<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    registry: RwLock<ServiceRegistry<R, P>>,
    global_hooks: RwLock<ServiceHooks<R, P>>,
    service_hooks: RwLock<HashMap<String, ServiceHooks<R, P>>>,
    config: RwLock<ScholarConfig>,
}

/// Central application container.
///
/// Transport-agnostic. Holds:
/// - service registry
/// - app hooks
/// - per-service hooks
/// - config
pub struct ScholarApp<R, P = ()>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    inner: Arc<ScholarAppInner<R, P>>,
}

type HooksForMethod<R, P> = (
    Vec<Arc<dyn BeforeHook<R, P>>>,
    Vec<Arc<dyn AfterHook<R, P>>>,
    Vec<Arc<dyn ErrorHook<R, P>>>,
);

impl<R, P> Default for ScholarApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> Clone for ScholarApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, P> ScholarApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new() -> Self {
        Self::with_config(ScholarConfig::new())
    }

    pub fn with_config(config: ScholarConfig) -> Self {
        Self {
            inner: Arc::new(ScholarAppInner {
                registry: RwLock::new(ServiceRegistry::new()),
                global_hooks: RwLock::new(ServiceHooks::new()),
                service_hooks: RwLock::new(HashMap::new()),
                config: RwLock::new(config),
            }),
        }
    }

    pub fn register_service<S>(&self, name: S, service: Arc<dyn ScholarService<R, P>>)
    where
        S: Into<String>,
    {
        let name = name.into();
        debug!(service = %name, "registering service");
        self.inner.registry.write().register(name, service);
    }

    /// `app.hooks(|h| ...)`: hooks applied to every service.
    pub fn hooks<F>(&self, f: F)
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        let mut g = self.inner.global_hooks.write();
        f(&mut g);
    }

    pub(crate) fn configure_service_hooks<F>(&self, service_name: &str, f: F)
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        let mut map = self.inner.service_hooks.write();
        let hooks = map.entry(service_name.to_string()).or_default();
        f(hooks);
    }

    /// `app.service("name")`
    pub fn service(&self, name: &str) -> Result<ServiceHandle<R, P>> {
        let svc = self
            .inner
            .registry
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ScholarError::not_found(format!("Service not found: {name}")).into_anyhow())?;

        Ok(ServiceHandle {
            app: self.clone(),
            name: name.to_string(),
            service: svc,
        })
    }

    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.registry.read().names().map(str::to_string).collect();
        names.sort();
        names
    }

    /// `app.set(key, value)`
    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.inner.config.write().set(key, value);
    }

    /// `app.get(key)`
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.config.read().get(key).map(str::to_string)
    }

    pub fn config_snapshot(&self) -> ScholarConfigSnapshot {
        self.inner.config.read().snapshot()
    }
}

/// A named service bound to its app, running calls through the hook pipeline.
pub struct ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    app: ScholarApp<R, P>,
    name: String,
    service: Arc<dyn ScholarService<R, P>>,
}

impl<R, P> ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    /// `app.service("x")?.hooks(|h| ...)`
    pub fn hooks<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        self.app.configure_service_hooks(&self.name, f);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inner(&self) -> &Arc<dyn ScholarService<R, P>> {
        &self.service
    }

    /// Global hooks first, then service hooks.
    fn collect_hooks_for_method(&self, method: &ServiceMethodKind) -> HooksForMethod<R, P> {
        let g = self.app.inner.global_hooks.read();
        let map = self.app.inner.service_hooks.read();

        let mut before = collect_method_hooks(&g.before_all, &g.before_by_method, method);
        let mut after = collect_method_hooks(&g.after_all, &g.after_by_method, method);
        let mut error = collect_method_hooks(&g.error_all, &g.error_by_method, method);

        if let Some(h) = map.get(&self.name) {
            before.extend(collect_method_hooks(&h.before_all, &h.before_by_method, method));
            after.extend(collect_method_hooks(&h.after_all, &h.after_by_method, method));
            error.extend(collect_method_hooks(&h.error_all, &h.error_by_method, method));
        }

        (before, after, error)
    }

    fn context(&self, tenant: TenantContext, method: ServiceMethodKind, params: P) -> HookContext<R, P> {
        HookContext::new(tenant, self.name.clone(), method, params, self.app.config_snapshot())
    }

    /// before → service call → after (reversed); error hooks on failure.
    async fn run_pipeline(&self, mut ctx: HookContext<R, P>) -> Result<HookContext<R, P>> {
        if !self.service.capabilities().allows(&ctx.method) {
            return Err(ScholarError::method_not_allowed(format!(
                "Method '{}' is not allowed on service '{}'",
                ctx.method.as_str(),
                self.name
            ))
            .into_anyhow());
        }

        let (before, after, error) = self.collect_hooks_for_method(&ctx.method);

        let res = async {
            for h in &before {
                h.run(&mut ctx).await?;
            }

            dispatch(self.service.as_ref(), &mut ctx).await?;

            for h in after.iter().rev() {
                h.run(&mut ctx).await?;
            }
            Ok::<(), anyhow::Error>(())
        }
        .await;

        if let Err(e) = res {
            debug!(service = %self.name, method = ctx.method.as_str(), error = %e, "service call failed");
            ctx.error = Some(e);

            for h in &error {
                if let Err(hook_err) = h.run(&mut ctx).await {
                    debug!(service = %self.name, error = %hook_err, "error hook failed");
                }
            }

            if let Some(err) = ctx.error.take() {
                return Err(err);
            }
        }

        Ok(ctx)
    }

    pub async fn find(&self, tenant: TenantContext, params: P) -> Result<Vec<R>> {
        let ctx = self.context(tenant, ServiceMethodKind::Find, params);
        let ctx = self.run_pipeline(ctx).await?;
        match ctx.result {
            Some(HookResult::Many(v)) => Ok(v),
            Some(HookResult::One(_)) => Err(anyhow::anyhow!("find() produced HookResult::One unexpectedly")),
            None => Ok(vec![]),
        }
    }

    pub async fn get(&self, tenant: TenantContext, id: &str, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Get, params);
        ctx.id = Some(id.to_string());
        let ctx = self.run_pipeline(ctx).await?;
        expect_one(ctx.result, "get")
    }

    pub async fn create(&self, tenant: TenantContext, data: R, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Create, params);
        ctx.data = Some(data);
        let ctx = self.run_pipeline(ctx).await?;
        expect_one(ctx.result, "create")
    }

    pub async fn update(&self, tenant: TenantContext, id: &str, data: R, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Update, params);
        ctx.id = Some(id.to_string());
        ctx.data = Some(data);
        let ctx = self.run_pipeline(ctx).await?;
        expect_one(ctx.result, "update")
    }

    pub async fn patch(&self, tenant: TenantContext, id: &str, data: R, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Patch, params);
        ctx.id = Some(id.to_string());
        ctx.data = Some(data);
        let ctx = self.run_pipeline(ctx).await?;
        expect_one(ctx.result, "patch")
    }

    pub async fn remove(&self, tenant: TenantContext, id: &str, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Remove, params);
        ctx.id = Some(id.to_string());
        let ctx = self.run_pipeline(ctx).await?;
        expect_one(ctx.result, "remove")
    }
}

fn expect_one<R>(result: Option<HookResult<R>>, method: &str) -> Result<R> {
    match result {
        Some(HookResult::One(v)) => Ok(v),
        Some(HookResult::Many(_)) => Err(anyhow::anyhow!("{method}() produced HookResult::Many unexpectedly")),
        None => Err(anyhow::anyhow!("{method}() produced no result")),
    }
}

fn required_id<R, P>(ctx: &HookContext<R, P>) -> Result<String> {
    ctx.id
        .clone()
        .ok_or_else(|| ScholarError::bad_request(format!("{}() requires an id", ctx.method.as_str())).into_anyhow())
}

fn required_data<R, P>(ctx: &mut HookContext<R, P>) -> Result<R> {
    let method = ctx.method.as_str();
    ctx.data
        .take()
        .ok_or_else(|| ScholarError::bad_request(format!("{method}() requires data")).into_anyhow())
}

async fn dispatch<R, P>(svc: &dyn ScholarService<R, P>, ctx: &mut HookContext<R, P>) -> Result<()>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    let params = ctx.params.clone();
    let result = match ctx.method {
        ServiceMethodKind::Find => HookResult::Many(svc.find(&ctx.tenant, params).await?),
        ServiceMethodKind::Get => {
            let id = required_id(ctx)?;
            HookResult::One(svc.get(&ctx.tenant, &id, params).await?)
        }
        ServiceMethodKind::Create => {
            let data = required_data(ctx)?;
            HookResult::One(svc.create(&ctx.tenant, data, params).await?)
        }
        ServiceMethodKind::Update => {
            let id = required_id(ctx)?;
            let data = required_data(ctx)?;
            HookResult::One(svc.update(&ctx.tenant, &id, data, params).await?)
        }
        ServiceMethodKind::Patch => {
            let id = required_id(ctx)?;
            let data = required_data(ctx)?;
            HookResult::One(svc.patch(&ctx.tenant, &id, data, params).await?)
        }
        ServiceMethodKind::Remove => {
            let id = required_id(ctx)?;
            HookResult::One(svc.remove(&ctx.tenant, &id, params).await?)
        }
        ServiceMethodKind::Custom(name) => {
            return Err(ScholarError::not_implemented(format!("Custom method not dispatchable: {name}")).into_anyhow());
        }
    };
    ctx.result = Some(result);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::ServiceCapabilities;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Echo;

    #[async_trait]
    impl ScholarService<String, ()> for Echo {
        fn capabilities(&self) -> ServiceCapabilities {
            ServiceCapabilities::from_methods(vec![ServiceMethodKind::Create, ServiceMethodKind::Find])
        }

        async fn create(&self, ctx: &TenantContext, data: String, _params: ()) -> Result<String> {
            Ok(format!("{}:{data}", ctx.tenant_id))
        }

        async fn find(&self, _ctx: &TenantContext, _params: ()) -> Result<Vec<String>> {
            Err(ScholarError::unavailable("down").into_anyhow())
        }
    }

    struct Upper;

    #[async_trait]
    impl BeforeHook<String, ()> for Upper {
        async fn run(&self, ctx: &mut HookContext<String, ()>) -> Result<()> {
            if let Some(d) = ctx.data.as_mut() {
                *d = d.to_uppercase();
            }
            Ok(())
        }
    }

    struct Record(Arc<Mutex<Vec<String>>>, &'static str);

    #[async_trait]
    impl AfterHook<String, ()> for Record {
        async fn run(&self, _ctx: &mut HookContext<String, ()>) -> Result<()> {
            self.0.lock().push(self.1.to_string());
            Ok(())
        }
    }

    struct Recover;

    #[async_trait]
    impl ErrorHook<String, ()> for Recover {
        async fn run(&self, ctx: &mut HookContext<String, ()>) -> Result<()> {
            ctx.error = None;
            ctx.result = Some(HookResult::Many(vec!["cached".to_string()]));
            Ok(())
        }
    }

    #[tokio::test]
    async fn before_hooks_rewrite_data_and_after_hooks_run_in_reverse() {
        let app: ScholarApp<String, ()> = ScholarApp::new();
        app.register_service("echo", Arc::new(Echo));
        let seen = Arc::new(Mutex::new(Vec::new()));

        app.hooks(|h| {
            h.before_all(Arc::new(Upper));
            h.after_all(Arc::new(Record(Arc::clone(&seen), "first")));
        });
        let svc = app
            .service("echo")
            .unwrap()
            .hooks(|h| {
                h.after(ServiceMethodKind::Create, Arc::new(Record(Arc::clone(&seen), "second")));
            });

        let out = svc.create(TenantContext::new("t1"), "hi".to_string(), ()).await.unwrap();
        assert_eq!(out, "t1:HI");
        assert_eq!(*seen.lock(), vec!["second".to_string(), "first".to_string()]);
    }

    #[tokio::test]
    async fn disallowed_methods_are_rejected_before_hooks() {
        let app: ScholarApp<String, ()> = ScholarApp::new();
        app.register_service("echo", Arc::new(Echo));
        let err = app
            .service("echo")
            .unwrap()
            .get(TenantContext::new("t1"), "1", ())
            .await
            .unwrap_err();
        assert_eq!(ScholarError::from_anyhow(&err).unwrap().kind, ErrorKind::MethodNotAllowed);
    }

    #[tokio::test]
    async fn error_hooks_can_recover() {
        let app: ScholarApp<String, ()> = ScholarApp::new();
        app.register_service("echo", Arc::new(Echo));
        let svc = app.service("echo").unwrap();

        let err = svc.find(TenantContext::new("t1"), ()).await.unwrap_err();
        assert_eq!(ScholarError::from_anyhow(&err).unwrap().kind, ErrorKind::Unavailable);

        let svc = svc.hooks(|h| {
            h.error_all(Arc::new(Recover));
        });
        let rows = svc.find(TenantContext::new("t1"), ()).await.unwrap();
        assert_eq!(rows, vec!["cached".to_string()]);
    }

    #[test]
    fn unknown_service_is_not_found() {
        let app: ScholarApp<String, ()> = ScholarApp::new();
        let err = app.service("missing").err().unwrap();
        assert_eq!(ScholarError::from_anyhow(&err).unwrap().kind, ErrorKind::NotFound);
    }
}
