use std::sync::Arc;

use axum::http::HeaderName;
use axum::routing::get;
use axum::Router;
use scholar_auth::IdentityProvider;
use scholar_core::{ScholarApp, ScholarService};
use scholar_gateway::QueryGateway;
use scholar_tenancy::PortalScope;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::params::FromRestParams;
use crate::rest;
use crate::session::{session_router, SessionState};
use crate::ScholarAxumState;

const REQUEST_ID: &str = "x-request-id";

pub struct AxumApp<R, P = ()>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub app: Arc<ScholarApp<R, P>>,
    pub scope: Arc<PortalScope>,
    pub router: Router<()>,
}

impl<R, P> Clone for AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: Arc::clone(&self.app),
            scope: Arc::clone(&self.scope),
            router: self.router.clone(),
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

impl<R, P> AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub fn new(app: ScholarApp<R, P>, scope: Arc<PortalScope>) -> Self {
        Self {
            app: Arc::new(app),
            scope,
            router: Router::new().route("/health", get(health)),
        }
    }

    fn state(&self) -> ScholarAxumState<R, P> {
        ScholarAxumState {
            app: Arc::clone(&self.app),
            scope: Arc::clone(&self.scope),
        }
    }

    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    /// Mount REST routes for a service already registered on the app.
    pub fn mount_service(mut self, path: &str) -> anyhow::Result<Self>
    where
        R: Serialize + DeserializeOwned,
        P: FromRestParams,
    {
        let name = path.trim_start_matches('/');
        self.app.service(name)?;

        let router = rest::service_router(Arc::new(name.to_string()), self.state());
        self.router = self.router.nest(path, router);
        Ok(self)
    }

    /// Register `service` under `path` and mount its REST routes.
    pub fn use_service(self, path: &str, service: Arc<dyn ScholarService<R, P>>) -> anyhow::Result<Self>
    where
        R: Serialize + DeserializeOwned,
        P: FromRestParams,
    {
        self.app.register_service(path.trim_start_matches('/'), service);
        self.mount_service(path)
    }

    /// Mount the `/session` routes.
    pub fn with_session(self, identity: IdentityProvider, gateway: Arc<dyn QueryGateway>) -> Self {
        let state = SessionState {
            scope: Arc::clone(&self.scope),
            identity,
            gateway,
        };
        self.use_router("/session", session_router(state))
    }

    /// The finished router: request ids are assigned (or kept when the
    /// client sent one), traced and echoed on the response.
    pub fn into_router(self) -> Router<()> {
        let request_id = HeaderName::from_static(REQUEST_ID);
        self.router
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, self.into_router()).await?;
        Ok(())
    }
}

pub fn axum<R, P>(app: ScholarApp<R, P>, scope: Arc<PortalScope>) -> AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    AxumApp::new(app, scope)
}
