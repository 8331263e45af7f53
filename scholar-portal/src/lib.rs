pub mod config;
mod dashboard;
mod gateway;

use std::sync::Arc;

use anyhow::Result;
use scholar_auth::{IdentityOptions, IdentityProvider};
use scholar_axum::{axum, AxumApp};
use scholar_core::{ScholarApp, ScholarConfig, ServiceParams};
use scholar_services::{Dashboard, SERVICE_NAMES};
use scholar_tenancy::{FileStorage, PortalScope};
use serde_json::Value;
use tracing::{info, warn};

pub use config::{portal_config, GatewayKind, PortalSettings, ENV_PREFIX};

/// Build the portal from the process environment.
pub async fn build() -> Result<AxumApp<Value, ServiceParams>> {
    build_with(portal_config(std::env::vars())).await
}

pub async fn build_with(config: ScholarConfig) -> Result<AxumApp<Value, ServiceParams>> {
    let settings = PortalSettings::from_snapshot(&config.snapshot())?;
    let gateway = gateway::connect(&settings.gateway)?;

    let scope = PortalScope::builder(Arc::clone(&gateway))
        .storage(Arc::new(FileStorage::new(&settings.storage_path)))
        .policy(settings.policy)
        .build();
    let school = scope.current_school()?.initialize().await;
    info!(school_id = ?school, storage = %settings.storage_path.display(), "session storage ready");
    let scope = Arc::new(scope);

    if settings.jwt_secret.is_none() {
        warn!("auth.jwt_secret is not set; sign-in will fail");
    }
    let identity = IdentityProvider::new(IdentityOptions {
        jwt_secret: settings.jwt_secret.clone(),
        audience: settings.audience.clone(),
    });

    let app: ScholarApp<Value, ServiceParams> = ScholarApp::with_config(config);
    scholar_services::configure(&app, Arc::clone(&gateway))?;

    let mut ax = axum(app, Arc::clone(&scope));
    for name in SERVICE_NAMES {
        ax = ax.mount_service(&format!("/{name}"))?;
    }

    let ax = ax
        .with_session(identity, Arc::clone(&gateway))
        .use_router("/dashboard", dashboard::router(scope, Dashboard::new(gateway)));

    Ok(ax)
}

