use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use scholar_axum::{scoped_context, ScholarAxumError};
use scholar_services::{Dashboard, DashboardSummary};
use scholar_tenancy::PortalScope;

#[derive(Clone)]
struct DashboardState {
    scope: Arc<PortalScope>,
    dashboard: Dashboard,
}

async fn summary(State(state): State<DashboardState>) -> Result<Json<DashboardSummary>, ScholarAxumError> {
    let ctx = scoped_context(&state.scope).await?;
    Ok(Json(state.dashboard.summary(&ctx).await?))
}

/// `GET /dashboard/summary`
pub fn router(scope: Arc<PortalScope>, dashboard: Dashboard) -> Router<()> {
    Router::new()
        .route("/summary", get(summary))
        .with_state(DashboardState { scope, dashboard })
}
