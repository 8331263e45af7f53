//! Routes that drive the session: sign-in/out, tenant resolution, the
//! super-admin tenant selector and the current-school selection.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::rejection::JsonRejection,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    routing, Json, Router,
};
use scholar_auth::{extract_bearer_token, IdentityError, IdentityProvider};
use scholar_core::errors::ScholarError;
use scholar_core::{Identity, TenantId};
use scholar_gateway::QueryGateway;
use scholar_tenancy::{PortalScope, TenantState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::rest::map_json_rejection;
use crate::ScholarAxumError;

#[derive(Clone)]
pub struct SessionState {
    pub scope: Arc<PortalScope>,
    pub identity: IdentityProvider,
    pub gateway: Arc<dyn QueryGateway>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignIn {
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSelection {
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolSelection {
    #[serde(default)]
    pub school_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user: Identity,
    #[serde(flatten)]
    pub tenant: TenantState,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// `PUT /session`: verify the access token and make it the session's
/// identity. A rejected token leaves the current identity untouched.
async fn sign_in(
    State(state): State<SessionState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SessionView>, ScholarAxumError> {
    // The token may come in the body or as a bearer header.
    let body: SignIn = if body.iter().all(u8::is_ascii_whitespace) {
        SignIn::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ScholarError::bad_request("Failed to parse the request body as JSON")
                .with_errors(serde_json::json!({"_schema": [e.to_string()]}))
        })?
    };

    let token = blank_to_none(body.access_token)
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(extract_bearer_token)
                .map(str::to_string)
        })
        .ok_or(IdentityError::MissingToken)
        .map_err(ScholarError::from)?;

    let user = state.identity.verify(&token).map_err(ScholarError::from)?;
    let tenant = state.scope.tenant()?;

    state.gateway.set_access_token(Some(token));
    tenant.set_identity(Some(user.clone()));
    info!(user_id = %user.id, role = %user.role, "session signed in");

    let tenant = tenant.settled().await;
    Ok(Json(SessionView { user, tenant }))
}

/// `DELETE /session`
async fn sign_out(State(state): State<SessionState>) -> Result<StatusCode, ScholarAxumError> {
    let tenant = state.scope.tenant()?;
    tenant.set_identity(None);
    state.gateway.set_access_token(None);
    info!("session signed out");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /session/tenant[?tenant=<id>]`
///
/// The query parameter feeds the super-admin selector; for anyone else it
/// is ignored.
async fn tenant_state(
    State(state): State<SessionState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<TenantState>, ScholarAxumError> {
    let tenant = state.scope.tenant()?;
    let requested = blank_to_none(query.get("tenant").cloned());

    let restarted = match requested {
        Some(id) if tenant.selected_tenant().as_ref().map(TenantId::as_str) != Some(id.as_str()) => {
            tenant.select_tenant(Some(TenantId::from(id)))
        }
        _ => false,
    };

    if restarted {
        return Ok(Json(tenant.settled().await));
    }
    Ok(Json(tenant.state()))
}

/// `POST /session/tenant/refresh`
async fn refresh_tenant(State(state): State<SessionState>) -> Result<Json<TenantState>, ScholarAxumError> {
    let tenant = state.scope.tenant()?;
    tenant.refresh();
    Ok(Json(tenant.settled().await))
}

/// `PUT /session/tenant-selection`
async fn select_tenant(
    State(state): State<SessionState>,
    body: Result<Json<TenantSelection>, JsonRejection>,
) -> Result<Json<TenantState>, ScholarAxumError> {
    let Json(body) = body.map_err(map_json_rejection)?;
    let tenant = state.scope.tenant()?;

    let selection = blank_to_none(body.tenant_id).map(TenantId::from);
    debug!(tenant_id = ?selection, "tenant selection changed");
    if tenant.select_tenant(selection) {
        return Ok(Json(tenant.settled().await));
    }
    Ok(Json(tenant.state()))
}

/// `GET /session/school`
async fn current_school(State(state): State<SessionState>) -> Result<Json<SchoolSelection>, ScholarAxumError> {
    let school = state.scope.current_school()?;
    Ok(Json(SchoolSelection {
        school_id: school.current_school_id(),
    }))
}

/// `PUT /session/school`
async fn select_school(
    State(state): State<SessionState>,
    body: Result<Json<SchoolSelection>, JsonRejection>,
) -> Result<Json<SchoolSelection>, ScholarAxumError> {
    let Json(body) = body.map_err(map_json_rejection)?;
    let school = state.scope.current_school()?;

    let school_id = blank_to_none(body.school_id);
    school.set_current_school_id(school_id.clone())?;
    debug!(school_id = ?school_id, "school selection changed");
    Ok(Json(SchoolSelection { school_id }))
}

pub fn session_router(state: SessionState) -> Router<()> {
    Router::new()
        .route("/", routing::put(sign_in).delete(sign_out))
        .route("/tenant", routing::get(tenant_state))
        .route("/tenant/refresh", routing::post(refresh_tenant))
        .route("/tenant-selection", routing::put(select_tenant))
        .route("/school", routing::get(current_school).put(select_school))
        .with_state(state)
}
