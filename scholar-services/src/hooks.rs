use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use scholar_core::errors::ScholarError;
use scholar_core::{BeforeHook, ErrorHook, HookContext, ScholarApp, ServiceMethodKind, ServiceParams};
use scholar_gateway::{QueryGateway, QueryGatewayExt, Select};
use serde_json::{json, Value};
use tracing::{debug, warn};

pub const IS_SUPER_ADMIN: &str = "is_super_admin";
pub const IS_SCHOOL_ADMIN_FOR_SCHOOL: &str = "is_school_admin_for_school";

type Ctx = HookContext<Value, ServiceParams>;

/// Rejects calls made without a signed-in user.
pub struct RequireSignedIn;

#[async_trait]
impl BeforeHook<Value, ServiceParams> for RequireSignedIn {
    async fn run(&self, ctx: &mut Ctx) -> Result<()> {
        if ctx.tenant.user_id.is_none() {
            return Err(ScholarError::not_authenticated("Not signed in").into_anyhow());
        }
        Ok(())
    }
}

/// Fills `school_id` on create from the current-school selection.
pub struct DefaultSchoolId;

#[async_trait]
impl BeforeHook<Value, ServiceParams> for DefaultSchoolId {
    async fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let selected = ctx.tenant.school_id.clone();
        let Some(Value::Object(obj)) = ctx.data.as_mut() else {
            return Ok(());
        };

        let present = obj
            .get("school_id")
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty());
        if present {
            return Ok(());
        }

        match selected {
            Some(school_id) => {
                obj.insert("school_id".to_string(), Value::String(school_id));
                Ok(())
            }
            None => Err(ScholarError::bad_request("No school selected")
                .with_errors(json!({"school_id": ["is required when no school is selected"]}))
                .into_anyhow()),
        }
    }
}

/// Sets `updated_at` on update and patch.
pub struct StampUpdatedAt;

#[async_trait]
impl BeforeHook<Value, ServiceParams> for StampUpdatedAt {
    async fn run(&self, ctx: &mut Ctx) -> Result<()> {
        if let Some(Value::Object(obj)) = ctx.data.as_mut() {
            obj.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));
        }
        Ok(())
    }
}

/// Asks the backend whether the caller may write to the row's school.
///
/// Allowed when `is_super_admin()` or
/// `is_school_admin_for_school(school_uuid)` is true. The backend's row
/// policy still decides; this turns a silent empty write into a 403.
pub struct AuthorizeMutation {
    gateway: Arc<dyn QueryGateway>,
    relation: &'static str,
}

impl AuthorizeMutation {
    pub fn new(gateway: Arc<dyn QueryGateway>, relation: &'static str) -> Self {
        Self { gateway, relation }
    }

    /// Schools the caller must administer for this call.
    ///
    /// Writes to an existing row check the school the row belongs to, and
    /// also the payload's `school_id` when it moves the row elsewhere.
    /// Creates check the payload's school. Empty means nothing to check
    /// against, which is refused.
    async fn schools_to_check(&self, ctx: &Ctx) -> Result<Vec<String>> {
        let requested = ctx
            .data
            .as_ref()
            .and_then(|d| d.get("school_id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let current = match ctx.id.as_deref() {
            Some(id) => {
                let query = Select::from(self.relation).columns("school_id").eq("id", id);
                let row = self
                    .gateway
                    .select_maybe_single(&query)
                    .await
                    .map_err(|e| e.into_anyhow())?;
                row.as_ref()
                    .and_then(|r| r.get("school_id"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }
            None => None,
        };

        let mut schools: Vec<String> = current.into_iter().collect();
        if let Some(school) = requested {
            if !schools.contains(&school) {
                schools.push(school);
            }
        }
        if schools.is_empty() {
            schools.extend(ctx.tenant.school_id.clone());
        }
        Ok(schools)
    }

    async fn is_school_admin(&self, school_id: &str) -> Result<bool> {
        self.gateway
            .rpc_bool(IS_SCHOOL_ADMIN_FOR_SCHOOL, json!({"school_uuid": school_id}))
            .await
            .map_err(|e| e.into_anyhow())
    }
}

#[async_trait]
impl BeforeHook<Value, ServiceParams> for AuthorizeMutation {
    async fn run(&self, ctx: &mut Ctx) -> Result<()> {
        if !ctx.method.is_mutation() {
            return Ok(());
        }

        let super_admin = self
            .gateway
            .rpc_bool(IS_SUPER_ADMIN, json!({}))
            .await
            .map_err(|e| e.into_anyhow())?;
        if super_admin {
            return Ok(());
        }

        let schools = self.schools_to_check(ctx).await?;
        let mut allowed = !schools.is_empty();
        for school_id in &schools {
            if !self.is_school_admin(school_id).await? {
                allowed = false;
                break;
            }
        }

        if !allowed {
            debug!(
                service = %ctx.service_name,
                method = ctx.method.as_str(),
                school_ids = ?schools,
                "mutation refused by authorization check"
            );
            return Err(ScholarError::forbidden(format!(
                "Not allowed to {} {} for this school",
                ctx.method.as_str(),
                ctx.service_name
            ))
            .into_anyhow());
        }
        Ok(())
    }
}

/// Logs failed calls with their structured error.
pub struct LogServiceErrors;

#[async_trait]
impl ErrorHook<Value, ServiceParams> for LogServiceErrors {
    async fn run(&self, ctx: &mut Ctx) -> Result<()> {
        if let Some(err) = &ctx.error {
            let code = ScholarError::from_anyhow(err).map(|e| e.code()).unwrap_or(500);
            warn!(
                service = %ctx.service_name,
                method = ctx.method.as_str(),
                tenant_id = %ctx.tenant.tenant_id,
                code,
                error = %err,
                "service call failed"
            );
        }
        Ok(())
    }
}

pub fn global_hooks(app: &ScholarApp<Value, ServiceParams>) {
    app.hooks(|h| {
        h.before_all(Arc::new(RequireSignedIn));
        h.error_all(Arc::new(LogServiceErrors));
    });
}

/// Write-path hooks shared by every school-scoped entity.
///
/// Runs after the entity's schema hook, so payloads are already validated.
pub fn school_scoped_hooks(
    app: &ScholarApp<Value, ServiceParams>,
    service: &str,
    relation: &'static str,
    gateway: &Arc<dyn QueryGateway>,
) -> Result<()> {
    let authorize = Arc::new(AuthorizeMutation::new(Arc::clone(gateway), relation));
    app.service(service)?.hooks(|h| {
        h.before(ServiceMethodKind::Create, Arc::new(DefaultSchoolId));
        h.before(ServiceMethodKind::Update, Arc::new(StampUpdatedAt));
        h.before(ServiceMethodKind::Patch, Arc::new(StampUpdatedAt));
        for method in [
            ServiceMethodKind::Create,
            ServiceMethodKind::Update,
            ServiceMethodKind::Patch,
            ServiceMethodKind::Remove,
        ] {
            h.before(method, authorize.clone());
        }
    });
    Ok(())
}
