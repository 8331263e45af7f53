use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use scholar_core::{Identity, TenantId};
use scholar_gateway::{GatewayError, QueryGateway, QueryGatewayExt, Select};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Assignment, Tenant, TenantStatus};

pub const TENANT_USERS: &str = "tenant_users";
pub const TENANTS: &str = "tenants";

/// What to do when a user has more than one active assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultipleAssignmentPolicy {
    /// Refuse to pick one.
    #[default]
    Reject,
    /// Take the latest by `updated_at`, then `created_at`.
    MostRecent,
}

impl fmt::Display for MultipleAssignmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MultipleAssignmentPolicy::Reject => "reject",
            MultipleAssignmentPolicy::MostRecent => "most_recent",
        })
    }
}

impl FromStr for MultipleAssignmentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(MultipleAssignmentPolicy::Reject),
            "most_recent" | "most-recent" => Ok(MultipleAssignmentPolicy::MostRecent),
            other => Err(format!("unknown multiple-assignment policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    #[error("No tenant assigned to user")]
    NotAssigned,

    #[error("Multiple active tenant assignments for user")]
    AmbiguousAssignment { count: usize },

    #[error("Tenant not found or inactive")]
    TenantUnavailable,

    #[error("Failed to load tenant: {0}")]
    Fetch(#[from] GatewayError),
}

impl ResolveError {
    /// Retryable through a refresh; the others need a data change.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, ResolveError::Fetch(_))
    }
}

/// Maps an identity to the tenant it may act in.
#[derive(Clone)]
pub struct AssignmentResolver {
    gateway: Arc<dyn QueryGateway>,
    policy: MultipleAssignmentPolicy,
}

impl AssignmentResolver {
    pub fn new(gateway: Arc<dyn QueryGateway>) -> Self {
        Self {
            gateway,
            policy: MultipleAssignmentPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MultipleAssignmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> MultipleAssignmentPolicy {
        self.policy
    }

    pub fn gateway(&self) -> &Arc<dyn QueryGateway> {
        &self.gateway
    }

    /// Tenant id for `identity`, or `None` when there is nothing to resolve.
    ///
    /// Super-admins take `selected` verbatim and never touch
    /// `tenant_users`; everyone else needs an active assignment.
    pub async fn resolve(
        &self,
        identity: Option<&Identity>,
        selected: Option<&TenantId>,
    ) -> Result<Option<TenantId>, ResolveError> {
        let Some(identity) = identity else {
            return Ok(None);
        };

        if identity.role.is_super_admin() {
            debug!(user_id = %identity.id, selected = ?selected, "super admin uses selected tenant");
            return Ok(selected.cloned());
        }

        let assignment = self.active_assignment(&identity.id).await?;
        Ok(Some(assignment.tenant_id))
    }

    /// The single active `tenant_users` row of a user, per the policy.
    pub async fn active_assignment(&self, user_id: &str) -> Result<Assignment, ResolveError> {
        let query = Select::from(TENANT_USERS)
            .eq("user_id", user_id)
            .eq("is_active", true);
        let rows = self.gateway.select(&query).await?;

        let mut assignments = rows
            .into_iter()
            .map(serde_json::from_value::<Assignment>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        match assignments.len() {
            0 => Err(ResolveError::NotAssigned),
            1 => Ok(assignments.remove(0)),
            count => match self.policy {
                MultipleAssignmentPolicy::Reject => {
                    warn!(user_id, count, "ambiguous tenant assignment rejected");
                    Err(ResolveError::AmbiguousAssignment { count })
                }
                MultipleAssignmentPolicy::MostRecent => {
                    debug!(user_id, count, "picking most recent tenant assignment");
                    assignments
                        .into_iter()
                        .max_by_key(Assignment::recency)
                        .ok_or(ResolveError::NotAssigned)
                }
            },
        }
    }

    /// Fetch an active tenant by id.
    pub async fn fetch_tenant(&self, tenant_id: &TenantId) -> Result<Tenant, ResolveError> {
        let query = Select::from(TENANTS)
            .eq("id", tenant_id.as_str())
            .eq("status", TenantStatus::Active.as_str());

        let row = self
            .gateway
            .select_maybe_single(&query)
            .await?
            .ok_or(ResolveError::TenantUnavailable)?;

        let tenant: Tenant =
            serde_json::from_value(row).map_err(|e| GatewayError::Decode(e.to_string()))?;
        if !tenant.is_active() {
            return Err(ResolveError::TenantUnavailable);
        }
        Ok(tenant)
    }

    /// Full resolution: identity → tenant id → active tenant row.
    pub async fn resolve_tenant(
        &self,
        identity: Option<&Identity>,
        selected: Option<&TenantId>,
    ) -> Result<Option<Tenant>, ResolveError> {
        match self.resolve(identity, selected).await? {
            Some(tenant_id) => self.fetch_tenant(&tenant_id).await.map(Some),
            None => Ok(None),
        }
    }
}
