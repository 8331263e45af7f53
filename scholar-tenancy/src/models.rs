//! Read-through copies of backend rows.
//!
//! The backend owns these records; the portal only decodes what it needs
//! for scoping and never writes them back.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use scholar_core::{TenantId, UserRole};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Inactive,
    Suspended,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Inactive => "inactive",
            TenantStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantPlan {
    Basic,
    Premium,
    Enterprise,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureFlags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostel: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lessons: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Branding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_students: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_staff: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_schools: Option<u32>,
}

/// Tenant settings. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TenantSettings {
    pub features: FeatureFlags,
    pub branding: Branding,
    pub limits: Limits,
}

impl TenantSettings {
    /// Features default to enabled unless explicitly switched off.
    pub fn feature_enabled(&self, feature: &str) -> bool {
        let flag = match feature {
            "transport" => self.features.transport,
            "hostel" => self.features.hostel,
            "lessons" => self.features.lessons,
            "reports" => self.features.reports,
            _ => None,
        };
        flag.unwrap_or(true)
    }
}

fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub domain: Option<String>,
    pub status: TenantStatus,
    pub plan: TenantPlan,
    #[serde(default, deserialize_with = "null_as_default")]
    pub settings: TenantSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

/// A `tenant_users` row binding a user to a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub user_id: String,
    pub tenant_id: TenantId,
    pub role: UserRole,
    #[serde(default, deserialize_with = "null_as_default")]
    pub permissions: Vec<String>,
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Ordering key for the most-recent policy: `updated_at`, then `created_at`.
    pub(crate) fn recency(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (self.updated_at, self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    pub id: String,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}
