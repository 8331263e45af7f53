//! Core multi-tenant types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a tenant (an institution).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Roles a user can hold through a tenant assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    TenantAdmin,
    SchoolAdmin,
    Staff,
    Teacher,
    Student,
    Parent,
    Guest,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SuperAdmin => "super_admin",
            UserRole::TenantAdmin => "tenant_admin",
            UserRole::SchoolAdmin => "school_admin",
            UserRole::Staff => "staff",
            UserRole::Teacher => "teacher",
            UserRole::Student => "student",
            UserRole::Parent => "parent",
            UserRole::Guest => "guest",
        }
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, UserRole::SuperAdmin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "super_admin" => Ok(UserRole::SuperAdmin),
            "tenant_admin" => Ok(UserRole::TenantAdmin),
            "school_admin" => Ok(UserRole::SchoolAdmin),
            "staff" => Ok(UserRole::Staff),
            "teacher" => Ok(UserRole::Teacher),
            "student" => Ok(UserRole::Student),
            "parent" => Ok(UserRole::Parent),
            "guest" => Ok(UserRole::Guest),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Authenticated user as reported upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub role: UserRole,
}

impl Identity {
    pub fn new(id: impl Into<String>, role: UserRole) -> Self {
        Self { id: id.into(), role }
    }
}

/// Context carried with every service call.
///
/// Built from the resolved tenant and the current-school selection, so
/// every service and hook is explicitly tenant-aware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub school_id: Option<String>,
    pub user_id: Option<String>,
    pub role: UserRole,
}

impl TenantContext {
    /// Convenience constructor from a string; role defaults to guest.
    pub fn new<S: Into<String>>(tenant: S) -> Self {
        Self {
            tenant_id: TenantId(tenant.into()),
            school_id: None,
            user_id: None,
            role: UserRole::Guest,
        }
    }

    pub fn with_school(mut self, school_id: Option<String>) -> Self {
        self.school_id = school_id;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>, role: UserRole) -> Self {
        self.user_id = Some(user_id.into());
        self.role = role;
        self
    }
}
