//! RBAC domain models
//!
//! Roles and permissions are catalog entries owned by a landlord. Access is
//! granted per user *and* tenant: `users_tenants_roles` holds role assignments,
//! `users_tenants_permissions` holds direct permission grants. Assigning a role
//! also materializes the role's permissions as direct grants, so the grants
//! table is always the ground truth for "what can this user do here".

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Role entity, scoped to a landlord. `code` is unique per landlord.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: StringUuid,
    pub landlord_id: StringUuid,
    /// Stable role code (e.g., "ADMIN", "TENANT_MANAGER")
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Role {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            landlord_id: StringUuid::nil(),
            code: String::new(),
            name: String::new(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Permission entity, scoped to a landlord. The pair `(action, resource)` is
/// unique per landlord; the display name is always `"{action}:{resource}"`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: StringUuid,
    pub landlord_id: StringUuid,
    /// Verb (e.g., "read", "approve")
    pub action: String,
    /// Target (e.g., "invoice", "report")
    pub resource: String,
    /// Policy applied when an association opts into inheritance
    pub default_policy_id: Option<StringUuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// Canonical permission name used in tokens and access maps.
    pub fn name(&self) -> String {
        format!("{}:{}", self.action, self.resource)
    }
}

impl Default for Permission {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            landlord_id: StringUuid::nil(),
            action: String::new(),
            resource: String::new(),
            default_policy_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Role→Permission association, unique per `(role_id, permission_id)`.
/// `policy_id` is the per-association ABAC override; NULL means the
/// association carries no policy.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RolePermission {
    pub role_id: StringUuid,
    pub permission_id: StringUuid,
    pub policy_id: Option<StringUuid>,
    pub created_at: DateTime<Utc>,
}

/// Role assignment for a user within a tenant, unique per
/// `(user_id, tenant_id, role_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserTenantRole {
    pub id: StringUuid,
    pub user_id: StringUuid,
    pub tenant_id: StringUuid,
    pub role_id: StringUuid,
    pub granted_at: DateTime<Utc>,
}

/// Direct permission grant for a user within a tenant, unique per
/// `(user_id, tenant_id, permission_id)`. Role propagation writes here too.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserTenantPermission {
    pub id: StringUuid,
    pub user_id: StringUuid,
    pub tenant_id: StringUuid,
    pub permission_id: StringUuid,
    pub granted_at: DateTime<Utc>,
}

/// Input for creating a role
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoleInput {
    pub landlord_id: StringUuid,
    #[validate(length(min = 1, max = 100), custom(function = "validate_role_code"))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
}

/// Validate role code format (uppercase, e.g. "ADMIN", "TENANT_MANAGER")
fn validate_role_code(code: &str) -> Result<(), validator::ValidationError> {
    if ROLE_CODE_REGEX.is_match(code) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_role_code"))
    }
}

/// Input for creating a permission
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePermissionInput {
    pub landlord_id: StringUuid,
    #[validate(
        length(min = 1, max = 100),
        custom(function = "validate_identifier")
    )]
    pub action: String,
    #[validate(
        length(min = 1, max = 100),
        custom(function = "validate_identifier")
    )]
    pub resource: String,
    pub default_policy_id: Option<StringUuid>,
}

/// Validate an action/resource segment (lowercase, e.g. "read", "audit_log")
fn validate_identifier(value: &str) -> Result<(), validator::ValidationError> {
    if IDENTIFIER_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_identifier"))
    }
}

/// Input for assigning roles to a user in a tenant
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignRolesInput {
    pub user_id: StringUuid,
    pub tenant_id: StringUuid,
    pub role_ids: Vec<StringUuid>,
}

/// Input for assigning roles and explicit extra permissions in one call
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignAccessInput {
    pub user_id: StringUuid,
    pub tenant_id: StringUuid,
    #[serde(default)]
    pub role_ids: Vec<StringUuid>,
    #[serde(default)]
    pub permission_ids: Vec<StringUuid>,
}

/// Outcome of a role assignment, split by what actually changed.
/// `propagated_permission_ids` are the role-derived permissions that became
/// new direct grants during this call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssignmentResult {
    pub requested_role_ids: Vec<StringUuid>,
    pub newly_assigned_role_ids: Vec<StringUuid>,
    pub already_assigned_role_ids: Vec<StringUuid>,
    pub requested_permission_ids: Vec<StringUuid>,
    pub newly_assigned_permission_ids: Vec<StringUuid>,
    pub already_assigned_permission_ids: Vec<StringUuid>,
    pub propagated_permission_ids: Vec<StringUuid>,
}

/// Outcome of a bulk direct-permission grant.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PermissionGrantOutcome {
    pub requested_permission_ids: Vec<StringUuid>,
    pub newly_granted_permission_ids: Vec<StringUuid>,
    pub already_granted_permission_ids: Vec<StringUuid>,
}

/// Permission detail projection for API responses.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PermissionSummary {
    pub id: StringUuid,
    pub action: String,
    pub resource: String,
}

impl PermissionSummary {
    pub fn name(&self) -> String {
        format!("{}:{}", self.action, self.resource)
    }
}

// Regexes for catalog code validation
lazy_static::lazy_static! {
    pub static ref ROLE_CODE_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Z][A-Z0-9]*(?:_[A-Z0-9]+)*$").unwrap();
    pub static ref IDENTIFIER_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z][a-z0-9]*(?:_[a-z0-9]+)*$").unwrap();
}
