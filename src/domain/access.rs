//! Read-side access projections
//!
//! Built per request by the access query service; never persisted. The token
//! layer flattens these into the `tenants` claim.

use super::common::StringUuid;
use serde::{Deserialize, Serialize};

/// Everything a user can do in one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantAccess {
    pub tenant_id: StringUuid,
    pub tenant_name: String,
    pub landlord_id: StringUuid,
    pub landlord_name: String,
    pub roles: Vec<TenantRoleAccess>,
}

/// A role held in a tenant, with the tenant's effective permission names.
/// Because role permissions are materialized as direct grants, the grants
/// table for the tenant is the source of each `permissions` list; every role
/// entry of a tenant therefore carries the same deduplicated, sorted set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRoleAccess {
    pub role_name: String,
    pub permissions: Vec<String>,
}

impl TenantAccess {
    /// Role names in this tenant.
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.role_name.clone()).collect()
    }

    /// Union of the per-role permission lists, deduplicated and sorted.
    pub fn permission_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .roles
            .iter()
            .flat_map(|r| r.permissions.iter().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}
