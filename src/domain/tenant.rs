//! Tenant domain model

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Tenant entity. Access grants (roles and permissions) are always scoped to a
/// user *within* a tenant, and the tenant's landlord decides which roles and
/// permissions are eligible.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: StringUuid,
    pub landlord_id: StringUuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Tenant {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            landlord_id: StringUuid::new_v4(),
            name: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating a new tenant
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTenantInput {
    pub landlord_id: StringUuid,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_default() {
        let tenant = Tenant::default();
        assert!(!tenant.id.is_nil());
        assert!(!tenant.landlord_id.is_nil());
    }

    #[test]
    fn test_create_input_validation() {
        let input = CreateTenantInput {
            landlord_id: StringUuid::new_v4(),
            name: "Filial Centro".to_string(),
        };
        assert!(input.validate().is_ok());

        let too_long = CreateTenantInput {
            landlord_id: StringUuid::new_v4(),
            name: "x".repeat(256),
        };
        assert!(too_long.validate().is_err());
    }
}
