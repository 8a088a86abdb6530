//! Access repository: read-side aggregation over assignments and grants
//!
//! Every query here feeds the access map / token claims; each boolean check
//! in the service layer reuses these same queries.

use crate::domain::StringUuid;
use crate::error::Result;
use async_trait::async_trait;
use sqlx::{FromRow, MySqlPool};

/// One tenant the user belongs to (via a role or a direct grant), with the
/// landlord resolved for the access map.
#[derive(Debug, Clone, FromRow)]
pub struct TenantMembershipRow {
    pub tenant_id: StringUuid,
    pub tenant_name: String,
    pub landlord_id: StringUuid,
    pub landlord_name: String,
}

/// Role name held in a tenant.
#[derive(Debug, Clone, FromRow)]
pub struct TenantRoleNameRow {
    pub tenant_id: StringUuid,
    pub role_name: String,
}

/// Granted permission in a tenant, as its `(action, resource)` pair.
#[derive(Debug, Clone, FromRow)]
pub struct TenantPermissionNameRow {
    pub tenant_id: StringUuid,
    pub action: String,
    pub resource: String,
}

impl TenantPermissionNameRow {
    pub fn name(&self) -> String {
        format!("{}:{}", self.action, self.resource)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessRepository: Send + Sync {
    async fn find_role_names_by_user(&self, user_id: StringUuid) -> Result<Vec<String>>;
    async fn find_role_names_by_user_and_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<Vec<String>>;
    async fn find_permission_names_by_user(&self, user_id: StringUuid) -> Result<Vec<String>>;
    async fn find_permission_names_by_user_and_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<Vec<String>>;

    async fn find_tenant_memberships(
        &self,
        user_id: StringUuid,
    ) -> Result<Vec<TenantMembershipRow>>;
    async fn find_role_names_by_user_grouped(
        &self,
        user_id: StringUuid,
    ) -> Result<Vec<TenantRoleNameRow>>;
    async fn find_permission_names_by_user_grouped(
        &self,
        user_id: StringUuid,
    ) -> Result<Vec<TenantPermissionNameRow>>;
}

pub struct AccessRepositoryImpl {
    pool: MySqlPool,
}

impl AccessRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessRepository for AccessRepositoryImpl {
    async fn find_role_names_by_user(&self, user_id: StringUuid) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT r.name
            FROM roles r
            INNER JOIN users_tenants_roles utr ON r.id = utr.role_id
            WHERE utr.user_id = ?
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    async fn find_role_names_by_user_and_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT r.name
            FROM roles r
            INNER JOIN users_tenants_roles utr ON r.id = utr.role_id
            WHERE utr.user_id = ? AND utr.tenant_id = ?
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    async fn find_permission_names_by_user(&self, user_id: StringUuid) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT CONCAT(p.action, ':', p.resource) AS name
            FROM permissions p
            INNER JOIN users_tenants_permissions utp ON p.id = utp.permission_id
            WHERE utp.user_id = ?
            ORDER BY name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    async fn find_permission_names_by_user_and_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT CONCAT(p.action, ':', p.resource) AS name
            FROM permissions p
            INNER JOIN users_tenants_permissions utp ON p.id = utp.permission_id
            WHERE utp.user_id = ? AND utp.tenant_id = ?
            ORDER BY name
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    async fn find_tenant_memberships(
        &self,
        user_id: StringUuid,
    ) -> Result<Vec<TenantMembershipRow>> {
        let rows = sqlx::query_as::<_, TenantMembershipRow>(
            r#"
            SELECT t.id AS tenant_id, t.name AS tenant_name,
                   l.id AS landlord_id, l.name AS landlord_name
            FROM tenants t
            INNER JOIN landlords l ON l.id = t.landlord_id
            WHERE t.id IN (
                SELECT tenant_id FROM users_tenants_roles WHERE user_id = ?
                UNION
                SELECT tenant_id FROM users_tenants_permissions WHERE user_id = ?
            )
            ORDER BY t.name
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find_role_names_by_user_grouped(
        &self,
        user_id: StringUuid,
    ) -> Result<Vec<TenantRoleNameRow>> {
        let rows = sqlx::query_as::<_, TenantRoleNameRow>(
            r#"
            SELECT DISTINCT utr.tenant_id, r.name AS role_name
            FROM users_tenants_roles utr
            INNER JOIN roles r ON r.id = utr.role_id
            WHERE utr.user_id = ?
            ORDER BY utr.tenant_id, r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find_permission_names_by_user_grouped(
        &self,
        user_id: StringUuid,
    ) -> Result<Vec<TenantPermissionNameRow>> {
        let rows = sqlx::query_as::<_, TenantPermissionNameRow>(
            r#"
            SELECT DISTINCT utp.tenant_id, p.action, p.resource
            FROM users_tenants_permissions utp
            INNER JOIN permissions p ON p.id = utp.permission_id
            WHERE utp.user_id = ?
            ORDER BY utp.tenant_id, p.action, p.resource
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
