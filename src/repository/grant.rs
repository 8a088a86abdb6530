//! Grant repository: role assignments and direct permission grants
//!
//! Writes to `users_tenants_roles` and `users_tenants_permissions` go through
//! `INSERT IGNORE` against the natural unique keys, so concurrent duplicate
//! requests settle as "already assigned" instead of erroring.

use crate::domain::{StringUuid, UserTenantPermission, UserTenantRole};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::{MySqlConnection, MySqlPool};

/// What a combined role+permission write actually changed.
#[derive(Debug, Clone, Default)]
pub struct AppliedAssignment {
    pub newly_assigned_role_ids: Vec<StringUuid>,
    pub already_assigned_role_ids: Vec<StringUuid>,
    pub newly_granted_permission_ids: Vec<StringUuid>,
    pub already_granted_permission_ids: Vec<StringUuid>,
}

/// What a bulk permission grant actually changed.
#[derive(Debug, Clone, Default)]
pub struct AppliedGrants {
    pub newly_granted_permission_ids: Vec<StringUuid>,
    pub already_granted_permission_ids: Vec<StringUuid>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Insert role assignments and permission grants in one transaction.
    async fn apply_assignment(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        role_ids: &[StringUuid],
        permission_ids: &[StringUuid],
    ) -> Result<AppliedAssignment>;

    /// Insert permission grants in one transaction.
    async fn grant_permissions(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        permission_ids: &[StringUuid],
    ) -> Result<AppliedGrants>;

    async fn find_grant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<Option<UserTenantPermission>>;
    async fn find_role_assignment(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        role_id: StringUuid,
    ) -> Result<Option<UserTenantRole>>;
    async fn remove_role_assignment(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        role_id: StringUuid,
    ) -> Result<bool>;
    async fn remove_grant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<bool>;
    async fn remove_grants(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        permission_ids: &[StringUuid],
    ) -> Result<u64>;
    async fn delete_all_grants_for_user_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<u64>;

    async fn find_permissions_by_user_and_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<Vec<UserTenantPermission>>;
    async fn find_permissions_by_user(
        &self,
        user_id: StringUuid,
    ) -> Result<Vec<UserTenantPermission>>;
    async fn count_grants_by_user_and_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<i64>;
}

pub struct GrantRepositoryImpl {
    pool: MySqlPool,
}

impl GrantRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn insert_role_rows(
        conn: &mut MySqlConnection,
        user_id: StringUuid,
        tenant_id: StringUuid,
        role_ids: &[StringUuid],
    ) -> Result<(Vec<StringUuid>, Vec<StringUuid>)> {
        let mut newly = Vec::new();
        let mut already = Vec::new();

        for role_id in role_ids {
            let id = StringUuid::new_v4();
            let result = sqlx::query(
                r#"
                INSERT IGNORE INTO users_tenants_roles (id, user_id, tenant_id, role_id, granted_at)
                VALUES (?, ?, ?, ?, NOW())
                "#,
            )
            .bind(id)
            .bind(user_id)
            .bind(tenant_id)
            .bind(*role_id)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() > 0 {
                newly.push(*role_id);
            } else {
                already.push(*role_id);
            }
        }

        Ok((newly, already))
    }

    async fn insert_permission_rows(
        conn: &mut MySqlConnection,
        user_id: StringUuid,
        tenant_id: StringUuid,
        permission_ids: &[StringUuid],
    ) -> Result<(Vec<StringUuid>, Vec<StringUuid>)> {
        let mut newly = Vec::new();
        let mut already = Vec::new();

        for permission_id in permission_ids {
            let id = StringUuid::new_v4();
            let result = sqlx::query(
                r#"
                INSERT IGNORE INTO users_tenants_permissions (id, user_id, tenant_id, permission_id, granted_at)
                VALUES (?, ?, ?, ?, NOW())
                "#,
            )
            .bind(id)
            .bind(user_id)
            .bind(tenant_id)
            .bind(*permission_id)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() > 0 {
                newly.push(*permission_id);
            } else {
                already.push(*permission_id);
            }
        }

        Ok((newly, already))
    }
}

#[async_trait]
impl GrantRepository for GrantRepositoryImpl {
    async fn apply_assignment(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        role_ids: &[StringUuid],
        permission_ids: &[StringUuid],
    ) -> Result<AppliedAssignment> {
        let mut tx = self.pool.begin().await?;

        let (newly_assigned_role_ids, already_assigned_role_ids) =
            Self::insert_role_rows(&mut *tx, user_id, tenant_id, role_ids).await?;
        let (newly_granted_permission_ids, already_granted_permission_ids) =
            Self::insert_permission_rows(&mut *tx, user_id, tenant_id, permission_ids).await?;

        tx.commit().await?;

        Ok(AppliedAssignment {
            newly_assigned_role_ids,
            already_assigned_role_ids,
            newly_granted_permission_ids,
            already_granted_permission_ids,
        })
    }

    async fn grant_permissions(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        permission_ids: &[StringUuid],
    ) -> Result<AppliedGrants> {
        let mut tx = self.pool.begin().await?;

        let (newly_granted_permission_ids, already_granted_permission_ids) =
            Self::insert_permission_rows(&mut *tx, user_id, tenant_id, permission_ids).await?;

        tx.commit().await?;

        Ok(AppliedGrants {
            newly_granted_permission_ids,
            already_granted_permission_ids,
        })
    }

    async fn find_grant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<Option<UserTenantPermission>> {
        let grant = sqlx::query_as::<_, UserTenantPermission>(
            r#"
            SELECT id, user_id, tenant_id, permission_id, granted_at
            FROM users_tenants_permissions
            WHERE user_id = ? AND tenant_id = ? AND permission_id = ?
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(permission_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(grant)
    }

    async fn find_role_assignment(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        role_id: StringUuid,
    ) -> Result<Option<UserTenantRole>> {
        let assignment = sqlx::query_as::<_, UserTenantRole>(
            r#"
            SELECT id, user_id, tenant_id, role_id, granted_at
            FROM users_tenants_roles
            WHERE user_id = ? AND tenant_id = ? AND role_id = ?
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(assignment)
    }

    async fn remove_role_assignment(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        role_id: StringUuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM users_tenants_roles WHERE user_id = ? AND tenant_id = ? AND role_id = ?",
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(role_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_grant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM users_tenants_permissions WHERE user_id = ? AND tenant_id = ? AND permission_id = ?",
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(permission_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_grants(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        permission_ids: &[StringUuid],
    ) -> Result<u64> {
        if permission_ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; permission_ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM users_tenants_permissions WHERE user_id = ? AND tenant_id = ? AND permission_id IN ({})",
            placeholders
        );
        let mut query = sqlx::query(&sql).bind(user_id).bind(tenant_id);
        for id in permission_ids {
            query = query.bind(*id);
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_all_grants_for_user_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM users_tenants_permissions WHERE user_id = ? AND tenant_id = ?",
        )
        .bind(user_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_permissions_by_user_and_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<Vec<UserTenantPermission>> {
        let grants = sqlx::query_as::<_, UserTenantPermission>(
            r#"
            SELECT id, user_id, tenant_id, permission_id, granted_at
            FROM users_tenants_permissions
            WHERE user_id = ? AND tenant_id = ?
            ORDER BY granted_at
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(grants)
    }

    async fn find_permissions_by_user(
        &self,
        user_id: StringUuid,
    ) -> Result<Vec<UserTenantPermission>> {
        let grants = sqlx::query_as::<_, UserTenantPermission>(
            r#"
            SELECT id, user_id, tenant_id, permission_id, granted_at
            FROM users_tenants_permissions
            WHERE user_id = ?
            ORDER BY granted_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(grants)
    }

    async fn count_grants_by_user_and_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users_tenants_permissions WHERE user_id = ? AND tenant_id = ?",
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }
}
