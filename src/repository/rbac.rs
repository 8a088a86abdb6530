//! RBAC catalog repository: roles, permissions and their associations

use crate::domain::{
    CreatePermissionInput, CreateRoleInput, Permission, Role, RolePermission, StringUuid,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

const ROLE_COLUMNS: &str = "id, landlord_id, code, name, description, created_at, updated_at";
const PERMISSION_COLUMNS: &str =
    "id, landlord_id, action, resource, default_policy_id, created_at, updated_at";
const ASSOCIATION_COLUMNS: &str = "role_id, permission_id, policy_id, created_at";

/// Bulk eager-fetch result: a set of roles plus every association any of them
/// holds. Two queries total, regardless of how many roles are requested.
#[derive(Debug, Clone, Default)]
pub struct RoleAssociations {
    pub roles: Vec<Role>,
    pub associations: Vec<RolePermission>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RbacRepository: Send + Sync {
    // Roles
    async fn create_role(&self, input: &CreateRoleInput) -> Result<Role>;
    async fn find_role_by_id(&self, id: StringUuid) -> Result<Option<Role>>;
    async fn find_role_by_id_and_landlord(
        &self,
        id: StringUuid,
        landlord_id: StringUuid,
    ) -> Result<Option<Role>>;
    async fn find_role_by_code(
        &self,
        landlord_id: StringUuid,
        code: &str,
    ) -> Result<Option<Role>>;
    async fn find_roles_by_landlord(&self, landlord_id: StringUuid) -> Result<Vec<Role>>;
    async fn find_roles_with_associations(
        &self,
        role_ids: &[StringUuid],
    ) -> Result<RoleAssociations>;

    // Permissions
    async fn create_permission(&self, input: &CreatePermissionInput) -> Result<Permission>;
    async fn find_permission_by_id(&self, id: StringUuid) -> Result<Option<Permission>>;
    async fn find_permission_by_id_and_landlord(
        &self,
        id: StringUuid,
        landlord_id: StringUuid,
    ) -> Result<Option<Permission>>;
    async fn find_permission_by_action_resource(
        &self,
        landlord_id: StringUuid,
        action: &str,
        resource: &str,
    ) -> Result<Option<Permission>>;
    async fn find_permissions_by_landlord(
        &self,
        landlord_id: StringUuid,
    ) -> Result<Vec<Permission>>;
    async fn find_permissions_by_ids(&self, ids: &[StringUuid]) -> Result<Vec<Permission>>;

    // Role-Permission associations
    async fn upsert_association(
        &self,
        role_id: StringUuid,
        permission_id: StringUuid,
        policy_id: Option<StringUuid>,
    ) -> Result<RolePermission>;
    async fn find_association(
        &self,
        landlord_id: StringUuid,
        role_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<Option<RolePermission>>;
    async fn find_association_unscoped(
        &self,
        role_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<Option<RolePermission>>;
    async fn list_role_associations(
        &self,
        landlord_id: StringUuid,
        role_id: StringUuid,
    ) -> Result<Vec<RolePermission>>;
    async fn find_role_permissions(&self, role_id: StringUuid) -> Result<Vec<Permission>>;
    async fn count_role_permissions(&self, role_id: StringUuid) -> Result<i64>;
    async fn delete_association(
        &self,
        role_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<bool>;
}

pub struct RbacRepositoryImpl {
    pool: MySqlPool,
}

impl RbacRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn in_placeholders(count: usize) -> String {
        vec!["?"; count].join(", ")
    }
}

#[async_trait]
impl RbacRepository for RbacRepositoryImpl {
    async fn create_role(&self, input: &CreateRoleInput) -> Result<Role> {
        let id = StringUuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO roles (id, landlord_id, code, name, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(input.landlord_id)
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.description)
        .execute(&self.pool)
        .await?;

        self.find_role_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create role")))
    }

    async fn find_role_by_id(&self, id: StringUuid) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(&format!(
            "SELECT {} FROM roles WHERE id = ?",
            ROLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    async fn find_role_by_id_and_landlord(
        &self,
        id: StringUuid,
        landlord_id: StringUuid,
    ) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(&format!(
            "SELECT {} FROM roles WHERE id = ? AND landlord_id = ?",
            ROLE_COLUMNS
        ))
        .bind(id)
        .bind(landlord_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    async fn find_role_by_code(
        &self,
        landlord_id: StringUuid,
        code: &str,
    ) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(&format!(
            "SELECT {} FROM roles WHERE landlord_id = ? AND code = ?",
            ROLE_COLUMNS
        ))
        .bind(landlord_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    async fn find_roles_by_landlord(&self, landlord_id: StringUuid) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(&format!(
            "SELECT {} FROM roles WHERE landlord_id = ? ORDER BY code",
            ROLE_COLUMNS
        ))
        .bind(landlord_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    async fn find_roles_with_associations(
        &self,
        role_ids: &[StringUuid],
    ) -> Result<RoleAssociations> {
        if role_ids.is_empty() {
            return Ok(RoleAssociations::default());
        }

        let placeholders = Self::in_placeholders(role_ids.len());

        let role_sql = format!(
            "SELECT {} FROM roles WHERE id IN ({})",
            ROLE_COLUMNS, placeholders
        );
        let mut role_query = sqlx::query_as::<_, Role>(&role_sql);
        for id in role_ids {
            role_query = role_query.bind(*id);
        }
        let roles = role_query.fetch_all(&self.pool).await?;

        let assoc_sql = format!(
            "SELECT {} FROM roles_permissions WHERE role_id IN ({})",
            ASSOCIATION_COLUMNS, placeholders
        );
        let mut assoc_query = sqlx::query_as::<_, RolePermission>(&assoc_sql);
        for id in role_ids {
            assoc_query = assoc_query.bind(*id);
        }
        let associations = assoc_query.fetch_all(&self.pool).await?;

        Ok(RoleAssociations {
            roles,
            associations,
        })
    }

    async fn create_permission(&self, input: &CreatePermissionInput) -> Result<Permission> {
        let id = StringUuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO permissions (id, landlord_id, action, resource, default_policy_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(input.landlord_id)
        .bind(&input.action)
        .bind(&input.resource)
        .bind(input.default_policy_id)
        .execute(&self.pool)
        .await?;

        self.find_permission_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create permission")))
    }

    async fn find_permission_by_id(&self, id: StringUuid) -> Result<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {} FROM permissions WHERE id = ?",
            PERMISSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(permission)
    }

    async fn find_permission_by_id_and_landlord(
        &self,
        id: StringUuid,
        landlord_id: StringUuid,
    ) -> Result<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {} FROM permissions WHERE id = ? AND landlord_id = ?",
            PERMISSION_COLUMNS
        ))
        .bind(id)
        .bind(landlord_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(permission)
    }

    async fn find_permission_by_action_resource(
        &self,
        landlord_id: StringUuid,
        action: &str,
        resource: &str,
    ) -> Result<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {} FROM permissions WHERE landlord_id = ? AND action = ? AND resource = ?",
            PERMISSION_COLUMNS
        ))
        .bind(landlord_id)
        .bind(action)
        .bind(resource)
        .fetch_optional(&self.pool)
        .await?;

        Ok(permission)
    }

    async fn find_permissions_by_landlord(
        &self,
        landlord_id: StringUuid,
    ) -> Result<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {} FROM permissions WHERE landlord_id = ? ORDER BY action, resource",
            PERMISSION_COLUMNS
        ))
        .bind(landlord_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    async fn find_permissions_by_ids(&self, ids: &[StringUuid]) -> Result<Vec<Permission>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM permissions WHERE id IN ({})",
            PERMISSION_COLUMNS,
            Self::in_placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, Permission>(&sql);
        for id in ids {
            query = query.bind(*id);
        }

        let permissions = query.fetch_all(&self.pool).await?;
        Ok(permissions)
    }

    async fn upsert_association(
        &self,
        role_id: StringUuid,
        permission_id: StringUuid,
        policy_id: Option<StringUuid>,
    ) -> Result<RolePermission> {
        sqlx::query(
            r#"
            INSERT INTO roles_permissions (role_id, permission_id, policy_id, created_at)
            VALUES (?, ?, ?, NOW())
            ON DUPLICATE KEY UPDATE policy_id = VALUES(policy_id)
            "#,
        )
        .bind(role_id)
        .bind(permission_id)
        .bind(policy_id)
        .execute(&self.pool)
        .await?;

        self.find_association_unscoped(role_id, permission_id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to upsert association")))
    }

    async fn find_association(
        &self,
        landlord_id: StringUuid,
        role_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<Option<RolePermission>> {
        let association = sqlx::query_as::<_, RolePermission>(
            r#"
            SELECT rp.role_id, rp.permission_id, rp.policy_id, rp.created_at
            FROM roles_permissions rp
            INNER JOIN roles r ON r.id = rp.role_id
            INNER JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = ? AND rp.permission_id = ?
              AND r.landlord_id = ? AND p.landlord_id = ?
            "#,
        )
        .bind(role_id)
        .bind(permission_id)
        .bind(landlord_id)
        .bind(landlord_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(association)
    }

    async fn find_association_unscoped(
        &self,
        role_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<Option<RolePermission>> {
        let association = sqlx::query_as::<_, RolePermission>(&format!(
            "SELECT {} FROM roles_permissions WHERE role_id = ? AND permission_id = ?",
            ASSOCIATION_COLUMNS
        ))
        .bind(role_id)
        .bind(permission_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(association)
    }

    async fn list_role_associations(
        &self,
        landlord_id: StringUuid,
        role_id: StringUuid,
    ) -> Result<Vec<RolePermission>> {
        let associations = sqlx::query_as::<_, RolePermission>(
            r#"
            SELECT rp.role_id, rp.permission_id, rp.policy_id, rp.created_at
            FROM roles_permissions rp
            INNER JOIN roles r ON r.id = rp.role_id
            WHERE rp.role_id = ? AND r.landlord_id = ?
            ORDER BY rp.created_at
            "#,
        )
        .bind(role_id)
        .bind(landlord_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(associations)
    }

    async fn find_role_permissions(&self, role_id: StringUuid) -> Result<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.id, p.landlord_id, p.action, p.resource, p.default_policy_id, p.created_at, p.updated_at
            FROM permissions p
            INNER JOIN roles_permissions rp ON p.id = rp.permission_id
            WHERE rp.role_id = ?
            ORDER BY p.action, p.resource
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    async fn count_role_permissions(&self, role_id: StringUuid) -> Result<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM roles_permissions WHERE role_id = ?")
                .bind(role_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    async fn delete_association(
        &self,
        role_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM roles_permissions WHERE role_id = ? AND permission_id = ?")
                .bind(role_id)
                .bind(permission_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
