//! Direct permission grant service
//!
//! Manages `users_tenants_permissions` independent of roles: manual grants and
//! the removal/query surface. Grants are idempotent on the
//! `(user, tenant, permission)` triple; a permission can only be granted in a
//! tenant of its own landlord.

use crate::domain::{
    Permission, PermissionGrantOutcome, PermissionSummary, StringUuid, Tenant, User,
    UserTenantPermission,
};
use crate::error::{AppError, Result};
use crate::repository::{GrantRepository, RbacRepository, TenantRepository, UserRepository};
use std::sync::Arc;
use tracing::info;

pub struct PermissionGrantService<
    U: UserRepository,
    T: TenantRepository,
    R: RbacRepository,
    G: GrantRepository,
> {
    user_repo: Arc<U>,
    tenant_repo: Arc<T>,
    rbac_repo: Arc<R>,
    grant_repo: Arc<G>,
}

impl<U: UserRepository, T: TenantRepository, R: RbacRepository, G: GrantRepository>
    PermissionGrantService<U, T, R, G>
{
    pub fn new(
        user_repo: Arc<U>,
        tenant_repo: Arc<T>,
        rbac_repo: Arc<R>,
        grant_repo: Arc<G>,
    ) -> Self {
        Self {
            user_repo,
            tenant_repo,
            rbac_repo,
            grant_repo,
        }
    }

    /// Grant a single permission to a user in a tenant. Returns the existing
    /// grant unchanged when the triple is already present.
    pub async fn create_user_tenant_permission(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<UserTenantPermission> {
        let (user, tenant) = self.get_user_and_tenant(user_id, tenant_id).await?;
        let permission = self.get_permission(permission_id).await?;
        Self::ensure_same_landlord(&tenant, &permission)?;

        if let Some(existing) = self
            .grant_repo
            .find_grant(user.id, tenant.id, permission.id)
            .await?
        {
            return Ok(existing);
        }

        self.grant_repo
            .grant_permissions(user.id, tenant.id, &[permission.id])
            .await?;

        info!(
            user_id = %user.id,
            tenant_id = %tenant.id,
            permission_id = %permission.id,
            "Granted permission"
        );

        self.grant_repo
            .find_grant(user.id, tenant.id, permission.id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("Failed to create permission grant"))
            })
    }

    /// Bulk grant. Every requested permission must exist and belong to the
    /// tenant's landlord; existing triples are reported, not re-created.
    pub async fn assign_permissions(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        permission_ids: &[StringUuid],
    ) -> Result<PermissionGrantOutcome> {
        let (user, tenant) = self.get_user_and_tenant(user_id, tenant_id).await?;

        let requested = dedup_ids(permission_ids);
        let permissions = self.rbac_repo.find_permissions_by_ids(&requested).await?;
        for &permission_id in &requested {
            let permission = permissions
                .iter()
                .find(|p| p.id == permission_id)
                .ok_or_else(|| {
                    AppError::NotFound(format!("Permission {} not found", permission_id))
                })?;
            Self::ensure_same_landlord(&tenant, permission)?;
        }

        let applied = self
            .grant_repo
            .grant_permissions(user.id, tenant.id, &requested)
            .await?;

        info!(
            user_id = %user.id,
            tenant_id = %tenant.id,
            newly_granted = applied.newly_granted_permission_ids.len(),
            already_granted = applied.already_granted_permission_ids.len(),
            "Applied permission grants"
        );

        Ok(PermissionGrantOutcome {
            requested_permission_ids: requested,
            newly_granted_permission_ids: applied.newly_granted_permission_ids,
            already_granted_permission_ids: applied.already_granted_permission_ids,
        })
    }

    /// Remove one grant. Returns false when nothing was removed.
    pub async fn remove_user_tenant_permission(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<bool> {
        let removed = self
            .grant_repo
            .remove_grant(user_id, tenant_id, permission_id)
            .await?;

        if removed {
            info!(
                user_id = %user_id,
                tenant_id = %tenant_id,
                permission_id = %permission_id,
                "Removed permission grant"
            );
        }

        Ok(removed)
    }

    /// Remove several grants at once. Returns how many rows were removed.
    pub async fn remove_permissions(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        permission_ids: &[StringUuid],
    ) -> Result<u64> {
        self.grant_repo
            .remove_grants(user_id, tenant_id, &dedup_ids(permission_ids))
            .await
    }

    /// Remove every grant the user holds in the tenant.
    pub async fn delete_all_permissions_by_user_and_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<u64> {
        let removed = self
            .grant_repo
            .delete_all_grants_for_user_tenant(user_id, tenant_id)
            .await?;

        if removed > 0 {
            info!(
                user_id = %user_id,
                tenant_id = %tenant_id,
                removed,
                "Removed all permission grants for user in tenant"
            );
        }

        Ok(removed)
    }

    pub async fn list_user_tenant_permissions(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<Vec<UserTenantPermission>> {
        self.grant_repo
            .find_permissions_by_user_and_tenant(user_id, tenant_id)
            .await
    }

    pub async fn list_user_permissions(
        &self,
        user_id: StringUuid,
    ) -> Result<Vec<UserTenantPermission>> {
        self.grant_repo.find_permissions_by_user(user_id).await
    }

    /// Detail projection (id, action, resource) of the user's grants in a
    /// tenant, in grant order.
    pub async fn list_permission_details(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<Vec<PermissionSummary>> {
        let grants = self
            .grant_repo
            .find_permissions_by_user_and_tenant(user_id, tenant_id)
            .await?;
        let granted_ids: Vec<StringUuid> = grants.iter().map(|g| g.permission_id).collect();

        let permissions = self.rbac_repo.find_permissions_by_ids(&granted_ids).await?;

        Ok(granted_ids
            .iter()
            .filter_map(|id| permissions.iter().find(|p| p.id == *id))
            .map(|p| PermissionSummary {
                id: p.id,
                action: p.action.clone(),
                resource: p.resource.clone(),
            })
            .collect())
    }

    pub async fn count_user_tenant_permissions(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<i64> {
        self.grant_repo
            .count_grants_by_user_and_tenant(user_id, tenant_id)
            .await
    }

    // ==================== Internal ====================

    async fn get_user_and_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<(User, Tenant)> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        let tenant = self
            .tenant_repo
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tenant {} not found", tenant_id)))?;
        Ok((user, tenant))
    }

    async fn get_permission(&self, permission_id: StringUuid) -> Result<Permission> {
        self.rbac_repo
            .find_permission_by_id(permission_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Permission {} not found", permission_id)))
    }

    fn ensure_same_landlord(tenant: &Tenant, permission: &Permission) -> Result<()> {
        if tenant.landlord_id != permission.landlord_id {
            return Err(AppError::Validation(format!(
                "Permission {} belongs to landlord {} and cannot be granted in tenant {} of landlord {}",
                permission.id, permission.landlord_id, tenant.id, tenant.landlord_id
            )));
        }
        Ok(())
    }
}

/// Drop duplicate ids while preserving first-seen order.
fn dedup_ids(ids: &[StringUuid]) -> Vec<StringUuid> {
    let mut unique = Vec::with_capacity(ids.len());
    for &id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}
