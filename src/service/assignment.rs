//! Role assignment engine
//!
//! Attaches roles to a user within a tenant and materializes every permission
//! reachable through those roles as a direct grant, so permission checks never
//! join through roles at request time. Role associations are loaded in one
//! eager fetch, and all writes for a call happen in one transaction.

use crate::domain::{
    AssignAccessInput, AssignRolesInput, AssignmentResult, StringUuid,
};
use crate::error::{AppError, Result};
use crate::repository::{GrantRepository, RbacRepository, TenantRepository, UserRepository};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

pub struct RoleAssignmentService<
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
    RoleAssignmentService<U, T, R, G>
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

    /// Assign roles to a user in a tenant and propagate their permissions.
    pub async fn assign_roles(&self, input: AssignRolesInput) -> Result<AssignmentResult> {
        input.validate()?;

        self.assign_access(AssignAccessInput {
            user_id: input.user_id,
            tenant_id: input.tenant_id,
            role_ids: input.role_ids,
            permission_ids: Vec::new(),
        })
        .await
    }

    /// Assign roles and explicitly requested permissions in one call.
    ///
    /// Steps: load user and tenant, eager-load the requested roles with their
    /// permission associations, reject any role or permission outside the
    /// tenant's landlord, then insert role rows and permission grants in a
    /// single transaction. Rows that already existed are reported as "already
    /// assigned"; role-derived grants created by this call are additionally
    /// reported as propagated.
    pub async fn assign_access(&self, input: AssignAccessInput) -> Result<AssignmentResult> {
        input.validate()?;

        let user = self
            .user_repo
            .find_by_id(input.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", input.user_id)))?;
        let tenant = self
            .tenant_repo
            .find_by_id(input.tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tenant {} not found", input.tenant_id)))?;

        let role_ids = dedup_ids(&input.role_ids);
        let requested_permission_ids = dedup_ids(&input.permission_ids);

        // One fetch for the roles and all their associations; propagation
        // below never goes back to the database per association.
        let graph = self.rbac_repo.find_roles_with_associations(&role_ids).await?;

        for &role_id in &role_ids {
            let role = graph
                .roles
                .iter()
                .find(|r| r.id == role_id)
                .ok_or_else(|| AppError::NotFound(format!("Role {} not found", role_id)))?;

            if role.landlord_id != tenant.landlord_id {
                return Err(AppError::Validation(format!(
                    "Role {} belongs to landlord {} and cannot be assigned in tenant {} of landlord {}",
                    role.id, role.landlord_id, tenant.id, tenant.landlord_id
                )));
            }
        }

        // Explicitly requested permissions pass through the same landlord gate.
        let direct_permissions = self
            .rbac_repo
            .find_permissions_by_ids(&requested_permission_ids)
            .await?;
        for &permission_id in &requested_permission_ids {
            let permission = direct_permissions
                .iter()
                .find(|p| p.id == permission_id)
                .ok_or_else(|| {
                    AppError::NotFound(format!("Permission {} not found", permission_id))
                })?;

            if permission.landlord_id != tenant.landlord_id {
                return Err(AppError::Validation(format!(
                    "Permission {} belongs to landlord {} and cannot be granted in tenant {} of landlord {}",
                    permission.id, permission.landlord_id, tenant.id, tenant.landlord_id
                )));
            }
        }

        let propagation_targets: Vec<StringUuid> =
            dedup_ids(&graph.associations.iter().map(|a| a.permission_id).collect::<Vec<_>>());

        let mut all_permission_ids = requested_permission_ids.clone();
        for &id in &propagation_targets {
            if !all_permission_ids.contains(&id) {
                all_permission_ids.push(id);
            }
        }

        let applied = self
            .grant_repo
            .apply_assignment(user.id, tenant.id, &role_ids, &all_permission_ids)
            .await?;

        // Propagated = the role-derived subset of what this call created.
        let propagated_permission_ids: Vec<StringUuid> = applied
            .newly_granted_permission_ids
            .iter()
            .copied()
            .filter(|id| propagation_targets.contains(id))
            .collect();

        info!(
            user_id = %user.id,
            tenant_id = %tenant.id,
            newly_assigned_roles = applied.newly_assigned_role_ids.len(),
            already_assigned_roles = applied.already_assigned_role_ids.len(),
            propagated_permissions = propagated_permission_ids.len(),
            "Applied role assignment"
        );

        Ok(AssignmentResult {
            requested_role_ids: role_ids,
            newly_assigned_role_ids: applied.newly_assigned_role_ids,
            already_assigned_role_ids: applied.already_assigned_role_ids,
            requested_permission_ids,
            newly_assigned_permission_ids: applied.newly_granted_permission_ids,
            already_assigned_permission_ids: applied.already_granted_permission_ids,
            propagated_permission_ids,
        })
    }

    /// Remove a role assignment. Returns false when no assignment existed.
    /// Grants propagated by an earlier assignment are left in place; they are
    /// direct grants once created and are managed through the grant service.
    pub async fn remove_role(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        role_id: StringUuid,
    ) -> Result<bool> {
        let removed = self
            .grant_repo
            .remove_role_assignment(user_id, tenant_id, role_id)
            .await?;

        if removed {
            info!(
                user_id = %user_id,
                tenant_id = %tenant_id,
                role_id = %role_id,
                "Removed role assignment"
            );
        }

        Ok(removed)
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
