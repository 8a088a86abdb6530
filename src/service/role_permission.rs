//! Role-Permission association business logic
//!
//! Manages the role↔permission graph inside a landlord boundary, including the
//! per-association policy override. Every cross-landlord reference is rejected
//! as a validation failure; associations are idempotent in effect (re-attach
//! updates the policy in place).

use crate::domain::{
    CreatePermissionInput, CreatePolicyInput, CreateRoleInput, Permission, Policy, Role,
    RolePermission, StringUuid,
};
use crate::error::{AppError, Result};
use crate::repository::{PolicyRepository, RbacRepository, TenantRepository};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

pub struct RolePermissionService<R: RbacRepository, P: PolicyRepository, T: TenantRepository> {
    rbac_repo: Arc<R>,
    policy_repo: Arc<P>,
    tenant_repo: Arc<T>,
}

impl<R: RbacRepository, P: PolicyRepository, T: TenantRepository> RolePermissionService<R, P, T> {
    pub fn new(rbac_repo: Arc<R>, policy_repo: Arc<P>, tenant_repo: Arc<T>) -> Self {
        Self {
            rbac_repo,
            policy_repo,
            tenant_repo,
        }
    }

    // ==================== Catalog ====================

    pub async fn create_role(&self, input: CreateRoleInput) -> Result<Role> {
        input.validate()?;

        if self
            .rbac_repo
            .find_role_by_code(input.landlord_id, &input.code)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Role with code {} already exists for landlord {}",
                input.code, input.landlord_id
            )));
        }

        self.rbac_repo.create_role(&input).await
    }

    pub async fn create_permission(&self, input: CreatePermissionInput) -> Result<Permission> {
        input.validate()?;

        if self
            .rbac_repo
            .find_permission_by_action_resource(input.landlord_id, &input.action, &input.resource)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Permission {}:{} already exists for landlord {}",
                input.action, input.resource, input.landlord_id
            )));
        }

        if let Some(policy_id) = input.default_policy_id {
            let policy = self.get_policy(policy_id).await?;
            self.ensure_policy_landlord(&policy, input.landlord_id)
                .await?;
        }

        self.rbac_repo.create_permission(&input).await
    }

    pub async fn create_policy(&self, input: CreatePolicyInput) -> Result<Policy> {
        input.validate()?;

        if self
            .policy_repo
            .find_by_code(&input.code)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Policy with code {} already exists",
                input.code
            )));
        }

        self.policy_repo.create(&input).await
    }

    pub async fn get_role(&self, id: StringUuid) -> Result<Role> {
        self.rbac_repo
            .find_role_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Role {} not found", id)))
    }

    pub async fn get_permission(&self, id: StringUuid) -> Result<Permission> {
        self.rbac_repo
            .find_permission_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Permission {} not found", id)))
    }

    pub async fn get_policy(&self, id: StringUuid) -> Result<Policy> {
        self.policy_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Policy {} not found", id)))
    }

    pub async fn list_roles(&self, landlord_id: StringUuid) -> Result<Vec<Role>> {
        self.rbac_repo.find_roles_by_landlord(landlord_id).await
    }

    pub async fn list_permissions(&self, landlord_id: StringUuid) -> Result<Vec<Permission>> {
        self.rbac_repo
            .find_permissions_by_landlord(landlord_id)
            .await
    }

    // ==================== Associations ====================

    /// Attach a permission to a role, resolving the association's policy:
    /// an explicit `policy_id` wins; otherwise the permission's default policy
    /// when `inherit_default_policy` is set; otherwise no policy. Re-attaching
    /// an existing pair updates its policy in place.
    pub async fn attach_permission(
        &self,
        landlord_id: StringUuid,
        role_id: StringUuid,
        permission_id: StringUuid,
        policy_id: Option<StringUuid>,
        inherit_default_policy: bool,
    ) -> Result<RolePermission> {
        let (_, permission) = self
            .resolve_owned_pair(landlord_id, role_id, permission_id)
            .await?;

        let resolved_policy_id = self
            .resolve_policy_id(landlord_id, policy_id, inherit_default_policy, &permission)
            .await?;

        let association = self
            .rbac_repo
            .upsert_association(role_id, permission_id, resolved_policy_id)
            .await?;

        info!(
            role_id = %role_id,
            permission_id = %permission_id,
            policy_id = ?resolved_policy_id,
            "Attached permission to role"
        );

        Ok(association)
    }

    /// Update the policy of an existing association. Unlike `attach_permission`
    /// this requires the association to already exist.
    pub async fn update_permission_policy(
        &self,
        landlord_id: StringUuid,
        role_id: StringUuid,
        permission_id: StringUuid,
        policy_id: Option<StringUuid>,
        inherit_default_policy: bool,
    ) -> Result<RolePermission> {
        let (_, permission) = self
            .resolve_owned_pair(landlord_id, role_id, permission_id)
            .await?;

        if self
            .rbac_repo
            .find_association(landlord_id, role_id, permission_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!(
                "Association between role {} and permission {} not found",
                role_id, permission_id
            )));
        }

        let resolved_policy_id = self
            .resolve_policy_id(landlord_id, policy_id, inherit_default_policy, &permission)
            .await?;

        self.rbac_repo
            .upsert_association(role_id, permission_id, resolved_policy_id)
            .await
    }

    /// Detach a permission from a role. Returns false when no association
    /// existed (idempotent no-op).
    pub async fn detach_permission(
        &self,
        landlord_id: StringUuid,
        role_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<bool> {
        self.resolve_owned_pair(landlord_id, role_id, permission_id)
            .await?;

        if self
            .rbac_repo
            .find_association(landlord_id, role_id, permission_id)
            .await?
            .is_none()
        {
            return Ok(false);
        }

        let removed = self
            .rbac_repo
            .delete_association(role_id, permission_id)
            .await?;

        if removed {
            info!(
                role_id = %role_id,
                permission_id = %permission_id,
                "Detached permission from role"
            );
        }

        Ok(removed)
    }

    /// Landlord-filtered association lookup: an association belonging to a
    /// different landlord than claimed is never observable through this call.
    pub async fn find_association(
        &self,
        landlord_id: StringUuid,
        role_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<Option<RolePermission>> {
        self.rbac_repo
            .find_association(landlord_id, role_id, permission_id)
            .await
    }

    pub async fn list_role_permissions(
        &self,
        landlord_id: StringUuid,
        role_id: StringUuid,
    ) -> Result<Vec<RolePermission>> {
        self.rbac_repo
            .list_role_associations(landlord_id, role_id)
            .await
    }

    pub async fn count_role_permissions(&self, role_id: StringUuid) -> Result<i64> {
        self.rbac_repo.count_role_permissions(role_id).await
    }

    // ==================== Internal ====================

    /// Resolve role and permission, requiring both to belong to `landlord_id`.
    async fn resolve_owned_pair(
        &self,
        landlord_id: StringUuid,
        role_id: StringUuid,
        permission_id: StringUuid,
    ) -> Result<(Role, Permission)> {
        if landlord_id.is_nil() {
            return Err(AppError::Validation("landlordId is required".to_string()));
        }

        let role = self
            .rbac_repo
            .find_role_by_id_and_landlord(role_id, landlord_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Role {} not found for landlord {}",
                    role_id, landlord_id
                ))
            })?;

        let permission = self
            .rbac_repo
            .find_permission_by_id_and_landlord(permission_id, landlord_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Permission {} not found for landlord {}",
                    permission_id, landlord_id
                ))
            })?;

        Ok((role, permission))
    }

    async fn resolve_policy_id(
        &self,
        landlord_id: StringUuid,
        policy_id: Option<StringUuid>,
        inherit_default_policy: bool,
        permission: &Permission,
    ) -> Result<Option<StringUuid>> {
        match policy_id {
            Some(id) => {
                let policy = self.get_policy(id).await?;
                self.ensure_policy_landlord(&policy, landlord_id).await?;
                Ok(Some(policy.id))
            }
            None if inherit_default_policy => Ok(permission.default_policy_id),
            None => Ok(None),
        }
    }

    /// A tenant-scoped policy derives its effective landlord through the
    /// tenant; a global policy (no tenant) is valid for any landlord.
    async fn ensure_policy_landlord(
        &self,
        policy: &Policy,
        landlord_id: StringUuid,
    ) -> Result<()> {
        let Some(tenant_id) = policy.tenant_id else {
            return Ok(());
        };

        let tenant = self
            .tenant_repo
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tenant {} not found", tenant_id)))?;

        if tenant.landlord_id != landlord_id {
            return Err(AppError::Validation(format!(
                "Policy {} belongs to landlord {} and cannot be used for landlord {}",
                policy.id, tenant.landlord_id, landlord_id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Tenant;
    use crate::repository::policy::MockPolicyRepository;
    use crate::repository::rbac::MockRbacRepository;
    use crate::repository::tenant::MockTenantRepository;
    use chrono::Utc;
    use mockall::predicate::*;

    fn service(
        rbac: MockRbacRepository,
        policy: MockPolicyRepository,
        tenant: MockTenantRepository,
    ) -> RolePermissionService<MockRbacRepository, MockPolicyRepository, MockTenantRepository>
    {
        RolePermissionService::new(Arc::new(rbac), Arc::new(policy), Arc::new(tenant))
    }

    fn owned_role(landlord_id: StringUuid) -> Role {
        Role {
            landlord_id,
            code: "SENSEI".to_string(),
            name: "Sensei".to_string(),
            ..Default::default()
        }
    }

    fn owned_permission(landlord_id: StringUuid) -> Permission {
        Permission {
            landlord_id,
            action: "manage".to_string(),
            resource: "students".to_string(),
            ..Default::default()
        }
    }

    fn association(role_id: StringUuid, permission_id: StringUuid) -> RolePermission {
        RolePermission {
            role_id,
            permission_id,
            policy_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_attach_permission_without_policy() {
        let landlord_id = StringUuid::new_v4();
        let role = owned_role(landlord_id);
        let permission = owned_permission(landlord_id);
        let (role_id, permission_id) = (role.id, permission.id);

        let mut rbac = MockRbacRepository::new();
        rbac.expect_find_role_by_id_and_landlord()
            .with(eq(role_id), eq(landlord_id))
            .returning(move |_, _| Ok(Some(role.clone())));
        rbac.expect_find_permission_by_id_and_landlord()
            .with(eq(permission_id), eq(landlord_id))
            .returning(move |_, _| Ok(Some(permission.clone())));
        rbac.expect_upsert_association()
            .with(eq(role_id), eq(permission_id), eq(None))
            .returning(|r, p, _| Ok(association(r, p)));

        let svc = service(rbac, MockPolicyRepository::new(), MockTenantRepository::new());

        let result = svc
            .attach_permission(landlord_id, role_id, permission_id, None, false)
            .await
            .unwrap();
        assert_eq!(result.role_id, role_id);
        assert!(result.policy_id.is_none());
    }

    #[tokio::test]
    async fn test_attach_permission_inherits_default_policy() {
        let landlord_id = StringUuid::new_v4();
        let default_policy_id = StringUuid::new_v4();
        let role = owned_role(landlord_id);
        let permission = Permission {
            default_policy_id: Some(default_policy_id),
            ..owned_permission(landlord_id)
        };
        let (role_id, permission_id) = (role.id, permission.id);

        let mut rbac = MockRbacRepository::new();
        rbac.expect_find_role_by_id_and_landlord()
            .returning(move |_, _| Ok(Some(role.clone())));
        rbac.expect_find_permission_by_id_and_landlord()
            .returning(move |_, _| Ok(Some(permission.clone())));
        rbac.expect_upsert_association()
            .with(eq(role_id), eq(permission_id), eq(Some(default_policy_id)))
            .returning(move |r, p, policy| {
                Ok(RolePermission {
                    policy_id: policy,
                    ..association(r, p)
                })
            });

        let svc = service(rbac, MockPolicyRepository::new(), MockTenantRepository::new());

        let result = svc
            .attach_permission(landlord_id, role_id, permission_id, None, true)
            .await
            .unwrap();
        assert_eq!(result.policy_id, Some(default_policy_id));
    }

    #[tokio::test]
    async fn test_attach_permission_rejects_cross_landlord_policy() {
        let landlord_id = StringUuid::new_v4();
        let other_landlord_id = StringUuid::new_v4();
        let role = owned_role(landlord_id);
        let permission = owned_permission(landlord_id);
        let (role_id, permission_id) = (role.id, permission.id);

        let tenant = Tenant {
            landlord_id: other_landlord_id,
            ..Default::default()
        };
        let policy = Policy {
            tenant_id: Some(tenant.id),
            ..Default::default()
        };
        let policy_id = policy.id;

        let mut rbac = MockRbacRepository::new();
        rbac.expect_find_role_by_id_and_landlord()
            .returning(move |_, _| Ok(Some(role.clone())));
        rbac.expect_find_permission_by_id_and_landlord()
            .returning(move |_, _| Ok(Some(permission.clone())));

        let mut policy_repo = MockPolicyRepository::new();
        policy_repo
            .expect_find_by_id()
            .with(eq(policy_id))
            .returning(move |_| Ok(Some(policy.clone())));

        let mut tenant_repo = MockTenantRepository::new();
        let tenant_id = tenant.id;
        tenant_repo
            .expect_find_by_id()
            .with(eq(tenant_id))
            .returning(move |_| Ok(Some(tenant.clone())));

        let svc = service(rbac, policy_repo, tenant_repo);

        let result = svc
            .attach_permission(landlord_id, role_id, permission_id, Some(policy_id), false)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_attach_permission_role_not_found_names_both_ids() {
        let landlord_id = StringUuid::new_v4();
        let role_id = StringUuid::new_v4();
        let permission_id = StringUuid::new_v4();

        let mut rbac = MockRbacRepository::new();
        rbac.expect_find_role_by_id_and_landlord()
            .returning(|_, _| Ok(None));

        let svc = service(rbac, MockPolicyRepository::new(), MockTenantRepository::new());

        let err = svc
            .attach_permission(landlord_id, role_id, permission_id, None, false)
            .await
            .unwrap_err();
        match err {
            AppError::NotFound(msg) => {
                assert!(msg.contains(&role_id.to_string()));
                assert!(msg.contains(&landlord_id.to_string()));
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_attach_permission_nil_landlord_is_validation_error() {
        let svc = service(
            MockRbacRepository::new(),
            MockPolicyRepository::new(),
            MockTenantRepository::new(),
        );

        let result = svc
            .attach_permission(
                StringUuid::nil(),
                StringUuid::new_v4(),
                StringUuid::new_v4(),
                None,
                false,
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_permission_policy_requires_existing_association() {
        let landlord_id = StringUuid::new_v4();
        let role = owned_role(landlord_id);
        let permission = owned_permission(landlord_id);
        let (role_id, permission_id) = (role.id, permission.id);

        let mut rbac = MockRbacRepository::new();
        rbac.expect_find_role_by_id_and_landlord()
            .returning(move |_, _| Ok(Some(role.clone())));
        rbac.expect_find_permission_by_id_and_landlord()
            .returning(move |_, _| Ok(Some(permission.clone())));
        rbac.expect_find_association().returning(|_, _, _| Ok(None));

        let svc = service(rbac, MockPolicyRepository::new(), MockTenantRepository::new());

        let result = svc
            .update_permission_policy(landlord_id, role_id, permission_id, None, false)
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_detach_permission_missing_association_is_noop() {
        let landlord_id = StringUuid::new_v4();
        let role = owned_role(landlord_id);
        let permission = owned_permission(landlord_id);
        let (role_id, permission_id) = (role.id, permission.id);

        let mut rbac = MockRbacRepository::new();
        rbac.expect_find_role_by_id_and_landlord()
            .returning(move |_, _| Ok(Some(role.clone())));
        rbac.expect_find_permission_by_id_and_landlord()
            .returning(move |_, _| Ok(Some(permission.clone())));
        rbac.expect_find_association().returning(|_, _, _| Ok(None));
        rbac.expect_delete_association().never();

        let svc = service(rbac, MockPolicyRepository::new(), MockTenantRepository::new());

        let removed = svc
            .detach_permission(landlord_id, role_id, permission_id)
            .await
            .unwrap();
        assert!(!removed);
    }

    #[tokio::test]
    async fn test_detach_permission_removes_existing_association() {
        let landlord_id = StringUuid::new_v4();
        let role = owned_role(landlord_id);
        let permission = owned_permission(landlord_id);
        let (role_id, permission_id) = (role.id, permission.id);

        let mut rbac = MockRbacRepository::new();
        rbac.expect_find_role_by_id_and_landlord()
            .returning(move |_, _| Ok(Some(role.clone())));
        rbac.expect_find_permission_by_id_and_landlord()
            .returning(move |_, _| Ok(Some(permission.clone())));
        rbac.expect_find_association()
            .returning(|_, r, p| Ok(Some(association(r, p))));
        rbac.expect_delete_association()
            .with(eq(role_id), eq(permission_id))
            .returning(|_, _| Ok(true));

        let svc = service(rbac, MockPolicyRepository::new(), MockTenantRepository::new());

        let removed = svc
            .detach_permission(landlord_id, role_id, permission_id)
            .await
            .unwrap();
        assert!(removed);
    }

    #[tokio::test]
    async fn test_create_role_duplicate_code_conflicts() {
        let landlord_id = StringUuid::new_v4();

        let mut rbac = MockRbacRepository::new();
        rbac.expect_find_role_by_code()
            .with(eq(landlord_id), eq("ADMIN"))
            .returning(move |_, _| {
                Ok(Some(Role {
                    landlord_id,
                    code: "ADMIN".to_string(),
                    ..Default::default()
                }))
            });

        let svc = service(rbac, MockPolicyRepository::new(), MockTenantRepository::new());

        let result = svc
            .create_role(CreateRoleInput {
                landlord_id,
                code: "ADMIN".to_string(),
                name: "Administrator".to_string(),
                description: None,
            })
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
