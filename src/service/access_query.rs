//! Read-side access queries
//!
//! Flattened views over role assignments and permission grants, consumed by
//! token issuance and profile endpoints. All boolean checks go through the
//! same listing queries, so there is exactly one predicate per question.

use crate::domain::{StringUuid, TenantAccess, TenantRoleAccess};
use crate::error::Result;
use crate::repository::AccessRepository;
use std::sync::Arc;

pub struct AccessQueryService<A: AccessRepository> {
    access_repo: Arc<A>,
}

impl<A: AccessRepository> AccessQueryService<A> {
    pub fn new(access_repo: Arc<A>) -> Self {
        Self { access_repo }
    }

    /// Distinct role names the user holds across all tenants.
    pub async fn get_user_roles(&self, user_id: StringUuid) -> Result<Vec<String>> {
        self.access_repo.find_role_names_by_user(user_id).await
    }

    /// Distinct role names the user holds in one tenant.
    pub async fn get_user_roles_in_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<Vec<String>> {
        self.access_repo
            .find_role_names_by_user_and_tenant(user_id, tenant_id)
            .await
    }

    /// Distinct `action:resource` permission names across all tenants.
    pub async fn get_user_permissions(&self, user_id: StringUuid) -> Result<Vec<String>> {
        self.access_repo
            .find_permission_names_by_user(user_id)
            .await
    }

    /// Distinct `action:resource` permission names in one tenant.
    pub async fn get_user_permissions_in_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
    ) -> Result<Vec<String>> {
        self.access_repo
            .find_permission_names_by_user_and_tenant(user_id, tenant_id)
            .await
    }

    /// Per-tenant access projection: one entry for every tenant the user has
    /// any role or grant in, each role entry carrying the tenant's full
    /// deduplicated permission set (role-derived grants are direct grants, so
    /// the grants table already holds the union).
    pub async fn get_user_tenant_access(&self, user_id: StringUuid) -> Result<Vec<TenantAccess>> {
        let memberships = self.access_repo.find_tenant_memberships(user_id).await?;
        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let role_rows = self
            .access_repo
            .find_role_names_by_user_grouped(user_id)
            .await?;
        let permission_rows = self
            .access_repo
            .find_permission_names_by_user_grouped(user_id)
            .await?;

        let access = memberships
            .into_iter()
            .map(|membership| {
                let mut permissions: Vec<String> = permission_rows
                    .iter()
                    .filter(|row| row.tenant_id == membership.tenant_id)
                    .map(|row| row.name())
                    .collect();
                permissions.sort();
                permissions.dedup();

                let roles = role_rows
                    .iter()
                    .filter(|row| row.tenant_id == membership.tenant_id)
                    .map(|row| TenantRoleAccess {
                        role_name: row.role_name.clone(),
                        permissions: permissions.clone(),
                    })
                    .collect();

                TenantAccess {
                    tenant_id: membership.tenant_id,
                    tenant_name: membership.tenant_name,
                    landlord_id: membership.landlord_id,
                    landlord_name: membership.landlord_name,
                    roles,
                }
            })
            .collect();

        Ok(access)
    }

    pub async fn has_role(&self, user_id: StringUuid, role_name: &str) -> Result<bool> {
        Ok(self
            .get_user_roles(user_id)
            .await?
            .iter()
            .any(|name| name == role_name))
    }

    pub async fn has_role_in_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        role_name: &str,
    ) -> Result<bool> {
        Ok(self
            .get_user_roles_in_tenant(user_id, tenant_id)
            .await?
            .iter()
            .any(|name| name == role_name))
    }

    pub async fn has_permission(&self, user_id: StringUuid, permission_name: &str) -> Result<bool> {
        Ok(self
            .get_user_permissions(user_id)
            .await?
            .iter()
            .any(|name| name == permission_name))
    }

    pub async fn has_permission_in_tenant(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        permission_name: &str,
    ) -> Result<bool> {
        Ok(self
            .get_user_permissions_in_tenant(user_id, tenant_id)
            .await?
            .iter()
            .any(|name| name == permission_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::access::{
        MockAccessRepository, TenantMembershipRow, TenantPermissionNameRow, TenantRoleNameRow,
    };

    fn service(repo: MockAccessRepository) -> AccessQueryService<MockAccessRepository> {
        AccessQueryService::new(Arc::new(repo))
    }

    #[tokio::test]
    async fn test_get_user_tenant_access_composes_roles_and_permissions() {
        let user_id = StringUuid::new_v4();
        let tenant_id = StringUuid::new_v4();
        let landlord_id = StringUuid::new_v4();

        let mut repo = MockAccessRepository::new();
        repo.expect_find_tenant_memberships().returning(move |_| {
            Ok(vec![TenantMembershipRow {
                tenant_id,
                tenant_name: "Dojo Central".to_string(),
                landlord_id,
                landlord_name: "Acme Schools".to_string(),
            }])
        });
        repo.expect_find_role_names_by_user_grouped()
            .returning(move |_| {
                Ok(vec![
                    TenantRoleNameRow {
                        tenant_id,
                        role_name: "Sensei".to_string(),
                    },
                    TenantRoleNameRow {
                        tenant_id,
                        role_name: "Coordinator".to_string(),
                    },
                ])
            });
        repo.expect_find_permission_names_by_user_grouped()
            .returning(move |_| {
                Ok(vec![
                    TenantPermissionNameRow {
                        tenant_id,
                        action: "manage".to_string(),
                        resource: "students".to_string(),
                    },
                    TenantPermissionNameRow {
                        tenant_id,
                        action: "read".to_string(),
                        resource: "reports".to_string(),
                    },
                ])
            });

        let svc = service(repo);

        let access = svc.get_user_tenant_access(user_id).await.unwrap();
        assert_eq!(access.len(), 1);
        assert_eq!(access[0].tenant_name, "Dojo Central");
        assert_eq!(access[0].landlord_name, "Acme Schools");
        assert_eq!(access[0].roles.len(), 2);

        // Every role entry carries the tenant's full permission set.
        for role in &access[0].roles {
            assert_eq!(
                role.permissions,
                vec!["manage:students".to_string(), "read:reports".to_string()]
            );
        }
    }

    #[tokio::test]
    async fn test_get_user_tenant_access_keeps_grant_only_tenants() {
        let user_id = StringUuid::new_v4();
        let tenant_id = StringUuid::new_v4();

        let mut repo = MockAccessRepository::new();
        repo.expect_find_tenant_memberships().returning(move |_| {
            Ok(vec![TenantMembershipRow {
                tenant_id,
                tenant_name: "Annex".to_string(),
                landlord_id: StringUuid::new_v4(),
                landlord_name: "Acme Schools".to_string(),
            }])
        });
        repo.expect_find_role_names_by_user_grouped()
            .returning(|_| Ok(Vec::new()));
        repo.expect_find_permission_names_by_user_grouped()
            .returning(move |_| {
                Ok(vec![TenantPermissionNameRow {
                    tenant_id,
                    action: "read".to_string(),
                    resource: "reports".to_string(),
                }])
            });

        let svc = service(repo);

        let access = svc.get_user_tenant_access(user_id).await.unwrap();
        assert_eq!(access.len(), 1);
        assert!(access[0].roles.is_empty());
    }

    #[tokio::test]
    async fn test_get_user_tenant_access_empty_for_unknown_user() {
        let mut repo = MockAccessRepository::new();
        repo.expect_find_tenant_memberships()
            .returning(|_| Ok(Vec::new()));
        repo.expect_find_role_names_by_user_grouped().never();
        repo.expect_find_permission_names_by_user_grouped().never();

        let svc = service(repo);

        let access = svc
            .get_user_tenant_access(StringUuid::new_v4())
            .await
            .unwrap();
        assert!(access.is_empty());
    }

    #[tokio::test]
    async fn test_has_role_matches_listing() {
        let mut repo = MockAccessRepository::new();
        repo.expect_find_role_names_by_user()
            .returning(|_| Ok(vec!["Sensei".to_string()]));

        let svc = service(repo);
        let user_id = StringUuid::new_v4();

        assert!(svc.has_role(user_id, "Sensei").await.unwrap());
        assert!(!svc.has_role(user_id, "Admin").await.unwrap());
    }

    #[tokio::test]
    async fn test_has_permission_in_tenant_matches_listing() {
        let mut repo = MockAccessRepository::new();
        repo.expect_find_permission_names_by_user_and_tenant()
            .returning(|_, _| Ok(vec!["manage:students".to_string()]));

        let svc = service(repo);
        let user_id = StringUuid::new_v4();
        let tenant_id = StringUuid::new_v4();

        assert!(svc
            .has_permission_in_tenant(user_id, tenant_id, "manage:students")
            .await
            .unwrap());
        assert!(!svc
            .has_permission_in_tenant(user_id, tenant_id, "manage:schedule")
            .await
            .unwrap());
    }
}
