//! Read-side access projection integration tests

use porteiro_core::domain::{AssignRolesInput, StringUuid};

mod common;

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn test_tenant_access_carries_roles_and_permission_names() {
    let pool = common::test_pool().await;
    let catalog = common::role_permission_service(&pool);
    let assignments = common::assignment_service(&pool);
    let access = common::access_query_service(&pool);

    let landlord = common::create_landlord(&pool).await;
    let tenant = common::create_tenant(&pool, landlord.id, "Dojo Central").await;
    let user = common::create_user(&pool).await;
    let sensei = common::create_role(&pool, landlord.id, "SENSEI").await;
    let manage_students =
        common::create_permission(&pool, landlord.id, "manage", "students", None).await;

    catalog
        .attach_permission(landlord.id, sensei.id, manage_students.id, None, false)
        .await
        .unwrap();
    assignments
        .assign_roles(AssignRolesInput {
            user_id: user.id,
            tenant_id: tenant.id,
            role_ids: vec![sensei.id],
        })
        .await
        .unwrap();

    let entries = access.get_user_tenant_access(user.id).await.unwrap();
    assert_eq!(entries.len(), 1);

    let entry = &entries[0];
    assert_eq!(entry.tenant_id, tenant.id);
    assert_eq!(entry.tenant_name, "Dojo Central");
    assert_eq!(entry.landlord_id, landlord.id);
    assert_eq!(entry.role_names(), vec!["SENSEI"]);
    assert_eq!(
        entry.roles[0].permissions,
        vec!["manage:students".to_string()]
    );
}

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn test_grant_only_tenant_appears_without_roles() {
    let pool = common::test_pool().await;
    let assignments = common::assignment_service(&pool);
    let grants = common::grant_service(&pool);
    let access = common::access_query_service(&pool);

    let landlord = common::create_landlord(&pool).await;
    let tenant_a = common::create_tenant(&pool, landlord.id, "Filial Centro").await;
    let tenant_b = common::create_tenant(&pool, landlord.id, "Filial Sul").await;
    let user = common::create_user(&pool).await;
    let admin = common::create_role(&pool, landlord.id, "ADMIN").await;
    let permission = common::create_permission(&pool, landlord.id, "read", "invoice", None).await;

    assignments
        .assign_roles(AssignRolesInput {
            user_id: user.id,
            tenant_id: tenant_a.id,
            role_ids: vec![admin.id],
        })
        .await
        .unwrap();
    grants
        .create_user_tenant_permission(user.id, tenant_b.id, permission.id)
        .await
        .unwrap();

    let entries = access.get_user_tenant_access(user.id).await.unwrap();
    assert_eq!(entries.len(), 2);

    let entry_a = entries
        .iter()
        .find(|e| e.tenant_id == tenant_a.id)
        .expect("tenant with role");
    assert_eq!(entry_a.role_names(), vec!["ADMIN"]);

    // A tenant reached only through direct grants still shows up, with no
    // role entries to hang permissions on.
    let entry_b = entries
        .iter()
        .find(|e| e.tenant_id == tenant_b.id)
        .expect("grant-only tenant");
    assert!(entry_b.roles.is_empty());
    assert!(entry_b.permission_names().is_empty());
}

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn test_every_role_entry_carries_the_tenant_permission_set() {
    let pool = common::test_pool().await;
    let catalog = common::role_permission_service(&pool);
    let assignments = common::assignment_service(&pool);
    let access = common::access_query_service(&pool);

    let landlord = common::create_landlord(&pool).await;
    let tenant = common::create_tenant(&pool, landlord.id, "Filial Centro").await;
    let user = common::create_user(&pool).await;
    let admin = common::create_role(&pool, landlord.id, "ADMIN").await;
    let auditor = common::create_role(&pool, landlord.id, "AUDITOR").await;
    let read_invoice =
        common::create_permission(&pool, landlord.id, "read", "invoice", None).await;
    let write_invoice =
        common::create_permission(&pool, landlord.id, "write", "invoice", None).await;

    catalog
        .attach_permission(landlord.id, admin.id, write_invoice.id, None, false)
        .await
        .unwrap();
    catalog
        .attach_permission(landlord.id, auditor.id, read_invoice.id, None, false)
        .await
        .unwrap();
    assignments
        .assign_roles(AssignRolesInput {
            user_id: user.id,
            tenant_id: tenant.id,
            role_ids: vec![admin.id, auditor.id],
        })
        .await
        .unwrap();

    let entries = access.get_user_tenant_access(user.id).await.unwrap();
    assert_eq!(entries.len(), 1);

    let entry = &entries[0];
    assert_eq!(entry.role_names(), vec!["ADMIN", "AUDITOR"]);
    // Grants are materialized per tenant, so both role entries show the same
    // deduplicated, sorted permission list.
    for role in &entry.roles {
        assert_eq!(
            role.permissions,
            vec!["read:invoice".to_string(), "write:invoice".to_string()]
        );
    }
}

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn test_unknown_user_has_empty_access() {
    let pool = common::test_pool().await;
    let access = common::access_query_service(&pool);

    let entries = access
        .get_user_tenant_access(StringUuid::new_v4())
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn test_has_checks_reflect_listings() {
    let pool = common::test_pool().await;
    let assignments = common::assignment_service(&pool);
    let grants = common::grant_service(&pool);
    let access = common::access_query_service(&pool);

    let landlord = common::create_landlord(&pool).await;
    let tenant_a = common::create_tenant(&pool, landlord.id, "Filial Centro").await;
    let tenant_b = common::create_tenant(&pool, landlord.id, "Filial Sul").await;
    let user = common::create_user(&pool).await;
    let admin = common::create_role(&pool, landlord.id, "ADMIN").await;
    let read_invoice =
        common::create_permission(&pool, landlord.id, "read", "invoice", None).await;

    assignments
        .assign_roles(AssignRolesInput {
            user_id: user.id,
            tenant_id: tenant_a.id,
            role_ids: vec![admin.id],
        })
        .await
        .unwrap();
    grants
        .create_user_tenant_permission(user.id, tenant_a.id, read_invoice.id)
        .await
        .unwrap();

    assert!(access.has_role(user.id, "ADMIN").await.unwrap());
    assert!(access
        .has_role_in_tenant(user.id, tenant_a.id, "ADMIN")
        .await
        .unwrap());
    assert!(!access
        .has_role_in_tenant(user.id, tenant_b.id, "ADMIN")
        .await
        .unwrap());

    assert!(access.has_permission(user.id, "read:invoice").await.unwrap());
    assert!(access
        .has_permission_in_tenant(user.id, tenant_a.id, "read:invoice")
        .await
        .unwrap());
    assert!(!access
        .has_permission_in_tenant(user.id, tenant_b.id, "read:invoice")
        .await
        .unwrap());
    assert!(!access.has_permission(user.id, "write:invoice").await.unwrap());
}
