//! Role/permission association integration tests

use porteiro_core::domain::CreateRoleInput;
use porteiro_core::error::AppError;

mod common;

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn test_attach_then_find_returns_same_policy() {
    let pool = common::test_pool().await;
    let service = common::role_permission_service(&pool);

    let landlord = common::create_landlord(&pool).await;
    let tenant = common::create_tenant(&pool, landlord.id, "Filial Centro").await;
    let role = common::create_role(&pool, landlord.id, "ADMIN").await;
    let permission = common::create_permission(&pool, landlord.id, "read", "invoice", None).await;
    let policy = common::create_policy(&pool, Some(tenant.id)).await;

    let association = service
        .attach_permission(landlord.id, role.id, permission.id, Some(policy.id), false)
        .await
        .unwrap();
    assert_eq!(association.policy_id, Some(policy.id));

    let found = service
        .find_association(landlord.id, role.id, permission.id)
        .await
        .unwrap()
        .expect("association should exist");
    assert_eq!(found.policy_id, Some(policy.id));
}

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn test_reattach_updates_policy_without_duplicating() {
    let pool = common::test_pool().await;
    let service = common::role_permission_service(&pool);

    let landlord = common::create_landlord(&pool).await;
    let tenant = common::create_tenant(&pool, landlord.id, "Filial Centro").await;
    let role = common::create_role(&pool, landlord.id, "ADMIN").await;
    let permission = common::create_permission(&pool, landlord.id, "read", "invoice", None).await;
    let policy = common::create_policy(&pool, Some(tenant.id)).await;

    service
        .attach_permission(landlord.id, role.id, permission.id, None, false)
        .await
        .unwrap();
    assert_eq!(service.count_role_permissions(role.id).await.unwrap(), 1);

    let updated = service
        .attach_permission(landlord.id, role.id, permission.id, Some(policy.id), false)
        .await
        .unwrap();
    assert_eq!(updated.policy_id, Some(policy.id));
    assert_eq!(service.count_role_permissions(role.id).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn test_attach_inherits_default_policy() {
    let pool = common::test_pool().await;
    let service = common::role_permission_service(&pool);

    let landlord = common::create_landlord(&pool).await;
    let role = common::create_role(&pool, landlord.id, "APPROVER").await;
    let default_policy = common::create_policy(&pool, None).await;
    let permission = common::create_permission(
        &pool,
        landlord.id,
        "approve",
        "payment",
        Some(default_policy.id),
    )
    .await;

    let association = service
        .attach_permission(landlord.id, role.id, permission.id, None, true)
        .await
        .unwrap();
    assert_eq!(association.policy_id, Some(default_policy.id));
}

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn test_explicit_policy_wins_over_inherited_default() {
    let pool = common::test_pool().await;
    let service = common::role_permission_service(&pool);

    let landlord = common::create_landlord(&pool).await;
    let tenant = common::create_tenant(&pool, landlord.id, "Filial Centro").await;
    let role = common::create_role(&pool, landlord.id, "APPROVER").await;
    let default_policy = common::create_policy(&pool, None).await;
    let override_policy = common::create_policy(&pool, Some(tenant.id)).await;
    let permission = common::create_permission(
        &pool,
        landlord.id,
        "approve",
        "payment",
        Some(default_policy.id),
    )
    .await;

    let association = service
        .attach_permission(
            landlord.id,
            role.id,
            permission.id,
            Some(override_policy.id),
            true,
        )
        .await
        .unwrap();
    assert_eq!(association.policy_id, Some(override_policy.id));
}

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn test_attach_rejects_policy_from_other_landlord() {
    let pool = common::test_pool().await;
    let service = common::role_permission_service(&pool);

    let landlord = common::create_landlord(&pool).await;
    let role = common::create_role(&pool, landlord.id, "ADMIN").await;
    let permission = common::create_permission(&pool, landlord.id, "read", "invoice", None).await;

    let other_landlord = common::create_landlord(&pool).await;
    let other_tenant = common::create_tenant(&pool, other_landlord.id, "Filial Sul").await;
    let foreign_policy = common::create_policy(&pool, Some(other_tenant.id)).await;

    let result = service
        .attach_permission(
            landlord.id,
            role.id,
            permission.id,
            Some(foreign_policy.id),
            false,
        )
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    // Nothing was written.
    assert_eq!(service.count_role_permissions(role.id).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn test_attach_rejects_role_from_other_landlord() {
    let pool = common::test_pool().await;
    let service = common::role_permission_service(&pool);

    let landlord = common::create_landlord(&pool).await;
    let permission = common::create_permission(&pool, landlord.id, "read", "invoice", None).await;

    let other_landlord = common::create_landlord(&pool).await;
    let foreign_role = common::create_role(&pool, other_landlord.id, "ADMIN").await;

    let result = service
        .attach_permission(landlord.id, foreign_role.id, permission.id, None, false)
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn test_update_policy_can_clear_override() {
    let pool = common::test_pool().await;
    let service = common::role_permission_service(&pool);

    let landlord = common::create_landlord(&pool).await;
    let tenant = common::create_tenant(&pool, landlord.id, "Filial Centro").await;
    let role = common::create_role(&pool, landlord.id, "ADMIN").await;
    let permission = common::create_permission(&pool, landlord.id, "read", "invoice", None).await;
    let policy = common::create_policy(&pool, Some(tenant.id)).await;

    service
        .attach_permission(landlord.id, role.id, permission.id, Some(policy.id), false)
        .await
        .unwrap();

    let updated = service
        .update_permission_policy(landlord.id, role.id, permission.id, None, false)
        .await
        .unwrap();
    assert_eq!(updated.policy_id, None);
}

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn test_detach_is_idempotent() {
    let pool = common::test_pool().await;
    let service = common::role_permission_service(&pool);

    let landlord = common::create_landlord(&pool).await;
    let role = common::create_role(&pool, landlord.id, "ADMIN").await;
    let permission = common::create_permission(&pool, landlord.id, "read", "invoice", None).await;

    service
        .attach_permission(landlord.id, role.id, permission.id, None, false)
        .await
        .unwrap();

    assert!(service
        .detach_permission(landlord.id, role.id, permission.id)
        .await
        .unwrap());
    assert!(!service
        .detach_permission(landlord.id, role.id, permission.id)
        .await
        .unwrap());
    assert_eq!(service.count_role_permissions(role.id).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires a MySQL database"]
async fn test_duplicate_role_code_per_landlord_conflicts() {
    let pool = common::test_pool().await;
    let service = common::role_permission_service(&pool);

    let landlord = common::create_landlord(&pool).await;
    common::create_role(&pool, landlord.id, "ADMIN").await;

    let result = service
        .create_role(CreateRoleInput {
            landlord_id: landlord.id,
            code: "ADMIN".to_string(),
            name: "Administrator".to_string(),
            description: None,
        })
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    // Same code under a different landlord is fine.
    let other_landlord = common::create_landlord(&pool).await;
    let role = service
        .create_role(CreateRoleInput {
            landlord_id: other_landlord.id,
            code: "ADMIN".to_string(),
            name: "Administrator".to_string(),
            description: None,
        })
        .await
        .unwrap();
    assert_eq!(role.code, "ADMIN");
}
