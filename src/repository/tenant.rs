//! Tenant repository

use crate::domain::{CreateTenantInput, StringUuid, Tenant};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn create(&self, input: &CreateTenantInput) -> Result<Tenant>;
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Tenant>>;
    async fn find_by_landlord(&self, landlord_id: StringUuid) -> Result<Vec<Tenant>>;
}

pub struct TenantRepositoryImpl {
    pool: MySqlPool,
}

impl TenantRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRepository for TenantRepositoryImpl {
    async fn create(&self, input: &CreateTenantInput) -> Result<Tenant> {
        let id = StringUuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO tenants (id, landlord_id, name, created_at, updated_at)
            VALUES (?, ?, ?, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(input.landlord_id)
        .bind(&input.name)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create tenant")))
    }

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, landlord_id, name, created_at, updated_at
            FROM tenants
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn find_by_landlord(&self, landlord_id: StringUuid) -> Result<Vec<Tenant>> {
        let tenants = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, landlord_id, name, created_at, updated_at
            FROM tenants
            WHERE landlord_id = ?
            ORDER BY created_at
            "#,
        )
        .bind(landlord_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tenants)
    }
}
