//! Landlord repository

use crate::domain::{CreateLandlordInput, Landlord, StringUuid};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LandlordRepository: Send + Sync {
    async fn create(&self, input: &CreateLandlordInput) -> Result<Landlord>;
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Landlord>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Landlord>>;
}

pub struct LandlordRepositoryImpl {
    pool: MySqlPool,
}

impl LandlordRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LandlordRepository for LandlordRepositoryImpl {
    async fn create(&self, input: &CreateLandlordInput) -> Result<Landlord> {
        let id = StringUuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO landlords (id, name, created_at, updated_at)
            VALUES (?, ?, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create landlord")))
    }

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Landlord>> {
        let landlord = sqlx::query_as::<_, Landlord>(
            "SELECT id, name, created_at, updated_at FROM landlords WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(landlord)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Landlord>> {
        let landlord = sqlx::query_as::<_, Landlord>(
            "SELECT id, name, created_at, updated_at FROM landlords WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(landlord)
    }
}
