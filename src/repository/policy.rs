//! Policy repository

use crate::domain::{CreatePolicyInput, Policy, StringUuid};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

const POLICY_COLUMNS: &str =
    "id, code, name, effect, actions, resources, conditions, tenant_id, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn create(&self, input: &CreatePolicyInput) -> Result<Policy>;
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Policy>>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Policy>>;
    async fn list_by_tenant(&self, tenant_id: StringUuid) -> Result<Vec<Policy>>;
}

pub struct PolicyRepositoryImpl {
    pool: MySqlPool,
}

impl PolicyRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyRepository for PolicyRepositoryImpl {
    async fn create(&self, input: &CreatePolicyInput) -> Result<Policy> {
        let id = StringUuid::new_v4();
        let actions_json =
            serde_json::to_string(&input.actions).map_err(|e| AppError::Internal(e.into()))?;
        let resources_json =
            serde_json::to_string(&input.resources).map_err(|e| AppError::Internal(e.into()))?;
        let conditions = input
            .conditions
            .clone()
            .unwrap_or(serde_json::Value::Null);
        let conditions_json =
            serde_json::to_string(&conditions).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO policies (id, code, name, effect, actions, resources, conditions, tenant_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(&input.code)
        .bind(&input.name)
        .bind(input.effect)
        .bind(&actions_json)
        .bind(&resources_json)
        .bind(&conditions_json)
        .bind(input.tenant_id)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create policy")))
    }

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Policy>> {
        let policy = sqlx::query_as::<_, Policy>(&format!(
            "SELECT {} FROM policies WHERE id = ?",
            POLICY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(policy)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Policy>> {
        let policy = sqlx::query_as::<_, Policy>(&format!(
            "SELECT {} FROM policies WHERE code = ?",
            POLICY_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(policy)
    }

    async fn list_by_tenant(&self, tenant_id: StringUuid) -> Result<Vec<Policy>> {
        let policies = sqlx::query_as::<_, Policy>(&format!(
            "SELECT {} FROM policies WHERE tenant_id = ? ORDER BY created_at",
            POLICY_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(policies)
    }
}
