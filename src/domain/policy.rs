//! ABAC policy domain model
//!
//! Policies refine what a permission allows. A role→permission association may
//! carry its own policy override; otherwise the permission's default policy
//! (when inherited) applies.

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Policy effect, stored as `ALLOW`/`DENY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyEffect {
    #[default]
    Allow,
    Deny,
}

impl std::str::FromStr for PolicyEffect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ALLOW" => Ok(PolicyEffect::Allow),
            "DENY" => Ok(PolicyEffect::Deny),
            _ => Err(format!("Unknown policy effect: {}", s)),
        }
    }
}

impl std::fmt::Display for PolicyEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyEffect::Allow => write!(f, "ALLOW"),
            PolicyEffect::Deny => write!(f, "DENY"),
        }
    }
}

impl sqlx::Type<sqlx::MySql> for PolicyEffect {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <String as sqlx::Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::MySql>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::MySql> for PolicyEffect {
    fn decode(
        value: sqlx::mysql::MySqlValueRef<'r>,
    ) -> std::result::Result<Self, sqlx::error::BoxDynError> {
        let s: String = sqlx::Decode::<'r, sqlx::MySql>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::MySql> for PolicyEffect {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<u8>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        let s = match self {
            PolicyEffect::Allow => "ALLOW",
            PolicyEffect::Deny => "DENY",
        };
        <&str as sqlx::Encode<sqlx::MySql>>::encode_by_ref(&s, buf)
    }
}

/// Policy entity. `tenant_id = NULL` means landlord-global; tenant-scoped
/// policies derive their effective landlord through the tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Policy {
    pub id: StringUuid,
    pub code: String,
    pub name: String,
    pub effect: PolicyEffect,
    #[sqlx(json)]
    pub actions: Vec<String>,
    #[sqlx(json)]
    pub resources: Vec<String>,
    #[sqlx(json)]
    pub conditions: serde_json::Value,
    pub tenant_id: Option<StringUuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Policy {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            code: String::new(),
            name: String::new(),
            effect: PolicyEffect::default(),
            actions: Vec::new(),
            resources: Vec::new(),
            conditions: serde_json::Value::Null,
            tenant_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Policy {
    /// Placeholder condition matcher: a context matches when the serialized
    /// conditions document contains it as a substring. Policies without
    /// conditions match everything. Not a rule engine; callers must not treat
    /// this as real condition evaluation yet.
    pub fn matches_conditions(&self, context: &str) -> bool {
        match &self.conditions {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) if map.is_empty() => true,
            other => {
                if context.is_empty() {
                    return true;
                }
                other.to_string().contains(context)
            }
        }
    }
}

/// Input for creating a new policy
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePolicyInput {
    #[validate(length(min = 1, max = 100))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub effect: PolicyEffect,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub conditions: Option<serde_json::Value>,
    pub tenant_id: Option<StringUuid>,
}
