//! Landlord domain model
//!
//! A landlord is the tenancy root: roles, permissions and policies are defined
//! per landlord, and every tenant belongs to exactly one.

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Landlord entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Landlord {
    pub id: StringUuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Landlord {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            name: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating a new landlord
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLandlordInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}
