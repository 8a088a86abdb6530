//! Data access layer (Repository pattern)

pub mod access;
pub mod grant;
pub mod landlord;
pub mod policy;
pub mod rbac;
pub mod tenant;
pub mod user;

pub use access::AccessRepository;
pub use grant::GrantRepository;
pub use landlord::LandlordRepository;
pub use policy::PolicyRepository;
pub use rbac::RbacRepository;
pub use tenant::TenantRepository;
pub use user::UserRepository;

use crate::config::DatabaseConfig;
use crate::error::Result;
use sqlx::{mysql::MySqlPoolOptions, MySqlPool};

/// Create the database connection pool from configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect(&config.url)
        .await?;

    Ok(pool)
}
