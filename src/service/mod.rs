//! Business logic layer

pub mod access_query;
pub mod assignment;
pub mod grant;
pub mod role_permission;

pub use access_query::AccessQueryService;
pub use assignment::RoleAssignmentService;
pub use grant::PermissionGrantService;
pub use role_permission::RolePermissionService;
