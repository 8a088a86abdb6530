//! Domain models for Porteiro Core

pub mod access;
pub mod common;
pub mod landlord;
pub mod policy;
pub mod rbac;
pub mod tenant;
pub mod user;

pub use access::*;
pub use common::*;
pub use landlord::*;
pub use policy::*;
pub use rbac::*;
pub use tenant::*;
pub use user::*;
