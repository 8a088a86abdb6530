//! Porteiro Core - Multi-tenant access control backend
//!
//! This crate provides the core of the Porteiro identity backend: the
//! landlord/tenant RBAC model, role assignment with permission propagation,
//! direct permission grants, read-side access aggregation and JWT issuance.
//! HTTP/gRPC surfaces live in sibling crates and consume this one.

pub mod config;
pub mod domain;
pub mod error;
pub mod jwt;
pub mod repository;
pub mod service;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
