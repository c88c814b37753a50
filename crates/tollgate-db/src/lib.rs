//! Database layer for the tollgate payment proxy.
//!
//! Provides the connection pool, embedded migrations, and the persistent
//! models: tenants, endpoints, secrets, payments, and request logs.
//!
//! All tenant-owned rows are scoped by `tenant_id` in every query. Payments
//! and request logs keep weak (set-null) references to their endpoint and
//! tenant so audit history survives deletion of either.

pub mod error;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use pool::{create_pool, run_migrations};
