//! Postgres implementation of the enrichment-core port traits.
//!
//! One adapter, `PgLeadStore`, a newtype over `PgPool`. All SQL is
//! runtime-checked (`sqlx::query`, not `sqlx::query!`) to avoid a
//! compile-time database requirement. `schema.sql` at the crate root holds
//! the reference DDL; applying it is left to the deployment.

mod rows;
mod store;

pub use store::PgLeadStore;
