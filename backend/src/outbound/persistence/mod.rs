//! PostgreSQL persistence adapter for the compute database.
//!
//! The adapter is read-only: it implements the `InstanceStore` port over a
//! `diesel-async` `bb8` pool. Diesel row structs (`models.rs`) and table
//! definitions (`schema.rs`) stay internal to this module.
//!
//! # Example
//!
//! ```no_run
//! use instance_sync::outbound::persistence::{DbPool, DieselInstanceStore, PoolConfig};
//!
//! # async fn connect() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/nova")).await?;
//! let store = DieselInstanceStore::new(pool);
//! # let _ = store;
//! # Ok(())
//! # }
//! ```

pub(crate) mod diesel_helpers;
mod diesel_instance_store;
mod models;
mod pool;
mod schema;

pub use diesel_instance_store::DieselInstanceStore;
pub use pool::{DbPool, PoolConfig, PoolError};
