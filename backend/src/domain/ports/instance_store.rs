//! Driven port for reading compute instances from the relational source of
//! truth.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::InstanceRow;

define_port_error! {
    /// Errors raised while reading instances from the compute database.
    pub enum InstanceStoreError {
        /// The store could not be reached or a connection could not be
        /// checked out.
        Connection { message: String } =>
            "instance store connection failed: {message}",
        /// The bulk read failed during execution.
        Query { message: String } =>
            "instance store query failed: {message}",
    }
}

/// Read-only access to the joined instance rows.
///
/// Each call performs one bulk read with its own connection; no transaction
/// outlives the call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Fetch every live instance joined with its extra attributes.
    async fn fetch_all_instances(&self) -> Result<Vec<InstanceRow>, InstanceStoreError>;
}
