//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod instance_cache;
mod instance_store;

#[cfg(test)]
pub use instance_cache::MockInstanceCache;
pub use instance_cache::{InstanceCache, InstanceCacheError};
#[cfg(test)]
pub use instance_store::MockInstanceStore;
pub use instance_store::{InstanceStore, InstanceStoreError};
