//! Driven port for the key-value cache holding denormalised instances.
//!
//! Two key families live behind this port: one record per instance and one
//! uuid set per tenant. Every method is atomic on its own key; nothing spans
//! both families, so readers must tolerate an indexed uuid whose record is
//! missing.

use std::collections::BTreeSet;

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::{InstanceId, InstanceRecord, ProjectId};

define_port_error! {
    /// Errors raised by cache adapters.
    pub enum InstanceCacheError {
        /// The cache backend is unavailable or rejected the command.
        Unavailable { message: String } =>
            "instance cache unavailable: {message}",
        /// A cached value exists but cannot be decoded.
        Corrupt { message: String } =>
            "instance cache entry is corrupt: {message}",
    }
}

/// Port for reading and writing cached instance records and tenant indexes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstanceCache: Send + Sync {
    /// Replace the cached record for `record.uuid` wholesale.
    async fn upsert_instance(&self, record: &InstanceRecord) -> Result<(), InstanceCacheError>;

    /// Add one uuid to a tenant's index. Adding an existing member is a no-op.
    async fn add_to_tenant_index(
        &self,
        project_id: &ProjectId,
        instance_id: &InstanceId,
    ) -> Result<(), InstanceCacheError>;

    /// Atomically replace a tenant's index with `members`. An empty set
    /// removes the index.
    async fn replace_tenant_index(
        &self,
        project_id: &ProjectId,
        members: &BTreeSet<InstanceId>,
    ) -> Result<(), InstanceCacheError>;

    /// Read a tenant's index; an unknown tenant yields an empty set.
    async fn tenant_members(
        &self,
        project_id: &ProjectId,
    ) -> Result<BTreeSet<InstanceId>, InstanceCacheError>;

    /// Enumerate every tenant that currently has an index.
    async fn indexed_tenants(&self) -> Result<BTreeSet<ProjectId>, InstanceCacheError>;

    /// Read one cached record, or `None` when it has not been written.
    async fn fetch_instance(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Option<InstanceRecord>, InstanceCacheError>;
}
