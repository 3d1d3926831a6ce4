//! Process-local implementation of the `InstanceCache` port.
//!
//! Records are held in their encoded field-map form so the adapter exercises
//! the same encoding as the Redis adapter. Each method takes one lock, which
//! gives the per-key atomicity the port promises.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::domain::ports::{InstanceCache, InstanceCacheError};
use crate::domain::{InstanceId, InstanceRecord, ProjectId};

type RecordMap = HashMap<InstanceId, BTreeMap<String, String>>;
type TenantMap = HashMap<ProjectId, BTreeSet<InstanceId>>;

/// Full copy of the cache contents, ordered for comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub records: BTreeMap<InstanceId, BTreeMap<String, String>>,
    pub tenants: BTreeMap<ProjectId, BTreeSet<InstanceId>>,
}

/// In-memory instance cache.
#[derive(Debug, Default)]
pub struct InMemoryInstanceCache {
    records: RwLock<RecordMap>,
    tenants: RwLock<TenantMap>,
}

impl InMemoryInstanceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current contents.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceCacheError::Unavailable`] when a lock is poisoned.
    pub fn snapshot(&self) -> Result<CacheSnapshot, InstanceCacheError> {
        let records = read(&self.records)?
            .iter()
            .map(|(uuid, fields)| (uuid.clone(), fields.clone()))
            .collect();
        let tenants = read(&self.tenants)?
            .iter()
            .map(|(project_id, members)| (project_id.clone(), members.clone()))
            .collect();
        Ok(CacheSnapshot { records, tenants })
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, InstanceCacheError> {
    lock.read()
        .map_err(|_| InstanceCacheError::unavailable("in-memory cache lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, InstanceCacheError> {
    lock.write()
        .map_err(|_| InstanceCacheError::unavailable("in-memory cache lock poisoned"))
}

#[async_trait]
impl InstanceCache for InMemoryInstanceCache {
    async fn upsert_instance(&self, record: &InstanceRecord) -> Result<(), InstanceCacheError> {
        write(&self.records)?.insert(record.uuid.clone(), record.to_fields());
        Ok(())
    }

    async fn add_to_tenant_index(
        &self,
        project_id: &ProjectId,
        instance_id: &InstanceId,
    ) -> Result<(), InstanceCacheError> {
        write(&self.tenants)?
            .entry(project_id.clone())
            .or_default()
            .insert(instance_id.clone());
        Ok(())
    }

    async fn replace_tenant_index(
        &self,
        project_id: &ProjectId,
        members: &BTreeSet<InstanceId>,
    ) -> Result<(), InstanceCacheError> {
        let mut tenants = write(&self.tenants)?;
        if members.is_empty() {
            tenants.remove(project_id);
        } else {
            tenants.insert(project_id.clone(), members.clone());
        }
        Ok(())
    }

    async fn tenant_members(
        &self,
        project_id: &ProjectId,
    ) -> Result<BTreeSet<InstanceId>, InstanceCacheError> {
        Ok(read(&self.tenants)?
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn indexed_tenants(&self) -> Result<BTreeSet<ProjectId>, InstanceCacheError> {
        Ok(read(&self.tenants)?.keys().cloned().collect())
    }

    async fn fetch_instance(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Option<InstanceRecord>, InstanceCacheError> {
        let fields = read(&self.records)?.get(instance_id).cloned();
        fields
            .map(|fields| {
                InstanceRecord::from_fields(&fields)
                    .map_err(|err| InstanceCacheError::corrupt(err.to_string()))
            })
            .transpose()
    }
}
