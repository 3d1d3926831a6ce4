//! Fixtures and port doubles for sync and listing tests.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tokio::sync::Notify;

use crate::domain::ports::{InstanceCache, InstanceCacheError, InstanceStore, InstanceStoreError};
use crate::domain::sync_scheduler::BackoffJitter;
use crate::domain::{InstanceId, InstanceRecord, InstanceRow, ProjectId, transform};
use crate::outbound::cache::InMemoryInstanceCache;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("test double mutex poisoned"),
    }
}

/// Fixed creation time used by fixture rows.
pub fn fixture_created_at() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single() {
        Some(at) => at,
        None => panic!("fixture timestamp is valid"),
    }
}

/// Serialised flavor blob in the compute `instance_extra` shape.
pub fn flavor_payload(vcpus: u32, memory_mb: u64, ephemeral_gb: u64, id: &str, name: &str) -> String {
    json!({
        "cur": {
            "nova_object.name": "Flavor",
            "nova_object.data": {
                "vcpus": vcpus,
                "memory_mb": memory_mb,
                "ephemeral_gb": ephemeral_gb,
                "flavorid": id,
                "name": name,
            }
        },
        "old": null,
        "new": null,
    })
    .to_string()
}

/// An active row with the `small` flavor (2 vCPU, 2048 MB, 20 GB).
pub fn instance_row(uuid: &str, project_id: &str) -> InstanceRow {
    InstanceRow {
        uuid: uuid.to_owned(),
        project_id: Some(project_id.to_owned()),
        user_id: Some("user-1".to_owned()),
        hostname: Some(format!("{uuid}-host")),
        display_name: Some(format!("{uuid}-display")),
        image_ref: Some("image-1".to_owned()),
        host: Some("compute-1".to_owned()),
        availability_zone: Some("nova".to_owned()),
        power_state: Some(1),
        vm_state: Some("active".to_owned()),
        task_state: None,
        created_at: Some(fixture_created_at()),
        updated_at: None,
        flavor: Some(flavor_payload(2, 2048, 20, "f1", "small")),
    }
}

/// The record a sync pass writes for [`instance_row`].
pub fn instance_record(uuid: &str, project_id: &str) -> InstanceRecord {
    match transform(&instance_row(uuid, project_id)) {
        Ok(record) => record,
        Err(error) => panic!("fixture row transforms: {error}"),
    }
}

/// Scriptable relational store.
///
/// Failures queued with [`ScriptedInstanceStore::push_failure`] are returned
/// one per call before rows are served. When blocking is enabled each call
/// parks until [`ScriptedInstanceStore::release`] is called.
#[derive(Default)]
pub struct ScriptedInstanceStore {
    rows: Mutex<Vec<InstanceRow>>,
    failures: Mutex<VecDeque<InstanceStoreError>>,
    blocking: AtomicBool,
    entered: Notify,
    released: Notify,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedInstanceStore {
    pub fn new(rows: Vec<InstanceRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    /// Insert or replace a row by uuid.
    pub fn upsert(&self, row: InstanceRow) {
        let mut rows = lock(&self.rows);
        rows.retain(|existing| existing.uuid != row.uuid);
        rows.push(row);
    }

    /// Delete a row by uuid.
    pub fn remove(&self, uuid: &str) {
        lock(&self.rows).retain(|row| row.uuid != uuid);
    }

    pub fn push_failure(&self, error: InstanceStoreError) {
        lock(&self.failures).push_back(error);
    }

    pub fn set_blocking(&self, blocking: bool) {
        self.blocking.store(blocking, Ordering::SeqCst);
    }

    /// Wait until a call has entered the store.
    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    /// Let one parked call return.
    pub fn release(&self) {
        self.released.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent calls observed.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

struct ActiveCall<'a>(&'a AtomicUsize);

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl InstanceStore for ScriptedInstanceStore {
    async fn fetch_all_instances(&self) -> Result<Vec<InstanceRow>, InstanceStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _active = ActiveCall(&self.active);
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        if self.blocking.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.released.notified().await;
        }
        if let Some(error) = lock(&self.failures).pop_front() {
            return Err(error);
        }
        Ok(lock(&self.rows).clone())
    }
}

/// In-memory cache that can be told to reject writes.
#[derive(Default)]
pub struct FaultyInstanceCache {
    inner: Arc<InMemoryInstanceCache>,
    failing_records: Mutex<BTreeSet<String>>,
    fail_all_records: AtomicBool,
    fail_index_writes: AtomicBool,
    fail_tenant_scan: AtomicBool,
}

impl FaultyInstanceCache {
    pub fn new(inner: Arc<InMemoryInstanceCache>) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Reject record writes for one uuid.
    pub fn fail_record(&self, uuid: &str) {
        lock(&self.failing_records).insert(uuid.to_owned());
    }

    pub fn fail_all_records(&self, fail: bool) {
        self.fail_all_records.store(fail, Ordering::SeqCst);
    }

    pub fn fail_index_writes(&self, fail: bool) {
        self.fail_index_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_tenant_scan(&self, fail: bool) {
        self.fail_tenant_scan.store(fail, Ordering::SeqCst);
    }

    fn refused() -> InstanceCacheError {
        InstanceCacheError::unavailable("write refused by test double")
    }

    fn index_writes_fail(&self) -> bool {
        self.fail_index_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstanceCache for FaultyInstanceCache {
    async fn upsert_instance(&self, record: &InstanceRecord) -> Result<(), InstanceCacheError> {
        if self.fail_all_records.load(Ordering::SeqCst)
            || lock(&self.failing_records).contains(record.uuid.as_str())
        {
            return Err(Self::refused());
        }
        self.inner.upsert_instance(record).await
    }

    async fn add_to_tenant_index(
        &self,
        project_id: &ProjectId,
        instance_id: &InstanceId,
    ) -> Result<(), InstanceCacheError> {
        if self.index_writes_fail() {
            return Err(Self::refused());
        }
        self.inner.add_to_tenant_index(project_id, instance_id).await
    }

    async fn replace_tenant_index(
        &self,
        project_id: &ProjectId,
        members: &BTreeSet<InstanceId>,
    ) -> Result<(), InstanceCacheError> {
        if self.index_writes_fail() {
            return Err(Self::refused());
        }
        self.inner.replace_tenant_index(project_id, members).await
    }

    async fn tenant_members(
        &self,
        project_id: &ProjectId,
    ) -> Result<BTreeSet<InstanceId>, InstanceCacheError> {
        self.inner.tenant_members(project_id).await
    }

    async fn indexed_tenants(&self) -> Result<BTreeSet<ProjectId>, InstanceCacheError> {
        if self.fail_tenant_scan.load(Ordering::SeqCst) {
            return Err(InstanceCacheError::unavailable("scan refused by test double"));
        }
        self.inner.indexed_tenants().await
    }

    async fn fetch_instance(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Option<InstanceRecord>, InstanceCacheError> {
        self.inner.fetch_instance(instance_id).await
    }
}

/// Jitter that returns the base delay unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl BackoffJitter for NoJitter {
    fn jittered_delay(&self, base: Duration, _failures: u32) -> Duration {
        base
    }
}
