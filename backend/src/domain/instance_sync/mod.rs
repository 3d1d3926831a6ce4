//! Full-table synchronisation of instance rows into the instance cache.
//!
//! One pass reads every live row from the [`InstanceStore`], transforms each
//! row into an [`InstanceRecord`], writes the record, and maintains the
//! per-tenant index according to [`TenantIndexMode`]. Bad rows and failed
//! writes are skipped and counted; only an unreachable store (or a cache that
//! rejects every write) fails the pass. A skipped row never drops its
//! instance from a tenant index that already lists it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::domain::ports::{InstanceCache, InstanceCacheError, InstanceStore, InstanceStoreError};
use crate::domain::{InstanceId, InstanceRecord, InstanceRow, ProjectId, transform};

/// Tenant index maintenance policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TenantIndexMode {
    /// Replace each tenant's index with exactly the uuids written this pass,
    /// emptying indexes of tenants that no longer own any instance.
    #[default]
    Rebuild,
    /// Only ever add uuids to tenant indexes. Instances removed from the
    /// store stay listed.
    Accumulate,
}

/// Sync pass configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSyncConfig {
    /// Upper bound on the relational bulk read.
    pub store_timeout: Duration,
    /// Tenant index maintenance policy.
    pub index_mode: TenantIndexMode,
}

impl Default for InstanceSyncConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(30),
            index_mode: TenantIndexMode::default(),
        }
    }
}

/// Counters describing one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPassReport {
    /// Rows returned by the store.
    pub fetched: usize,
    /// Records written to the cache.
    pub written: usize,
    /// Rows skipped because they could not be transformed.
    pub skipped: usize,
    /// Skipped rows kept in their tenant index from an earlier pass.
    pub retained: usize,
    /// Records whose cache write failed.
    pub write_failures: usize,
    /// Tenant indexes written (added to or replaced).
    pub tenants_indexed: usize,
    /// Tenant index writes that failed.
    pub index_failures: usize,
    /// Tenants whose index was left untouched because one of their record
    /// writes failed, or because the index could not be read to keep a
    /// skipped row in it.
    pub tenants_deferred: usize,
}

/// Reasons a pass did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncPassError {
    /// Another pass holds the single-flight guard.
    #[error("a sync pass is already in flight")]
    PassInFlight,
    /// The relational read failed.
    #[error(transparent)]
    StoreUnavailable(#[from] InstanceStoreError),
    /// The relational read did not finish in time.
    #[error("instance store read exceeded {timeout:?}")]
    StoreTimeout { timeout: Duration },
    /// Every record write in the pass failed.
    #[error("instance cache rejected every record write: {0}")]
    CacheUnavailable(InstanceCacheError),
}

/// Domain service running single-flight sync passes.
pub struct InstanceSyncService {
    store: Arc<dyn InstanceStore>,
    cache: Arc<dyn InstanceCache>,
    config: InstanceSyncConfig,
    in_flight: Semaphore,
}

impl InstanceSyncService {
    /// Build a sync service over the given ports.
    pub fn new(
        store: Arc<dyn InstanceStore>,
        cache: Arc<dyn InstanceCache>,
        config: InstanceSyncConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
            in_flight: Semaphore::new(1),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &InstanceSyncConfig {
        &self.config
    }

    /// Run one full pass.
    ///
    /// Returns [`SyncPassError::PassInFlight`] without touching either port
    /// when another pass is still running.
    pub async fn run_pass(&self) -> Result<SyncPassReport, SyncPassError> {
        let Ok(_permit) = self.in_flight.try_acquire() else {
            return Err(SyncPassError::PassInFlight);
        };
        debug!(index_mode = ?self.config.index_mode, "sync pass started");

        let rows = self.fetch_rows().await?;
        let mut report = SyncPassReport {
            fetched: rows.len(),
            ..SyncPassReport::default()
        };
        let mut written: BTreeMap<ProjectId, BTreeSet<InstanceId>> = BTreeMap::new();
        let mut undecodable: BTreeMap<ProjectId, BTreeSet<InstanceId>> = BTreeMap::new();
        let mut deferred: BTreeSet<ProjectId> = BTreeSet::new();
        let mut last_write_error = None;

        for row in &rows {
            let record = match transform(row) {
                Ok(record) => record,
                Err(error) => {
                    warn!(uuid = %row.uuid, %error, "skipping instance row");
                    report.skipped += 1;
                    if let Some((project_id, uuid)) = row_owner(row) {
                        undecodable.entry(project_id).or_default().insert(uuid);
                    }
                    continue;
                }
            };

            if let Err(error) = self.cache.upsert_instance(&record).await {
                warn!(uuid = %record.uuid, %error, "instance record write failed");
                report.write_failures += 1;
                deferred.insert(record.project_id);
                last_write_error = Some(error);
                continue;
            }
            report.written += 1;

            if self.config.index_mode == TenantIndexMode::Accumulate {
                self.add_to_index(&record, &mut report).await;
            }
            let InstanceRecord {
                uuid, project_id, ..
            } = record;
            written.entry(project_id).or_default().insert(uuid);
        }

        if report.written == 0 {
            if let Some(error) = last_write_error {
                return Err(SyncPassError::CacheUnavailable(error));
            }
        }

        match self.config.index_mode {
            TenantIndexMode::Rebuild => {
                self.rebuild_indexes(written, &undecodable, &deferred, &mut report)
                    .await;
            }
            TenantIndexMode::Accumulate => {
                report.tenants_indexed = written.len();
            }
        }

        info!(
            fetched = report.fetched,
            written = report.written,
            skipped = report.skipped,
            retained = report.retained,
            write_failures = report.write_failures,
            tenants_indexed = report.tenants_indexed,
            index_failures = report.index_failures,
            tenants_deferred = report.tenants_deferred,
            "sync pass completed"
        );
        Ok(report)
    }

    async fn fetch_rows(&self) -> Result<Vec<InstanceRow>, SyncPassError> {
        let timeout = self.config.store_timeout;
        match tokio::time::timeout(timeout, self.store.fetch_all_instances()).await {
            Ok(rows) => Ok(rows?),
            Err(_elapsed) => Err(SyncPassError::StoreTimeout { timeout }),
        }
    }

    async fn add_to_index(&self, record: &InstanceRecord, report: &mut SyncPassReport) {
        if let Err(error) = self
            .cache
            .add_to_tenant_index(&record.project_id, &record.uuid)
            .await
        {
            warn!(
                uuid = %record.uuid,
                project_id = %record.project_id,
                %error,
                "tenant index insert failed"
            );
            report.index_failures += 1;
        }
    }

    async fn rebuild_indexes(
        &self,
        mut desired: BTreeMap<ProjectId, BTreeSet<InstanceId>>,
        undecodable: &BTreeMap<ProjectId, BTreeSet<InstanceId>>,
        deferred: &BTreeSet<ProjectId>,
        report: &mut SyncPassReport,
    ) {
        for project_id in undecodable.keys() {
            desired.entry(project_id.clone()).or_default();
        }
        match self.cache.indexed_tenants().await {
            Ok(existing) => {
                for project_id in existing {
                    desired.entry(project_id).or_default();
                }
            }
            Err(error) => {
                warn!(%error, "could not enumerate cached tenants; vanished tenants keep their index");
            }
        }

        // Tenants whose only rows failed to write never reach `desired`
        // unless the cache already indexes them.
        report.tenants_deferred += deferred
            .iter()
            .filter(|project_id| !desired.contains_key(*project_id))
            .count();

        for (project_id, mut members) in desired {
            if deferred.contains(&project_id) {
                debug!(%project_id, "tenant index left untouched after a failed record write");
                report.tenants_deferred += 1;
                continue;
            }
            if let Some(skipped) = undecodable.get(&project_id) {
                match self.cache.tenant_members(&project_id).await {
                    Ok(current) => {
                        let kept: Vec<InstanceId> =
                            current.intersection(skipped).cloned().collect();
                        report.retained += kept.len();
                        members.extend(kept);
                    }
                    Err(error) => {
                        warn!(%project_id, %error, "tenant index unreadable; left untouched");
                        report.tenants_deferred += 1;
                        continue;
                    }
                }
            }
            match self.cache.replace_tenant_index(&project_id, &members).await {
                Ok(()) => report.tenants_indexed += 1,
                Err(error) => {
                    warn!(%project_id, %error, "tenant index replace failed");
                    report.index_failures += 1;
                }
            }
        }
    }
}

/// Tenant and uuid of a row, when both are valid identifiers.
fn row_owner(row: &InstanceRow) -> Option<(ProjectId, InstanceId)> {
    let project_id = ProjectId::new(row.project_id.clone()?).ok()?;
    let uuid = InstanceId::new(row.uuid.clone()).ok()?;
    Some((project_id, uuid))
}
