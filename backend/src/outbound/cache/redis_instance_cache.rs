//! Redis-backed implementation of the `InstanceCache` port.
//!
//! Key layout:
//! - `instance:<uuid>` is a hash of the record's encoded fields.
//! - `tenant:<project_id>` is a set of instance uuids.
//!
//! Keys carry no TTL; a later pass overwrites them.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::{Pool, PooledConnection, RunError};
use bb8_redis::redis::{self, RedisError};
use tracing::debug;

use crate::domain::ports::{InstanceCache, InstanceCacheError};
use crate::domain::{InstanceId, InstanceRecord, ProjectId};

const INSTANCE_KEY_PREFIX: &str = "instance:";
const TENANT_KEY_PREFIX: &str = "tenant:";
const SCAN_BATCH: usize = 100;

pub(crate) fn instance_key(instance_id: &InstanceId) -> String {
    format!("{INSTANCE_KEY_PREFIX}{instance_id}")
}

pub(crate) fn tenant_key(project_id: &ProjectId) -> String {
    format!("{TENANT_KEY_PREFIX}{project_id}")
}

/// Recover the tenant id from a `tenant:<project_id>` key.
pub(crate) fn project_from_tenant_key(key: &str) -> Option<ProjectId> {
    key.strip_prefix(TENANT_KEY_PREFIX)
        .and_then(|raw| ProjectId::new(raw).ok())
}

fn map_redis_error(error: RedisError) -> InstanceCacheError {
    InstanceCacheError::unavailable(error.to_string())
}

fn map_run_error(error: RunError<RedisError>) -> InstanceCacheError {
    match error {
        RunError::User(err) => map_redis_error(err),
        RunError::TimedOut => InstanceCacheError::unavailable("redis connection checkout timed out"),
    }
}

/// Pooled Redis cache adapter.
#[derive(Clone)]
pub struct RedisInstanceCache {
    pool: Pool<RedisConnectionManager>,
}

impl RedisInstanceCache {
    /// Wrap an existing connection pool.
    pub fn new(pool: Pool<RedisConnectionManager>) -> Self {
        Self { pool }
    }

    /// Build a pool for `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceCacheError::Unavailable`] when the URL is invalid or
    /// the initial connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, InstanceCacheError> {
        let manager = RedisConnectionManager::new(redis_url).map_err(map_redis_error)?;
        let pool = Pool::builder()
            .build(manager)
            .await
            .map_err(map_redis_error)?;
        Ok(Self::new(pool))
    }

    async fn connection(
        &self,
    ) -> Result<PooledConnection<'_, RedisConnectionManager>, InstanceCacheError> {
        self.pool.get().await.map_err(map_run_error)
    }
}

#[async_trait]
impl InstanceCache for RedisInstanceCache {
    async fn upsert_instance(&self, record: &InstanceRecord) -> Result<(), InstanceCacheError> {
        let key = instance_key(&record.uuid);
        let fields: Vec<(String, String)> = record.to_fields().into_iter().collect();
        let mut conn = self.connection().await?;
        // Dropping the old hash first clears fields that became null.
        let () = redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .hset_multiple(&key, fields.as_slice())
            .ignore()
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn add_to_tenant_index(
        &self,
        project_id: &ProjectId,
        instance_id: &InstanceId,
    ) -> Result<(), InstanceCacheError> {
        let mut conn = self.connection().await?;
        let _added: i64 = redis::cmd("SADD")
            .arg(tenant_key(project_id))
            .arg(instance_id.as_str())
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn replace_tenant_index(
        &self,
        project_id: &ProjectId,
        members: &BTreeSet<InstanceId>,
    ) -> Result<(), InstanceCacheError> {
        let key = tenant_key(project_id);
        let mut conn = self.connection().await?;
        if members.is_empty() {
            let _removed: i64 = redis::cmd("DEL")
                .arg(&key)
                .query_async(&mut *conn)
                .await
                .map_err(map_redis_error)?;
            return Ok(());
        }
        let ids: Vec<&str> = members.iter().map(InstanceId::as_str).collect();
        let () = redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .sadd(&key, ids)
            .ignore()
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn tenant_members(
        &self,
        project_id: &ProjectId,
    ) -> Result<BTreeSet<InstanceId>, InstanceCacheError> {
        let mut conn = self.connection().await?;
        let raw: Vec<String> = redis::cmd("SMEMBERS")
            .arg(tenant_key(project_id))
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        raw.into_iter()
            .map(|member| {
                InstanceId::try_from(member)
                    .map_err(|err| InstanceCacheError::corrupt(err.to_string()))
            })
            .collect()
    }

    async fn indexed_tenants(&self) -> Result<BTreeSet<ProjectId>, InstanceCacheError> {
        let mut conn = self.connection().await?;
        let pattern = format!("{TENANT_KEY_PREFIX}*");
        let mut tenants = BTreeSet::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn)
                .await
                .map_err(map_redis_error)?;
            for key in keys {
                match project_from_tenant_key(&key) {
                    Some(project_id) => {
                        tenants.insert(project_id);
                    }
                    None => debug!(%key, "ignoring malformed tenant key"),
                }
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(tenants)
    }

    async fn fetch_instance(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Option<InstanceRecord>, InstanceCacheError> {
        let mut conn = self.connection().await?;
        let fields: BTreeMap<String, String> = redis::cmd("HGETALL")
            .arg(instance_key(instance_id))
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        if fields.is_empty() {
            return Ok(None);
        }
        InstanceRecord::from_fields(&fields)
            .map(Some)
            .map_err(|err| InstanceCacheError::corrupt(err.to_string()))
    }
}
