//! PostgreSQL-backed `InstanceStore` implementation using Diesel.
//!
//! One pass issues one query: live `instances` rows inner-joined with their
//! live `instance_extra` row on the instance uuid. Instances without an
//! extra row are not returned.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::InstanceRow;
use crate::domain::ports::{InstanceStore, InstanceStoreError};

use super::diesel_helpers::{map_diesel_error, map_pool_error};
use super::models::InstanceJoinRow;
use super::pool::DbPool;
use super::schema::{instance_extra, instances};

/// Diesel-backed implementation of the `InstanceStore` port.
#[derive(Clone)]
pub struct DieselInstanceStore {
    pool: DbPool,
}

impl DieselInstanceStore {
    /// Create a store over the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstanceStore for DieselInstanceStore {
    async fn fetch_all_instances(&self) -> Result<Vec<InstanceRow>, InstanceStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<InstanceJoinRow> = instances::table
            .inner_join(
                instance_extra::table.on(instance_extra::instance_uuid.eq(instances::uuid)),
            )
            .filter(instances::deleted.eq(0))
            .filter(instance_extra::deleted.eq(0))
            .order_by(instances::id)
            .select((
                instances::uuid,
                instances::project_id,
                instances::user_id,
                instances::hostname,
                instances::display_name,
                instances::image_ref,
                instances::host,
                instances::availability_zone,
                instances::power_state,
                instances::vm_state,
                instances::task_state,
                instances::created_at,
                instances::updated_at,
                instance_extra::flavor,
            ))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        debug!(rows = rows.len(), "loaded live instance rows");
        Ok(rows.into_iter().map(InstanceRow::from).collect())
    }
}
