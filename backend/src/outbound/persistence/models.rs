//! Internal Diesel row shapes.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::InstanceRow;

/// One `instances` row joined with its `instance_extra` flavor column.
///
/// Field order matches the select tuple in the store adapter.
#[derive(Debug, Clone, Queryable)]
pub(crate) struct InstanceJoinRow {
    pub uuid: String,
    pub project_id: Option<String>,
    pub user_id: Option<String>,
    pub hostname: Option<String>,
    pub display_name: Option<String>,
    pub image_ref: Option<String>,
    pub host: Option<String>,
    pub availability_zone: Option<String>,
    pub power_state: Option<i32>,
    pub vm_state: Option<String>,
    pub task_state: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub flavor: Option<String>,
}

impl From<InstanceJoinRow> for InstanceRow {
    fn from(row: InstanceJoinRow) -> Self {
        // Compute timestamps are stored as naive UTC.
        Self {
            uuid: row.uuid,
            project_id: row.project_id,
            user_id: row.user_id,
            hostname: row.hostname,
            display_name: row.display_name,
            image_ref: row.image_ref,
            host: row.host,
            availability_zone: row.availability_zone,
            power_state: row.power_state,
            vm_state: row.vm_state,
            task_state: row.task_state,
            created_at: row.created_at.map(|at| at.and_utc()),
            updated_at: row.updated_at.map(|at| at.and_utc()),
            flavor: row.flavor,
        }
    }
}
