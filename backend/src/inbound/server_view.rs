//! Wire shape of the tenant instance listing.
//!
//! Field names follow the compute listing API clients already consume,
//! including the extension-prefixed keys.

use serde::Serialize;

use crate::domain::instance::format_timestamp;
use crate::domain::{FlavorSummary, InstanceRecord};

/// Flavor summary embedded in each server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlavorView {
    pub disk: u64,
    pub vcpus: u32,
    pub ram: u64,
    pub id: String,
    pub name: String,
}

impl From<&FlavorSummary> for FlavorView {
    fn from(flavor: &FlavorSummary) -> Self {
        Self {
            disk: flavor.disk,
            vcpus: flavor.vcpus,
            ram: flavor.ram,
            id: flavor.id.clone(),
            name: flavor.name.clone(),
        }
    }
}

/// One entry of the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerView {
    pub id: String,
    pub name: Option<String>,
    pub status: String,
    #[serde(rename = "OS-EXT-STS:power_state")]
    pub power_state: Option<i32>,
    #[serde(rename = "OS-EXT-STS:task_state")]
    pub task_state: Option<String>,
    #[serde(rename = "OS-EXT-AZ:availability_zone")]
    pub availability_zone: Option<String>,
    #[serde(rename = "OS-EXT-SRV-ATTR:host")]
    pub host: Option<String>,
    #[serde(rename = "OS-SRV-USG:created_at")]
    pub created_at: Option<String>,
    pub tenant_id: String,
    pub flavor: FlavorView,
}

impl From<&InstanceRecord> for ServerView {
    fn from(record: &InstanceRecord) -> Self {
        Self {
            id: record.uuid.to_string(),
            name: record.hostname.clone(),
            status: record.status.clone(),
            power_state: record.power_state,
            task_state: record.task_state.clone(),
            availability_zone: record.availability_zone.clone(),
            host: record.host.clone(),
            created_at: record.created_at.map(format_timestamp),
            tenant_id: record.project_id.to_string(),
            flavor: FlavorView::from(&record.flavor),
        }
    }
}

/// Listing envelope: `{"servers": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerListResponse {
    pub servers: Vec<ServerView>,
}

impl ServerListResponse {
    pub fn from_records(records: &[InstanceRecord]) -> Self {
        Self {
            servers: records.iter().map(ServerView::from).collect(),
        }
    }
}
