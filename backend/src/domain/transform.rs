//! Pure mapping from a joined [`InstanceRow`] to a cached [`InstanceRecord`].
//!
//! The flavor column holds a serialised versioned object shaped like
//! `{"cur": {"nova_object.data": {...}}}`. Only the current flavor is
//! decoded; the `old`/`new` resize slots are ignored.

use serde::Deserialize;
use thiserror::Error;

use super::identifiers::{InstanceId, ProjectId};
use super::instance::{FlavorSummary, InstanceRecord, InstanceRow};
use super::status::status_from_state;

const FLAVOR_DATA_KEY: &str = "nova_object.data";

/// Reasons a row cannot be turned into a cache record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordDecodeError {
    /// The joined row carries no flavor payload.
    #[error("instance {uuid} has no flavor payload")]
    MissingFlavor { uuid: String },
    /// The flavor payload is not the expected versioned object.
    #[error("instance {uuid} has a malformed flavor payload: {message}")]
    MalformedFlavor { uuid: String, message: String },
    /// The uuid or project identifier is absent or malformed.
    #[error("instance {uuid} has an invalid {field}: {message}")]
    InvalidIdentifier {
        uuid: String,
        field: &'static str,
        message: String,
    },
}

#[derive(Deserialize)]
struct FlavorEnvelope {
    cur: CurrentFlavor,
}

#[derive(Deserialize)]
struct CurrentFlavor {
    #[serde(rename = "nova_object.data")]
    data: FlavorData,
}

#[derive(Deserialize)]
struct FlavorData {
    ephemeral_gb: u64,
    vcpus: u32,
    memory_mb: u64,
    flavorid: String,
    name: String,
}

/// Decode the serialised flavor descriptor into a [`FlavorSummary`].
///
/// # Examples
/// ```
/// use instance_sync::domain::decode_flavor;
///
/// let payload = r#"{"cur": {"nova_object.data": {
///     "ephemeral_gb": 20, "vcpus": 2, "memory_mb": 2048,
///     "flavorid": "f1", "name": "small"}}}"#;
/// let flavor = decode_flavor("u1", payload).expect("valid payload");
/// assert_eq!(flavor.ram, 2048);
/// assert_eq!(flavor.disk, 20);
/// ```
pub fn decode_flavor(uuid: &str, payload: &str) -> Result<FlavorSummary, RecordDecodeError> {
    let envelope: FlavorEnvelope =
        serde_json::from_str(payload).map_err(|err| RecordDecodeError::MalformedFlavor {
            uuid: uuid.to_owned(),
            message: format!("{err} (expected cur.{FLAVOR_DATA_KEY})"),
        })?;
    let FlavorData {
        ephemeral_gb,
        vcpus,
        memory_mb,
        flavorid,
        name,
    } = envelope.cur.data;

    Ok(FlavorSummary {
        disk: ephemeral_gb,
        vcpus,
        ram: memory_mb,
        id: flavorid,
        name,
    })
}

/// Transform one joined row into its denormalised cache record.
///
/// The function performs no I/O. It fails when the row's identifiers are
/// unusable as cache keys or its flavor payload cannot be decoded; callers
/// skip such rows.
pub fn transform(row: &InstanceRow) -> Result<InstanceRecord, RecordDecodeError> {
    let uuid = InstanceId::new(row.uuid.clone()).map_err(|err| {
        RecordDecodeError::InvalidIdentifier {
            uuid: row.uuid.clone(),
            field: "uuid",
            message: err.to_string(),
        }
    })?;
    let project_id = ProjectId::new(row.project_id.clone().unwrap_or_default()).map_err(|err| {
        RecordDecodeError::InvalidIdentifier {
            uuid: row.uuid.clone(),
            field: "project_id",
            message: err.to_string(),
        }
    })?;
    let payload = row
        .flavor
        .as_deref()
        .ok_or_else(|| RecordDecodeError::MissingFlavor {
            uuid: row.uuid.clone(),
        })?;
    let flavor = decode_flavor(&row.uuid, payload)?;
    let status = status_from_state(row.vm_state.as_deref(), row.task_state.as_deref());

    Ok(InstanceRecord {
        uuid,
        project_id,
        user_id: row.user_id.clone(),
        hostname: row.hostname.clone(),
        display_name: row.display_name.clone(),
        image_ref: row.image_ref.clone(),
        host: row.host.clone(),
        availability_zone: row.availability_zone.clone(),
        power_state: row.power_state,
        vm_state: row.vm_state.clone(),
        task_state: row.task_state.clone(),
        created_at: row.created_at,
        updated_at: row.updated_at,
        status: status.to_owned(),
        flavor,
    })
}
