//! Instance data model: the raw joined row and the denormalised cache record.
//!
//! [`InstanceRow`] mirrors one row of the `instances ⋈ instance_extra` join as
//! read from the compute database. [`InstanceRecord`] is the flattened form
//! held in the cache; it is always written wholesale and encodes to a flat
//! field map so cache adapters can store it as a hash.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use super::identifiers::{InstanceId, ProjectId};

/// Cache field names used by [`InstanceRecord::to_fields`].
pub mod fields {
    pub const UUID: &str = "uuid";
    pub const PROJECT_ID: &str = "project_id";
    pub const USER_ID: &str = "user_id";
    pub const HOSTNAME: &str = "hostname";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const IMAGE_REF: &str = "image_ref";
    pub const HOST: &str = "host";
    pub const AVAILABILITY_ZONE: &str = "availability_zone";
    pub const POWER_STATE: &str = "power_state";
    pub const VM_STATE: &str = "vm_state";
    pub const TASK_STATE: &str = "task_state";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
    pub const STATUS: &str = "status";
    pub const FLAVOR_DISK: &str = "flavor.disk";
    pub const FLAVOR_VCPUS: &str = "flavor.vcpus";
    pub const FLAVOR_RAM: &str = "flavor.ram";
    pub const FLAVOR_ID: &str = "flavor.id";
    pub const FLAVOR_NAME: &str = "flavor.name";
}

/// One row of the instances/extra-attributes join.
///
/// Nullable columns stay optional; the transformer decides which of them are
/// required.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstanceRow {
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
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Serialised flavor descriptor from `instance_extra.flavor`.
    pub flavor: Option<String>,
}

/// Flavor attributes exposed on the listing surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlavorSummary {
    /// Ephemeral disk size in GiB.
    pub disk: u64,
    pub vcpus: u32,
    /// Memory in MiB.
    pub ram: u64,
    pub id: String,
    pub name: String,
}

/// Denormalised instance record held in the cache under `instance:<uuid>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    pub uuid: InstanceId,
    pub project_id: ProjectId,
    pub user_id: Option<String>,
    pub hostname: Option<String>,
    pub display_name: Option<String>,
    pub image_ref: Option<String>,
    pub host: Option<String>,
    pub availability_zone: Option<String>,
    pub power_state: Option<i32>,
    pub vm_state: Option<String>,
    pub task_state: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Status derived from `vm_state`/`task_state` at transform time.
    pub status: String,
    pub flavor: FlavorSummary,
}

/// Errors raised when a cached field map cannot be decoded into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordFieldError {
    /// A required field is absent.
    #[error("cached instance record is missing field `{field}`")]
    Missing { field: &'static str },
    /// A field is present but cannot be parsed.
    #[error("cached instance field `{field}` is invalid: {message}")]
    Invalid { field: &'static str, message: String },
}

impl InstanceRecord {
    /// Encode the record as a flat field map. Absent optional values are
    /// omitted rather than stored as empty strings.
    pub fn to_fields(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        let mut put = |field: &str, value: String| {
            map.insert(field.to_owned(), value);
        };

        put(fields::UUID, self.uuid.to_string());
        put(fields::PROJECT_ID, self.project_id.to_string());
        put(fields::STATUS, self.status.clone());
        put(fields::FLAVOR_DISK, self.flavor.disk.to_string());
        put(fields::FLAVOR_VCPUS, self.flavor.vcpus.to_string());
        put(fields::FLAVOR_RAM, self.flavor.ram.to_string());
        put(fields::FLAVOR_ID, self.flavor.id.clone());
        put(fields::FLAVOR_NAME, self.flavor.name.clone());

        let optional = [
            (fields::USER_ID, self.user_id.clone()),
            (fields::HOSTNAME, self.hostname.clone()),
            (fields::DISPLAY_NAME, self.display_name.clone()),
            (fields::IMAGE_REF, self.image_ref.clone()),
            (fields::HOST, self.host.clone()),
            (fields::AVAILABILITY_ZONE, self.availability_zone.clone()),
            (fields::POWER_STATE, self.power_state.map(|v| v.to_string())),
            (fields::VM_STATE, self.vm_state.clone()),
            (fields::TASK_STATE, self.task_state.clone()),
            (fields::CREATED_AT, self.created_at.map(format_timestamp)),
            (fields::UPDATED_AT, self.updated_at.map(format_timestamp)),
        ];
        for (field, value) in optional {
            if let Some(value) = value {
                put(field, value);
            }
        }
        map
    }

    /// Decode a record from a field map produced by [`Self::to_fields`].
    pub fn from_fields(map: &BTreeMap<String, String>) -> Result<Self, RecordFieldError> {
        let uuid = InstanceId::new(required(map, fields::UUID)?)
            .map_err(|err| invalid(fields::UUID, err))?;
        let project_id = ProjectId::new(required(map, fields::PROJECT_ID)?)
            .map_err(|err| invalid(fields::PROJECT_ID, err))?;

        let flavor = FlavorSummary {
            disk: parse_required(map, fields::FLAVOR_DISK)?,
            vcpus: parse_required(map, fields::FLAVOR_VCPUS)?,
            ram: parse_required(map, fields::FLAVOR_RAM)?,
            id: required(map, fields::FLAVOR_ID)?,
            name: required(map, fields::FLAVOR_NAME)?,
        };

        Ok(Self {
            uuid,
            project_id,
            user_id: optional(map, fields::USER_ID),
            hostname: optional(map, fields::HOSTNAME),
            display_name: optional(map, fields::DISPLAY_NAME),
            image_ref: optional(map, fields::IMAGE_REF),
            host: optional(map, fields::HOST),
            availability_zone: optional(map, fields::AVAILABILITY_ZONE),
            power_state: optional(map, fields::POWER_STATE)
                .map(|raw| raw.parse::<i32>().map_err(|err| invalid(fields::POWER_STATE, err)))
                .transpose()?,
            vm_state: optional(map, fields::VM_STATE),
            task_state: optional(map, fields::TASK_STATE),
            created_at: parse_timestamp(map, fields::CREATED_AT)?,
            updated_at: parse_timestamp(map, fields::UPDATED_AT)?,
            status: required(map, fields::STATUS)?,
            flavor,
        })
    }
}

/// Render a timestamp the way cached records store it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn invalid(field: &'static str, err: impl std::fmt::Display) -> RecordFieldError {
    RecordFieldError::Invalid {
        field,
        message: err.to_string(),
    }
}

fn optional(map: &BTreeMap<String, String>, field: &str) -> Option<String> {
    map.get(field).cloned()
}

fn required(map: &BTreeMap<String, String>, field: &'static str) -> Result<String, RecordFieldError> {
    map.get(field)
        .cloned()
        .ok_or(RecordFieldError::Missing { field })
}

fn parse_required<T>(map: &BTreeMap<String, String>, field: &'static str) -> Result<T, RecordFieldError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    required(map, field)?
        .parse()
        .map_err(|err| invalid(field, err))
}

fn parse_timestamp(
    map: &BTreeMap<String, String>,
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, RecordFieldError> {
    map.get(field)
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|err| invalid(field, err))
        })
        .transpose()
}
