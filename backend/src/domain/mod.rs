//! Domain primitives and services for the instance cache.
//!
//! Purpose: keep the denormalised instance cache in step with the compute
//! database and serve tenant listings from that cache alone.
//!
//! Public surface:
//! - `InstanceRow` / `InstanceRecord`: joined source row and cached record.
//! - `transform`: pure row-to-record mapping, including `status_from_state`.
//! - `InstanceSyncService`: one single-flight full-table pass.
//! - `SyncScheduler`: recurring driver for sync passes.
//! - `InstanceListingService`: cache-only read path.

pub mod identifiers;
pub mod instance;
pub mod instance_listing;
pub mod instance_sync;
pub mod ports;
pub mod status;
pub mod sync_scheduler;
pub mod transform;

pub use self::identifiers::{IdentifierValidationError, InstanceId, ProjectId};
pub use self::instance::{FlavorSummary, InstanceRecord, InstanceRow, RecordFieldError};
pub use self::instance_listing::{InstanceListingError, InstanceListingService, ListingScope};
pub use self::instance_sync::{
    InstanceSyncConfig, InstanceSyncService, SyncPassError, SyncPassReport, TenantIndexMode,
};
pub use self::status::status_from_state;
pub use self::sync_scheduler::{
    SchedulerStatus, SyncCycleState, SyncScheduler, SyncSchedulerConfig,
};
pub use self::transform::{RecordDecodeError, decode_flavor, transform};
