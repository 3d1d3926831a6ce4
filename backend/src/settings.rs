//! Daemon configuration loaded via OrthoConfig.
//!
//! Values layer as defaults, then configuration file, then `INSTANCE_SYNC_*`
//! environment variables, then command-line flags.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{InstanceSyncConfig, SyncSchedulerConfig, TenantIndexMode};
use crate::outbound::persistence::PoolConfig;

/// Configuration for the sync daemon.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "INSTANCE_SYNC")]
pub struct SyncSettings {
    /// PostgreSQL URL of the compute database.
    pub database_url: Option<String>,
    /// Redis URL of the instance cache.
    pub redis_url: Option<String>,
    /// Seconds between pass starts.
    #[ortho_config(default = 60)]
    pub sync_interval_secs: u64,
    /// Upper bound in seconds on the relational bulk read.
    #[ortho_config(default = 30)]
    pub store_timeout_secs: u64,
    /// Cap in seconds on the failure backoff.
    #[ortho_config(default = 300)]
    pub max_backoff_secs: u64,
    /// Only ever add to tenant indexes instead of rebuilding them.
    #[ortho_config(default = false)]
    pub accumulate_tenant_index: bool,
    /// Maximum pooled relational connections.
    #[ortho_config(default = 4)]
    pub db_pool_size: u32,
}

impl SyncSettings {
    /// Return the database URL when one is configured and non-blank.
    pub fn database_url(&self) -> Option<&str> {
        non_blank(self.database_url.as_deref())
    }

    /// Return the Redis URL when one is configured and non-blank.
    pub fn redis_url(&self) -> Option<&str> {
        non_blank(self.redis_url.as_deref())
    }

    /// Sync pass configuration derived from these settings.
    pub fn sync_config(&self) -> InstanceSyncConfig {
        InstanceSyncConfig {
            store_timeout: Duration::from_secs(self.store_timeout_secs.max(1)),
            index_mode: if self.accumulate_tenant_index {
                TenantIndexMode::Accumulate
            } else {
                TenantIndexMode::Rebuild
            },
        }
    }

    /// Scheduler timing derived from these settings.
    ///
    /// A zero interval is raised to one second.
    pub fn scheduler_config(&self) -> SyncSchedulerConfig {
        SyncSchedulerConfig {
            interval: Duration::from_secs(self.sync_interval_secs.max(1)),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
        }
    }

    /// Pool configuration for `database_url`.
    pub fn pool_config(&self, database_url: &str) -> PoolConfig {
        PoolConfig::new(database_url)
            .with_max_size(self.db_pool_size.max(1))
            .with_connection_timeout(Duration::from_secs(self.store_timeout_secs.max(1)))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|raw| !raw.trim().is_empty())
}
