//! Cache-backed read path for tenant-scoped instance listings.
//!
//! Listings never touch the relational store. The tenant index is resolved
//! first, then each member record is fetched; members whose record is missing
//! or unreadable are dropped from the result, which is how a listing tolerates
//! a pass that has written the index but not yet every record.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use super::ports::{InstanceCache, InstanceCacheError};
use super::{InstanceId, InstanceRecord, ProjectId};

/// Which tenants a listing covers.
///
/// Whether a caller may use [`ListingScope::AllTenants`] is decided by the
/// caller's authorisation layer, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingScope {
    /// Instances owned by one tenant.
    Tenant(ProjectId),
    /// Instances of every indexed tenant.
    AllTenants,
}

/// Errors surfaced by the listing service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceListingError {
    /// The tenant index could not be read.
    #[error("instance listing unavailable: {0}")]
    CacheUnavailable(#[from] InstanceCacheError),
}

/// Lists cached instance records.
#[derive(Clone)]
pub struct InstanceListingService {
    cache: Arc<dyn InstanceCache>,
}

impl InstanceListingService {
    /// Build the service over a cache port.
    pub fn new(cache: Arc<dyn InstanceCache>) -> Self {
        Self { cache }
    }

    /// List the records visible in `scope`, sorted by instance id.
    ///
    /// An unknown tenant yields an empty list.
    pub async fn list_instances(
        &self,
        scope: &ListingScope,
    ) -> Result<Vec<InstanceRecord>, InstanceListingError> {
        let members = self.resolve_members(scope).await?;
        let fetches = members.iter().map(|uuid| self.fetch_member(uuid));
        Ok(join_all(fetches).await.into_iter().flatten().collect())
    }

    async fn resolve_members(
        &self,
        scope: &ListingScope,
    ) -> Result<BTreeSet<InstanceId>, InstanceListingError> {
        match scope {
            ListingScope::Tenant(project_id) => Ok(self.cache.tenant_members(project_id).await?),
            ListingScope::AllTenants => {
                let mut members = BTreeSet::new();
                for project_id in self.cache.indexed_tenants().await? {
                    members.extend(self.cache.tenant_members(&project_id).await?);
                }
                Ok(members)
            }
        }
    }

    async fn fetch_member(&self, uuid: &InstanceId) -> Option<InstanceRecord> {
        match self.cache.fetch_instance(uuid).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                debug!(%uuid, "indexed instance has no cached record yet");
                None
            }
            Err(error) => {
                warn!(%uuid, %error, "dropping instance with unreadable cache record");
                None
            }
        }
    }
}
