use std::collections::HashMap;
use std::sync::Arc;

use rolereaper_core::TenantId;
use rolereaper_domain::TargetResource;
use tokio::sync::RwLock;
use tracing::warn;

use crate::review_ports::DirectoryService;

/// Ownership lookups for one review run, memoized per user and target.
///
/// A resolver is bound to one tenant and must be dropped with the run that
/// created it; directory ownership can change between runs.
pub struct OwnershipResolver {
    tenant_id: TenantId,
    directory: Arc<dyn DirectoryService>,
    cache: RwLock<HashMap<(String, String), bool>>,
}

impl OwnershipResolver {
    /// Creates an empty resolver for one tenant.
    #[must_use]
    pub fn new(tenant_id: TenantId, directory: Arc<dyn DirectoryService>) -> Self {
        Self {
            tenant_id,
            directory,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns whether the user owns the target.
    ///
    /// Directory failures are logged and answered with `false`; they are not
    /// cached so a later check may still succeed.
    pub async fn is_owner(&self, user_id: &str, target: &TargetResource) -> bool {
        if target.id().trim().is_empty() {
            return false;
        }

        let key = (user_id.to_ascii_lowercase(), target.id().to_ascii_lowercase());
        if let Some(cached) = self.cache.read().await.get(&key) {
            return *cached;
        }

        match self
            .directory
            .is_owner(self.tenant_id, user_id, target)
            .await
        {
            Ok(is_owner) => {
                self.cache.write().await.insert(key, is_owner);
                is_owner
            }
            Err(error) => {
                warn!(
                    tenant_id = %self.tenant_id,
                    user_id = %user_id,
                    target_id = %target.id(),
                    error = %error,
                    "ownership lookup failed; treating user as non-owner"
                );
                false
            }
        }
    }

    /// Returns the number of memoized answers.
    pub async fn cached_entries(&self) -> usize {
        self.cache.read().await.len()
    }
}
