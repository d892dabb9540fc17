use std::collections::HashMap;

use async_trait::async_trait;
use rolereaper_application::PermissionCatalog;
use rolereaper_core::{AppResult, TenantId};
use rolereaper_domain::{Activity, RoleDefinition};

use crate::directory_snapshot::{DirectorySnapshot, TenantSnapshot};

#[derive(Debug, Default)]
struct TenantCatalog {
    roles: Vec<RoleDefinition>,
    activities: Vec<Activity>,
    assignments: HashMap<String, Vec<String>>,
}

impl From<&TenantSnapshot> for TenantCatalog {
    fn from(tenant: &TenantSnapshot) -> Self {
        let assignments = tenant
            .users
            .iter()
            .map(|user| {
                let mut role_ids: Vec<String> = Vec::new();
                for role_id in user.active_role_ids.iter().chain(&user.eligible_role_ids) {
                    if !role_ids.iter().any(|known| known.eq_ignore_ascii_case(role_id)) {
                        role_ids.push(role_id.clone());
                    }
                }
                (user.id.to_ascii_lowercase(), role_ids)
            })
            .collect();

        Self {
            roles: tenant.roles.clone(),
            activities: tenant.activities.clone(),
            assignments,
        }
    }
}

/// Permission catalog served from a directory snapshot.
#[derive(Debug, Default)]
pub struct InMemoryPermissionCatalog {
    tenants: HashMap<TenantId, TenantCatalog>,
}

impl InMemoryPermissionCatalog {
    /// Creates a catalog holding every tenant of the snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &DirectorySnapshot) -> Self {
        let tenants = snapshot
            .tenants
            .iter()
            .map(|tenant| (tenant.tenant_id, TenantCatalog::from(tenant)))
            .collect();

        Self { tenants }
    }
}

#[async_trait]
impl PermissionCatalog for InMemoryPermissionCatalog {
    async fn list_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>> {
        Ok(self
            .tenants
            .get(&tenant_id)
            .map(|catalog| {
                catalog
                    .roles
                    .iter()
                    .filter(|role| role.is_enabled())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_current_role_ids(
        &self,
        tenant_id: TenantId,
        user_id: &str,
    ) -> AppResult<Vec<String>> {
        Ok(self
            .tenants
            .get(&tenant_id)
            .and_then(|catalog| catalog.assignments.get(&user_id.to_ascii_lowercase()))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_activities(
        &self,
        tenant_id: TenantId,
        activity_names: &[String],
    ) -> AppResult<Vec<Activity>> {
        Ok(self
            .tenants
            .get(&tenant_id)
            .map(|catalog| {
                catalog
                    .activities
                    .iter()
                    .filter(|activity| {
                        activity_names
                            .iter()
                            .any(|name| activity.is_named(name.as_str()))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
