use async_trait::async_trait;
use rolereaper_core::{AppResult, TenantId};
use rolereaper_domain::{Activity, RoleDefinition};

/// Read-only port onto the role, activity and assignment catalog.
#[async_trait]
pub trait PermissionCatalog: Send + Sync {
    /// Lists every role definition available in the tenant.
    async fn list_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>>;

    /// Lists the ids of roles currently assigned to a user.
    async fn list_current_role_ids(
        &self,
        tenant_id: TenantId,
        user_id: &str,
    ) -> AppResult<Vec<String>>;

    /// Returns the catalog activities matching the given audit names.
    ///
    /// Names compare case-insensitively. Unknown names are omitted.
    async fn list_activities(
        &self,
        tenant_id: TenantId,
        activity_names: &[String],
    ) -> AppResult<Vec<Activity>>;
}
