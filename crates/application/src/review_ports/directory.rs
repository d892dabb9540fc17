use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rolereaper_core::{AppResult, TenantId};
use rolereaper_domain::{AuditActivity, ReviewSubject, TargetResource, UserContext};

/// Port onto the external user directory and its audit log.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Returns whether the user is a recorded owner of the target.
    async fn is_owner(
        &self,
        tenant_id: TenantId,
        user_id: &str,
        target: &TargetResource,
    ) -> AppResult<bool>;

    /// Collects audit activities initiated by the user inside the window.
    async fn collect_activities(
        &self,
        tenant_id: TenantId,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<AuditActivity>>;

    /// Resolves users and groups into concrete user ids.
    async fn expand_users_or_groups(
        &self,
        tenant_id: TenantId,
        subjects: &[ReviewSubject],
    ) -> AppResult<Vec<String>>;

    /// Loads a user and their role assignments.
    async fn get_user(&self, tenant_id: TenantId, user_id: &str) -> AppResult<UserContext>;
}
