use std::sync::Arc;

use rolereaper_core::{AppResult, TenantId};
use rolereaper_domain::{
    Activity, RoleDefinition, RoleSummary, SuggestedRoleChanges, TargetResource,
};

use crate::activity_permission_analyzer::ActivityPermissionAnalyzer;
use crate::review_ports::PermissionCatalog;

/// Turns pipeline output into role suggestions and deltas for one tenant.
#[derive(Clone)]
pub struct RoleAdvisor {
    tenant_id: TenantId,
    analyzer: ActivityPermissionAnalyzer,
    catalog: Arc<dyn PermissionCatalog>,
    roles: Arc<Vec<RoleDefinition>>,
}

impl RoleAdvisor {
    /// Creates an advisor over an already loaded role catalog.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        analyzer: ActivityPermissionAnalyzer,
        catalog: Arc<dyn PermissionCatalog>,
        roles: Arc<Vec<RoleDefinition>>,
    ) -> Self {
        Self {
            tenant_id,
            analyzer,
            catalog,
            roles,
        }
    }

    /// Creates an advisor after loading the tenant's role catalog.
    pub async fn load(
        tenant_id: TenantId,
        analyzer: ActivityPermissionAnalyzer,
        catalog: Arc<dyn PermissionCatalog>,
    ) -> AppResult<Self> {
        let roles = catalog.list_roles(tenant_id).await?;
        Ok(Self::new(tenant_id, analyzer, catalog, Arc::new(roles)))
    }

    /// Returns the role catalog the advisor resolves against.
    #[must_use]
    pub fn roles(&self) -> &[RoleDefinition] {
        self.roles.as_slice()
    }

    /// Runs the pipeline for every target and unions the resulting roles.
    ///
    /// Roles are de-duplicated by id and keep first-seen order.
    pub async fn get_suggested_roles(
        &self,
        activity: &Activity,
        targets: &[TargetResource],
        user_id: &str,
    ) -> Vec<&RoleDefinition> {
        let mut suggested: Vec<&RoleDefinition> = Vec::new();

        for target in targets {
            let grants = self
                .analyzer
                .find_least_privileged_roles(user_id, activity, target, self.roles())
                .await;

            for grant in grants {
                let role = grant.role();
                if !suggested.iter().any(|known| known.id() == role.id()) {
                    suggested.push(role);
                }
            }
        }

        suggested
    }

    /// Returns the role ids currently assigned to the user.
    pub async fn current_role_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        self.catalog
            .list_current_role_ids(self.tenant_id, user_id)
            .await
    }

    /// Compares suggestions for one activity with the user's current roles.
    pub async fn get_suggested_role_changes(
        &self,
        activity: &Activity,
        targets: &[TargetResource],
        user_id: &str,
    ) -> AppResult<SuggestedRoleChanges> {
        let suggested = self.get_suggested_roles(activity, targets, user_id).await;
        let current = self.current_role_ids(user_id).await?;

        Ok(self.diff_role_sets(&suggested, &current))
    }

    /// Splits suggested and current roles into add, remove and keep sets.
    ///
    /// Role ids compare case-insensitively. Current ids missing from the
    /// catalog are reported through [`RoleSummary::unknown`].
    #[must_use]
    pub fn diff_role_sets(
        &self,
        suggested: &[&RoleDefinition],
        current_role_ids: &[String],
    ) -> SuggestedRoleChanges {
        let is_current = |role_id: &str| {
            current_role_ids
                .iter()
                .any(|id| id.eq_ignore_ascii_case(role_id))
        };
        let is_suggested = |role_id: &str| {
            suggested
                .iter()
                .any(|role| role.id().eq_ignore_ascii_case(role_id))
        };

        let mut changes = SuggestedRoleChanges::default();
        for role in suggested {
            if is_current(role.id()) {
                changes.roles_to_keep.push(role.summary());
            } else {
                changes.roles_to_add.push(role.summary());
            }
        }

        for (index, role_id) in current_role_ids.iter().enumerate() {
            let seen_before = current_role_ids[..index]
                .iter()
                .any(|earlier| earlier.eq_ignore_ascii_case(role_id));
            if seen_before || is_suggested(role_id) {
                continue;
            }

            changes.roles_to_remove.push(self.summarize(role_id));
        }

        changes
    }

    fn summarize(&self, role_id: &str) -> RoleSummary {
        self.roles
            .iter()
            .find(|role| role.id().eq_ignore_ascii_case(role_id))
            .map_or_else(|| RoleSummary::unknown(role_id), RoleDefinition::summary)
    }
}
