use std::sync::Arc;

use async_trait::async_trait;
use rolereaper_core::AppResult;
use rolereaper_domain::{ResourceAction, RoleScoreCard};

use super::RoleEvaluationContext;
use crate::ownership_resolver::OwnershipResolver;

/// Independent scorer contributing one card to a role evaluation.
#[async_trait]
pub trait RoleEvaluator: Send + Sync {
    /// Returns the name recorded on produced score cards.
    fn name(&self) -> &'static str;

    /// Scores one context.
    ///
    /// Returns a contract violation when the context lacks a part the
    /// evaluator needs.
    async fn evaluate(&self, context: &RoleEvaluationContext<'_>) -> AppResult<RoleScoreCard>;
}

/// Rewards targets the user owns.
pub struct ResourceOwnerEvaluator {
    ownership: Arc<OwnershipResolver>,
}

impl ResourceOwnerEvaluator {
    /// Creates the evaluator over a run-scoped ownership resolver.
    #[must_use]
    pub fn new(ownership: Arc<OwnershipResolver>) -> Self {
        Self { ownership }
    }
}

#[async_trait]
impl RoleEvaluator for ResourceOwnerEvaluator {
    fn name(&self) -> &'static str {
        "ResourceOwner"
    }

    async fn evaluate(&self, context: &RoleEvaluationContext<'_>) -> AppResult<RoleScoreCard> {
        let target = context.target()?;
        let is_owner = self
            .ownership
            .is_owner(context.user().user_id.as_str(), target)
            .await;

        Ok(if is_owner {
            RoleScoreCard::new(self.name(), 100, "User owns the target resource")
        } else {
            RoleScoreCard::new(self.name(), 0, "User does not own the target resource")
        })
    }
}

/// Rewards activities the user performed on themselves.
pub struct ResourceIsSelfEvaluator;

#[async_trait]
impl RoleEvaluator for ResourceIsSelfEvaluator {
    fn name(&self) -> &'static str {
        "ResourceIsSelf"
    }

    async fn evaluate(&self, context: &RoleEvaluationContext<'_>) -> AppResult<RoleScoreCard> {
        let target = context.target()?;

        Ok(if context.user().is_target(target) {
            RoleScoreCard::new(self.name(), 100, "Target resource is the user")
        } else {
            RoleScoreCard::new(self.name(), 0, "Target resource is not the user")
        })
    }
}

/// Penalizes roles containing privileged actions.
pub struct RoleIsPrivilegedEvaluator;

#[async_trait]
impl RoleEvaluator for RoleIsPrivilegedEvaluator {
    fn name(&self) -> &'static str {
        "RoleIsPrivileged"
    }

    async fn evaluate(&self, context: &RoleEvaluationContext<'_>) -> AppResult<RoleScoreCard> {
        let role = context.role()?;

        Ok(if role.is_privileged() {
            RoleScoreCard::new(self.name(), -50, "Role is privileged")
        } else {
            RoleScoreCard::new(self.name(), 50, "Role is not privileged")
        })
    }
}

/// Scores how many of the activity's actions the tenant-wide set grants.
pub struct RoleHasRelevantPermissionsEvaluator;

#[async_trait]
impl RoleEvaluator for RoleHasRelevantPermissionsEvaluator {
    fn name(&self) -> &'static str {
        "RoleHasRelevantPermissions"
    }

    async fn evaluate(&self, context: &RoleEvaluationContext<'_>) -> AppResult<RoleScoreCard> {
        let role = context.role()?;
        let activity = context.activity()?;

        let granted = role
            .tenant_wide_permission_set()
            .map(|set| set.resource_actions())
            .unwrap_or_default();
        let matching = activity
            .mapped_actions()
            .filter(|required| granted.iter().any(|action| action.action() == *required))
            .count();

        Ok(RoleScoreCard::new(
            self.name(),
            per_mille(matching, granted.len()),
            format!(
                "Role has {matching} out of {} relevant permissions for the activity",
                granted.len()
            ),
        ))
    }
}

/// Scores how much of the tenant-wide set touches the activity's entities.
pub struct RoleRelatesToEntityEvaluator;

#[async_trait]
impl RoleEvaluator for RoleRelatesToEntityEvaluator {
    fn name(&self) -> &'static str {
        "RoleRelatesToEntity"
    }

    async fn evaluate(&self, context: &RoleEvaluationContext<'_>) -> AppResult<RoleScoreCard> {
        let role = context.role()?;
        let activity = context.activity()?;

        let activity_keys = activity.namespace_entity_keys();
        if activity_keys.is_empty() {
            return Ok(RoleScoreCard::new(
                self.name(),
                0,
                "Activity maps to no resource actions",
            ));
        }

        let granted = role
            .tenant_wide_permission_set()
            .map(|set| set.resource_actions())
            .unwrap_or_default();
        if granted.is_empty() {
            return Ok(RoleScoreCard::new(
                self.name(),
                0,
                "Role has no tenant-wide permissions",
            ));
        }

        let related = granted
            .iter()
            .map(ResourceAction::namespace_entity_key)
            .filter(|key| activity_keys.contains(key))
            .count();

        Ok(RoleScoreCard::new(
            self.name(),
            per_mille(related, granted.len()),
            format!(
                "Role has {related} out of {} permissions related to the activity entity",
                granted.len()
            ),
        ))
    }
}

// round(part / total * 1000), half away from zero; zero when total is zero.
fn per_mille(part: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }

    let part = part.min(total) as u64;
    let total = total as u64;
    let scaled = (part * 1000 * 2 + total) / (total * 2);
    i32::try_from(scaled).unwrap_or(1000)
}
