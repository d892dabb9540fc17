use std::sync::Arc;

use rolereaper_domain::{PermissionCondition, TargetResource};

use crate::ownership_resolver::OwnershipResolver;

/// Decides whether a permission set's condition holds for a user and target.
#[derive(Clone)]
pub struct ConditionEvaluator {
    ownership: Arc<OwnershipResolver>,
}

impl ConditionEvaluator {
    /// Creates an evaluator backed by a run-scoped ownership resolver.
    #[must_use]
    pub fn new(ownership: Arc<OwnershipResolver>) -> Self {
        Self { ownership }
    }

    /// Returns whether `condition` is satisfied for `user_id` acting on `target`.
    pub async fn is_satisfied(
        &self,
        condition: PermissionCondition,
        user_id: &str,
        target: &TargetResource,
    ) -> bool {
        match condition {
            PermissionCondition::TenantWide => true,
            PermissionCondition::ResourceIsSelf => target.is_subject(user_id),
            PermissionCondition::SubjectIsOwner => self.ownership.is_owner(user_id, target).await,
        }
    }
}
