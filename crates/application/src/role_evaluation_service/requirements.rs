use async_trait::async_trait;
use rolereaper_core::AppResult;

use super::RoleEvaluationContext;

/// Hard gate a context must pass before any evaluator runs.
#[async_trait]
pub trait RoleRequirement: Send + Sync {
    /// Returns the requirement name used in logs.
    fn name(&self) -> &'static str;

    /// Returns whether the context satisfies the requirement.
    async fn is_satisfied(&self, context: &RoleEvaluationContext<'_>) -> AppResult<bool>;
}

/// Requires the role to contain at least one of the activity's mapped actions.
pub struct ActivityActionRequirement;

#[async_trait]
impl RoleRequirement for ActivityActionRequirement {
    fn name(&self) -> &'static str {
        "ActivityAction"
    }

    async fn is_satisfied(&self, context: &RoleEvaluationContext<'_>) -> AppResult<bool> {
        let role = context.role()?;
        let activity = context.activity()?;

        Ok(role.resource_actions().any(|granted| {
            activity
                .mapped_actions()
                .any(|required| required == granted.action())
        }))
    }
}
