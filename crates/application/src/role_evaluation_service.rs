use std::sync::Arc;

use rolereaper_core::AppResult;
use rolereaper_domain::{
    Activity, REJECTED_SCORE, RoleDefinition, RoleEvaluationResult, TargetResource, UserContext,
};
use tracing::debug;

use crate::ownership_resolver::OwnershipResolver;

mod context;
mod evaluators;
mod requirements;

pub use context::RoleEvaluationContext;
pub use evaluators::{
    ResourceIsSelfEvaluator, ResourceOwnerEvaluator, RoleEvaluator,
    RoleHasRelevantPermissionsEvaluator, RoleIsPrivilegedEvaluator, RoleRelatesToEntityEvaluator,
};
pub use requirements::{ActivityActionRequirement, RoleRequirement};

/// Hard-requirement gate followed by a sum of independent score cards.
#[derive(Clone, Default)]
pub struct RoleEvaluationService {
    requirements: Vec<Arc<dyn RoleRequirement>>,
    evaluators: Vec<Arc<dyn RoleEvaluator>>,
}

impl RoleEvaluationService {
    /// Creates a service with no requirements and no evaluators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service with the reference requirement and evaluators.
    #[must_use]
    pub fn standard(ownership: Arc<OwnershipResolver>) -> Self {
        Self::new()
            .with_requirement(Arc::new(ActivityActionRequirement))
            .with_evaluator(Arc::new(ResourceOwnerEvaluator::new(ownership)))
            .with_evaluator(Arc::new(ResourceIsSelfEvaluator))
            .with_evaluator(Arc::new(RoleIsPrivilegedEvaluator))
            .with_evaluator(Arc::new(RoleHasRelevantPermissionsEvaluator))
            .with_evaluator(Arc::new(RoleRelatesToEntityEvaluator))
    }

    /// Registers a hard requirement.
    #[must_use]
    pub fn with_requirement(mut self, requirement: Arc<dyn RoleRequirement>) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Registers an evaluator; evaluators run in registration order.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn RoleEvaluator>) -> Self {
        self.evaluators.push(evaluator);
        self
    }

    /// Scores one context.
    ///
    /// A context failing any requirement is rejected with [`REJECTED_SCORE`]
    /// and no score cards; evaluators are not consulted.
    pub async fn evaluate(
        &self,
        context: &RoleEvaluationContext<'_>,
    ) -> AppResult<RoleEvaluationResult> {
        for requirement in &self.requirements {
            if !requirement.is_satisfied(context).await? {
                debug!(
                    requirement = requirement.name(),
                    role_id = context.role_id().unwrap_or_default(),
                    "role evaluation rejected by requirement"
                );
                return Ok(RoleEvaluationResult {
                    role: context.role_summary(),
                    target_id: context.target_id(),
                    total_score: REJECTED_SCORE,
                    score_cards: Vec::new(),
                });
            }
        }

        let mut score_cards = Vec::with_capacity(self.evaluators.len());
        for evaluator in &self.evaluators {
            score_cards.push(evaluator.evaluate(context).await?);
        }

        Ok(RoleEvaluationResult {
            role: context.role_summary(),
            target_id: context.target_id(),
            total_score: score_cards.iter().map(|card| card.score).sum(),
            score_cards,
        })
    }

    /// Scores every role and target pair and returns the highest total.
    ///
    /// The first result wins ties. Returns `None` when there are no roles or
    /// no targets.
    pub async fn evaluate_best(
        &self,
        user: &UserContext,
        activity: &Activity,
        targets: &[TargetResource],
        roles: &[&RoleDefinition],
    ) -> AppResult<Option<RoleEvaluationResult>> {
        let mut best: Option<RoleEvaluationResult> = None;

        for role in roles {
            for target in targets {
                let context = RoleEvaluationContext::new(user)
                    .with_role(role)
                    .with_activity(activity)
                    .with_target(target);
                let result = self.evaluate(&context).await?;

                if best
                    .as_ref()
                    .is_none_or(|current| result.total_score > current.total_score)
                {
                    best = Some(result);
                }
            }
        }

        Ok(best)
    }
}
