//! Application services and ports for least-privilege role review.

#![forbid(unsafe_code)]

mod activity_permission_analyzer;
mod condition_evaluator;
mod ownership_resolver;
mod review_coordinator;
mod review_ports;
mod review_service;
mod role_advisor;
mod role_evaluation_service;

#[cfg(test)]
mod test_support;

pub use activity_permission_analyzer::{ActivityPermissionAnalyzer, RelevanceScore};
pub use condition_evaluator::ConditionEvaluator;
pub use ownership_resolver::OwnershipResolver;
pub use review_coordinator::{
    EnqueueReviewInput, ReviewCoordinator, ReviewJobSummary, ReviewResultLookup,
};
pub use review_ports::{
    DirectoryService, PermissionCatalog, ReviewJob, ReviewJobId, ReviewJobListQuery,
    ReviewJobOutcome, ReviewJobRepository, ReviewJobStatus,
};
pub use review_service::{ReviewConcurrency, ReviewService};
pub use role_advisor::RoleAdvisor;
pub use role_evaluation_service::{
    ActivityActionRequirement, ResourceIsSelfEvaluator, ResourceOwnerEvaluator,
    RoleEvaluationContext, RoleEvaluationService, RoleEvaluator,
    RoleHasRelevantPermissionsEvaluator, RoleIsPrivilegedEvaluator, RoleRelatesToEntityEvaluator,
    RoleRequirement,
};
