//! Domain types for least-privilege role review.

#![forbid(unsafe_code)]

mod activity;
mod catalog;
mod review;

pub use activity::{Activity, AuditActivity, ModifiedProperty, TargetResource};
pub use catalog::{
    PermissionCondition, PermissionSet, ResourceAction, RoleDefinition, RoleSummary,
    namespace_entity_key,
};
pub use review::{
    ActivityReviewResult, REJECTED_SCORE, ReviewJobResult, ReviewSubject, RoleEvaluationResult,
    RoleGrant, RoleScoreCard, SuggestedRoleChanges, UserContext, UserReviewResult,
};
