use std::fmt::{Display, Formatter};

use rolereaper_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};

use crate::activity::TargetResource;
use crate::catalog::{PermissionCondition, PermissionSet, RoleDefinition, RoleSummary};

/// Total score assigned to a context that fails a hard requirement.
pub const REJECTED_SCORE: i32 = -1000;

/// One entry of a review request: a user, or a group expanded to its members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReviewSubject {
    /// A single user id.
    User(String),
    /// A group id whose member users are reviewed.
    Group(String),
}

impl ReviewSubject {
    /// Parses `user:<id>`, `group:<id>` or a bare user id.
    pub fn parse(value: &str) -> AppResult<Self> {
        let value = value.trim();
        let subject = if let Some(group_id) = strip_prefix_ignore_case(value, "group:") {
            Self::Group(group_id.trim().to_owned())
        } else if let Some(user_id) = strip_prefix_ignore_case(value, "user:") {
            Self::User(user_id.trim().to_owned())
        } else {
            Self::User(value.to_owned())
        };

        if subject.id().is_empty() {
            return Err(AppError::Validation(format!(
                "review subject '{value}' has no id"
            )));
        }

        Ok(subject)
    }

    /// Returns the directory object id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Group(id) => id.as_str(),
        }
    }

    /// Returns the comparison key used for duplicate detection.
    #[must_use]
    pub fn normalized(&self) -> String {
        self.to_string().to_ascii_lowercase()
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    value
        .get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .and_then(|_| value.get(prefix.len()..))
}

impl Display for ReviewSubject {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(formatter, "user:{id}"),
            Self::Group(id) => write!(formatter, "group:{id}"),
        }
    }
}

impl TryFrom<String> for ReviewSubject {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<ReviewSubject> for String {
    fn from(value: ReviewSubject) -> Self {
        value.to_string()
    }
}

/// Directory user and role assignments at review time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// Directory user id.
    pub user_id: String,
    /// Tenant the user belongs to.
    pub tenant_id: TenantId,
    /// Display name, when the directory returned one.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Active role assignment ids.
    #[serde(default)]
    pub active_role_ids: Vec<String>,
    /// Eligible (just-in-time) role assignment ids.
    #[serde(default)]
    pub eligible_role_ids: Vec<String>,
}

impl UserContext {
    /// Creates a context with no role assignments.
    #[must_use]
    pub fn new(user_id: impl Into<String>, tenant_id: TenantId) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id,
            display_name: None,
            active_role_ids: Vec::new(),
            eligible_role_ids: Vec::new(),
        }
    }

    /// Returns whether this user is the target object, ignoring case.
    #[must_use]
    pub fn is_target(&self, target: &TargetResource) -> bool {
        target.is_subject(self.user_id.as_str())
    }
}

/// A role found to grant an activity under one condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleGrant<'a> {
    role: &'a RoleDefinition,
    condition: PermissionCondition,
}

impl<'a> RoleGrant<'a> {
    /// Pairs a role with a condition; `None` when the role has no set under it.
    #[must_use]
    pub fn new(role: &'a RoleDefinition, condition: PermissionCondition) -> Option<Self> {
        role.permission_set(condition)
            .map(|_| Self { role, condition })
    }

    /// Returns the granting role.
    #[must_use]
    pub fn role(&self) -> &'a RoleDefinition {
        self.role
    }

    /// Returns the condition the grant was matched under.
    #[must_use]
    pub fn condition(&self) -> PermissionCondition {
        self.condition
    }

    /// Returns the permission set the grant was matched through.
    #[must_use]
    pub fn permission_set(&self) -> Option<&'a PermissionSet> {
        self.role.permission_set(self.condition)
    }
}

/// One evaluator's verdict for one evaluation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleScoreCard {
    /// Name of the evaluator that produced the card.
    pub evaluator_name: String,
    /// Signed score contribution.
    pub score: i32,
    /// Human-readable justification.
    pub justification: String,
}

impl RoleScoreCard {
    /// Creates a score card.
    #[must_use]
    pub fn new(evaluator_name: &str, score: i32, justification: impl Into<String>) -> Self {
        Self {
            evaluator_name: evaluator_name.to_owned(),
            score,
            justification: justification.into(),
        }
    }
}

/// Aggregate score for one evaluation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEvaluationResult {
    /// Evaluated role, when the context carried one.
    pub role: Option<RoleSummary>,
    /// Evaluated target id, when the context carried one.
    pub target_id: Option<String>,
    /// Sum of all score cards, or [`REJECTED_SCORE`].
    pub total_score: i32,
    /// Individual evaluator verdicts; empty when rejected.
    pub score_cards: Vec<RoleScoreCard>,
}

impl RoleEvaluationResult {
    /// Returns whether a hard requirement rejected the context.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.total_score == REJECTED_SCORE && self.score_cards.is_empty()
    }
}

/// Role delta between what a user needs and what they hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedRoleChanges {
    /// Suggested roles the user does not hold.
    pub roles_to_add: Vec<RoleSummary>,
    /// Held roles no activity needed.
    pub roles_to_remove: Vec<RoleSummary>,
    /// Held roles that were also suggested.
    pub roles_to_keep: Vec<RoleSummary>,
}

/// Review outcome for one activity of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityReviewResult {
    /// Activity name.
    pub activity_name: String,
    /// Targets the user touched through the activity.
    pub targets: Vec<TargetResource>,
    /// Role delta for this activity alone.
    pub role_changes: SuggestedRoleChanges,
    /// Best scored role/target pair, when anything could be scored.
    pub evaluation: Option<RoleEvaluationResult>,
}

/// Review outcome for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReviewResult {
    /// User context at review time.
    pub user: UserContext,
    /// Per-activity outcomes in discovery order.
    pub activities: Vec<ActivityReviewResult>,
    /// Delta between the union of suggestions and current roles.
    pub role_changes: SuggestedRoleChanges,
}

/// Aggregated output of one review job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewJobResult {
    /// Per-user outcomes.
    pub users: Vec<UserReviewResult>,
}
