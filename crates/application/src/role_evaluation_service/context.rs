use rolereaper_core::{AppError, AppResult};
use rolereaper_domain::{Activity, RoleDefinition, RoleSummary, TargetResource, UserContext};

/// Inputs handed to requirements and evaluators for one role and target.
#[derive(Debug, Clone, Copy)]
pub struct RoleEvaluationContext<'a> {
    user: &'a UserContext,
    role: Option<&'a RoleDefinition>,
    activity: Option<&'a Activity>,
    target: Option<&'a TargetResource>,
}

impl<'a> RoleEvaluationContext<'a> {
    /// Creates a context carrying only the user.
    #[must_use]
    pub fn new(user: &'a UserContext) -> Self {
        Self {
            user,
            role: None,
            activity: None,
            target: None,
        }
    }

    /// Attaches the role under evaluation.
    #[must_use]
    pub fn with_role(mut self, role: &'a RoleDefinition) -> Self {
        self.role = Some(role);
        self
    }

    /// Attaches the activity being justified.
    #[must_use]
    pub fn with_activity(mut self, activity: &'a Activity) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Attaches the target the activity touched.
    #[must_use]
    pub fn with_target(mut self, target: &'a TargetResource) -> Self {
        self.target = Some(target);
        self
    }

    /// Returns the reviewed user.
    #[must_use]
    pub fn user(&self) -> &'a UserContext {
        self.user
    }

    /// Returns the role, or a contract violation when none was attached.
    pub fn role(&self) -> AppResult<&'a RoleDefinition> {
        self.role.ok_or_else(|| missing("role"))
    }

    /// Returns the activity, or a contract violation when none was attached.
    pub fn activity(&self) -> AppResult<&'a Activity> {
        self.activity.ok_or_else(|| missing("activity"))
    }

    /// Returns the target, or a contract violation when none was attached.
    pub fn target(&self) -> AppResult<&'a TargetResource> {
        self.target.ok_or_else(|| missing("target"))
    }

    pub(super) fn role_id(&self) -> Option<&'a str> {
        self.role.map(RoleDefinition::id)
    }

    pub(super) fn role_summary(&self) -> Option<RoleSummary> {
        self.role.map(RoleDefinition::summary)
    }

    pub(super) fn target_id(&self) -> Option<String> {
        self.target.map(|target| target.id().to_owned())
    }
}

fn missing(part: &str) -> AppError {
    AppError::ContractViolation(format!("role evaluation context has no {part}"))
}
