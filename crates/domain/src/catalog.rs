use std::collections::BTreeSet;

use rolereaper_core::{AppError, AppResult};
use serde::{Deserialize, Deserializer, Serialize};

/// Returns the `namespace/entity` key of a resource action.
///
/// The key is the first two `/`-delimited segments of the action string,
/// e.g. `microsoft.directory/groups` for
/// `microsoft.directory/groups/members/update`. Actions with fewer than two
/// segments are their own key.
#[must_use]
pub fn namespace_entity_key(action: &str) -> &str {
    match action.match_indices('/').nth(1) {
        Some((index, _)) => &action[..index],
        None => action,
    }
}

/// One fine-grained directory permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceAction {
    action: String,
    #[serde(default)]
    is_privileged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl ResourceAction {
    /// Creates a resource action.
    pub fn new(action: impl Into<String>, is_privileged: bool) -> AppResult<Self> {
        let action = action.into();
        if action.trim().is_empty() {
            return Err(AppError::Validation(
                "resource action must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            action,
            is_privileged,
            description: None,
        })
    }

    /// Attaches a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the action string.
    #[must_use]
    pub fn action(&self) -> &str {
        self.action.as_str()
    }

    /// Returns whether the catalog flags this action as privileged.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        self.is_privileged
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the `namespace/entity` key of this action.
    #[must_use]
    pub fn namespace_entity_key(&self) -> &str {
        namespace_entity_key(self.action.as_str())
    }
}

/// Runtime predicate narrowing when a permission set applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionCondition {
    /// Applies tenant-wide.
    #[default]
    #[serde(rename = "$Tenant")]
    TenantWide,
    /// Applies only when the grantee is the target itself.
    #[serde(rename = "$ResourceIsSelf")]
    ResourceIsSelf,
    /// Applies only when the grantee owns the target.
    #[serde(rename = "$SubjectIsOwner")]
    SubjectIsOwner,
}

impl PermissionCondition {
    /// Returns the catalog tag for this condition.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TenantWide => "$Tenant",
            Self::ResourceIsSelf => "$ResourceIsSelf",
            Self::SubjectIsOwner => "$SubjectIsOwner",
        }
    }

    /// Returns whether the condition narrows the grant below tenant scope.
    #[must_use]
    pub fn is_conditional(&self) -> bool {
        !matches!(self, Self::TenantWide)
    }
}

fn deserialize_condition<'de, D>(deserializer: D) -> Result<PermissionCondition, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<PermissionCondition>::deserialize(deserializer)?.unwrap_or_default())
}

/// Resource actions granted together under one condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    #[serde(default)]
    name: String,
    #[serde(default, deserialize_with = "deserialize_condition")]
    condition: PermissionCondition,
    #[serde(default)]
    resource_actions: Vec<ResourceAction>,
}

impl PermissionSet {
    /// Creates a permission set.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        condition: PermissionCondition,
        resource_actions: Vec<ResourceAction>,
    ) -> Self {
        Self {
            name: name.into(),
            condition,
            resource_actions,
        }
    }

    /// Returns the set name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the condition the set is granted under.
    #[must_use]
    pub fn condition(&self) -> PermissionCondition {
        self.condition
    }

    /// Returns the granted actions.
    #[must_use]
    pub fn resource_actions(&self) -> &[ResourceAction] {
        &self.resource_actions
    }

    /// Returns whether any granted action equals one of `actions`, ignoring case.
    #[must_use]
    pub fn grants_any_of<'a>(&self, mut actions: impl Iterator<Item = &'a str>) -> bool {
        actions.any(|required| {
            self.resource_actions
                .iter()
                .any(|granted| granted.action().eq_ignore_ascii_case(required))
        })
    }

    /// Counts privileged actions in this set.
    #[must_use]
    pub fn privileged_action_count(&self) -> usize {
        self.resource_actions
            .iter()
            .filter(|action| action.is_privileged())
            .count()
    }
}

/// Directory role definition as published by the permission catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    id: String,
    display_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_built_in: bool,
    #[serde(default = "default_enabled")]
    is_enabled: bool,
    #[serde(default)]
    permission_sets: Vec<PermissionSet>,
}

fn default_enabled() -> bool {
    true
}

impl RoleDefinition {
    /// Creates an enabled custom role definition.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        permission_sets: Vec<PermissionSet>,
    ) -> AppResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(AppError::Validation("role id must not be empty".to_owned()));
        }

        Ok(Self {
            id,
            display_name: display_name.into(),
            description: None,
            is_built_in: false,
            is_enabled: true,
            permission_sets,
        })
    }

    /// Attaches a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the role as built-in.
    #[must_use]
    pub fn built_in(mut self) -> Self {
        self.is_built_in = true;
        self
    }

    /// Returns the stable role id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns whether the role ships with the directory.
    #[must_use]
    pub fn is_built_in(&self) -> bool {
        self.is_built_in
    }

    /// Returns whether the role can be assigned.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    /// Returns the ordered permission sets.
    #[must_use]
    pub fn permission_sets(&self) -> &[PermissionSet] {
        &self.permission_sets
    }

    /// Returns the first permission set granted under `condition`.
    #[must_use]
    pub fn permission_set(&self, condition: PermissionCondition) -> Option<&PermissionSet> {
        self.permission_sets
            .iter()
            .find(|set| set.condition() == condition)
    }

    /// Returns the tenant-wide permission set, if any.
    #[must_use]
    pub fn tenant_wide_permission_set(&self) -> Option<&PermissionSet> {
        self.permission_set(PermissionCondition::TenantWide)
    }

    /// Returns whether any permission set is narrowed by a condition.
    #[must_use]
    pub fn has_conditional_permission_set(&self) -> bool {
        self.permission_sets
            .iter()
            .any(|set| set.condition().is_conditional())
    }

    /// Returns whether any permission set applies tenant-wide.
    #[must_use]
    pub fn has_tenant_wide_permission_set(&self) -> bool {
        self.tenant_wide_permission_set().is_some()
    }

    /// Iterates every action across all permission sets.
    pub fn resource_actions(&self) -> impl Iterator<Item = &ResourceAction> {
        self.permission_sets
            .iter()
            .flat_map(|set| set.resource_actions().iter())
    }

    /// Counts privileged actions across all permission sets.
    #[must_use]
    pub fn privileged_action_count(&self) -> usize {
        self.permission_sets
            .iter()
            .map(PermissionSet::privileged_action_count)
            .sum()
    }

    /// Returns whether any contained action is privileged.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        self.resource_actions().any(ResourceAction::is_privileged)
    }

    /// Returns the distinct `namespace/entity` keys the role touches.
    #[must_use]
    pub fn namespace_entity_keys(&self) -> BTreeSet<&str> {
        self.resource_actions()
            .map(ResourceAction::namespace_entity_key)
            .collect()
    }

    /// Returns a lightweight summary for review output.
    #[must_use]
    pub fn summary(&self) -> RoleSummary {
        RoleSummary {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            is_privileged: self.is_privileged(),
        }
    }
}

/// Role identity as reported in review results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleSummary {
    /// Stable role id.
    pub id: String,
    /// Display name, or the id when the role is missing from the catalog.
    pub display_name: String,
    /// Whether the role contains privileged actions.
    pub is_privileged: bool,
}

impl RoleSummary {
    /// Creates a summary for a role id the catalog does not know.
    #[must_use]
    pub fn unknown(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            is_privileged: false,
        }
    }
}
