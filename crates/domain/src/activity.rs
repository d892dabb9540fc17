use std::collections::BTreeSet;

use rolereaper_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::catalog::{ResourceAction, namespace_entity_key};

/// Observed directory operation and the permissions it is known to exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audit_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service: Option<String>,
    #[serde(default)]
    is_excluded: bool,
    #[serde(default)]
    mapped_resource_actions: Vec<ResourceAction>,
}

impl Activity {
    /// Creates an activity mapped to the given actions.
    pub fn new(
        name: impl Into<String>,
        mapped_resource_actions: Vec<ResourceAction>,
    ) -> AppResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AppError::Validation(
                "activity name must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            name,
            audit_category: None,
            service: None,
            is_excluded: false,
            mapped_resource_actions,
        })
    }

    /// Sets the exclusion flag.
    #[must_use]
    pub fn excluded(mut self, is_excluded: bool) -> Self {
        self.is_excluded = is_excluded;
        self
    }

    /// Sets audit category and emitting service.
    #[must_use]
    pub fn with_audit_source(
        mut self,
        audit_category: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        self.audit_category = Some(audit_category.into());
        self.service = Some(service.into());
        self
    }

    /// Returns the activity name as it appears in the audit log.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the audit category.
    #[must_use]
    pub fn audit_category(&self) -> Option<&str> {
        self.audit_category.as_deref()
    }

    /// Returns the emitting service.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Returns whether the activity is excluded from review.
    #[must_use]
    pub fn is_excluded(&self) -> bool {
        self.is_excluded
    }

    /// Returns the mapped actions.
    #[must_use]
    pub fn mapped_resource_actions(&self) -> &[ResourceAction] {
        &self.mapped_resource_actions
    }

    /// Iterates the mapped action strings.
    pub fn mapped_actions(&self) -> impl Iterator<Item = &str> + Clone {
        self.mapped_resource_actions
            .iter()
            .map(ResourceAction::action)
    }

    /// Returns the distinct `namespace/entity` keys of the mapped actions.
    #[must_use]
    pub fn namespace_entity_keys(&self) -> BTreeSet<&str> {
        self.mapped_actions().map(namespace_entity_key).collect()
    }

    /// Returns whether the activity name matches `name`, ignoring case.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Property change recorded on a target resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedProperty {
    /// Property display name.
    pub display_name: String,
    /// Value before the change.
    #[serde(default)]
    pub old_value: Option<String>,
    /// Value after the change.
    #[serde(default)]
    pub new_value: Option<String>,
}

/// Directory object affected by an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResource {
    id: String,
    #[serde(rename = "type")]
    resource_type: String,
    display_name: String,
    #[serde(default)]
    modified_properties: Vec<ModifiedProperty>,
}

impl TargetResource {
    /// Creates a target resource.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        resource_type: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            display_name: display_name.into(),
            modified_properties: Vec::new(),
        }
    }

    /// Attaches modified properties.
    #[must_use]
    pub fn with_modified_properties(mut self, modified_properties: Vec<ModifiedProperty>) -> Self {
        self.modified_properties = modified_properties;
        self
    }

    /// Returns the directory object id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the directory object type, e.g. `Group` or `Application`.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        self.resource_type.as_str()
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the recorded property changes.
    #[must_use]
    pub fn modified_properties(&self) -> &[ModifiedProperty] {
        &self.modified_properties
    }

    /// Returns whether this target is the directory object `subject_id`, ignoring case.
    #[must_use]
    pub fn is_subject(&self, subject_id: &str) -> bool {
        self.id.eq_ignore_ascii_case(subject_id)
    }
}

/// Activity name and targets collected from the audit log for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditActivity {
    /// Activity display name from the audit entry.
    pub activity_name: String,
    /// Targets touched by the audited operation.
    #[serde(default)]
    pub target_resources: Vec<TargetResource>,
}

impl AuditActivity {
    /// Merges entries with the same activity name, keeping discovery order.
    ///
    /// Names compare case-insensitively; targets are de-duplicated by id.
    #[must_use]
    pub fn merge_by_name(entries: Vec<Self>) -> Vec<Self> {
        let mut merged: Vec<Self> = Vec::new();

        for entry in entries {
            match merged
                .iter_mut()
                .find(|existing| existing.activity_name.eq_ignore_ascii_case(&entry.activity_name))
            {
                Some(existing) => {
                    for target in entry.target_resources {
                        if !existing
                            .target_resources
                            .iter()
                            .any(|known| known.is_subject(target.id()))
                        {
                            existing.target_resources.push(target);
                        }
                    }
                }
                None => {
                    let mut entry = entry;
                    let mut seen = BTreeSet::new();
                    entry
                        .target_resources
                        .retain(|target| seen.insert(target.id().to_ascii_lowercase()));
                    merged.push(entry);
                }
            }
        }

        merged
    }
}
