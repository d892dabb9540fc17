use std::path::Path;

use chrono::{DateTime, Utc};
use rolereaper_core::{AppError, AppResult, TenantId};
use rolereaper_domain::{Activity, RoleDefinition, TargetResource};
use serde::{Deserialize, Serialize};

/// Directory and catalog export feeding the in-memory adapters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    /// Per-tenant exports.
    #[serde(default)]
    pub tenants: Vec<TenantSnapshot>,
}

/// Export of one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSnapshot {
    /// Tenant the export belongs to.
    pub tenant_id: TenantId,
    /// Role catalog.
    #[serde(default)]
    pub roles: Vec<RoleDefinition>,
    /// Activity to resource action mappings.
    #[serde(default)]
    pub activities: Vec<Activity>,
    /// Directory users and their role assignments.
    #[serde(default)]
    pub users: Vec<SnapshotUser>,
    /// Directory groups; members may be users or nested groups.
    #[serde(default)]
    pub groups: Vec<SnapshotGroup>,
    /// Recorded object owners.
    #[serde(default)]
    pub ownerships: Vec<SnapshotOwnership>,
    /// Audit log entries.
    #[serde(default)]
    pub audit_entries: Vec<SnapshotAuditEntry>,
}

/// Directory user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotUser {
    /// User id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Active role assignment ids.
    #[serde(default)]
    pub active_role_ids: Vec<String>,
    /// Eligible role assignment ids.
    #[serde(default)]
    pub eligible_role_ids: Vec<String>,
}

/// Directory group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotGroup {
    /// Group id.
    pub id: String,
    /// Member user or group ids.
    #[serde(default)]
    pub member_ids: Vec<String>,
}

/// One owner of one directory object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotOwnership {
    /// Owning user id.
    pub owner_id: String,
    /// Owned object id.
    pub resource_id: String,
}

/// One audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotAuditEntry {
    /// User that initiated the operation.
    pub initiated_by: String,
    /// Operation timestamp.
    pub activity_date_time: DateTime<Utc>,
    /// Activity display name; entries without one are ignored.
    #[serde(default)]
    pub activity_name: String,
    /// Objects touched by the operation.
    #[serde(default)]
    pub target_resources: Vec<TargetResource>,
}

impl DirectorySnapshot {
    /// Parses a snapshot from JSON.
    pub fn from_json_str(json: &str) -> AppResult<Self> {
        serde_json::from_str(json)
            .map_err(|error| AppError::Validation(format!("invalid directory snapshot: {error}")))
    }

    /// Reads and parses a snapshot file.
    pub fn from_json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|error| {
            AppError::Validation(format!(
                "failed to read directory snapshot '{}': {error}",
                path.display()
            ))
        })?;

        Self::from_json_str(json.as_str())
    }

    /// Returns the export of one tenant.
    #[must_use]
    pub fn tenant(&self, tenant_id: TenantId) -> Option<&TenantSnapshot> {
        self.tenants
            .iter()
            .find(|tenant| tenant.tenant_id == tenant_id)
    }
}
