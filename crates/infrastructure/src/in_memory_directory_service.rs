use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rolereaper_application::DirectoryService;
use rolereaper_core::{AppError, AppResult, TenantId};
use rolereaper_domain::{AuditActivity, ReviewSubject, TargetResource, UserContext};
use tracing::warn;

use crate::directory_snapshot::{
    DirectorySnapshot, SnapshotAuditEntry, SnapshotUser, TenantSnapshot,
};

#[derive(Debug, Default)]
struct TenantDirectory {
    users: HashMap<String, SnapshotUser>,
    group_members: HashMap<String, Vec<String>>,
    ownerships: HashSet<(String, String)>,
    audit_entries: Vec<SnapshotAuditEntry>,
}

impl From<&TenantSnapshot> for TenantDirectory {
    fn from(tenant: &TenantSnapshot) -> Self {
        let mut audit_entries = tenant.audit_entries.clone();
        audit_entries.sort_by_key(|entry| entry.activity_date_time);

        Self {
            users: tenant
                .users
                .iter()
                .map(|user| (user.id.to_ascii_lowercase(), user.clone()))
                .collect(),
            group_members: tenant
                .groups
                .iter()
                .map(|group| (group.id.to_ascii_lowercase(), group.member_ids.clone()))
                .collect(),
            ownerships: tenant
                .ownerships
                .iter()
                .map(|ownership| {
                    (
                        ownership.owner_id.to_ascii_lowercase(),
                        ownership.resource_id.to_ascii_lowercase(),
                    )
                })
                .collect(),
            audit_entries,
        }
    }
}

impl TenantDirectory {
    // Depth-first expansion; nested groups are followed once each.
    fn expand_group(
        &self,
        group_id: &str,
        visited: &mut HashSet<String>,
        users: &mut Vec<String>,
    ) {
        if !visited.insert(group_id.to_ascii_lowercase()) {
            return;
        }

        let Some(members) = self.group_members.get(&group_id.to_ascii_lowercase()) else {
            warn!(group_id = %group_id, "review group is not in the directory");
            return;
        };

        for member_id in members {
            if self.group_members.contains_key(&member_id.to_ascii_lowercase()) {
                self.expand_group(member_id, visited, users);
            } else {
                users.push(member_id.clone());
            }
        }
    }
}

/// Directory and audit log served from a directory snapshot.
#[derive(Debug, Default)]
pub struct InMemoryDirectoryService {
    tenants: HashMap<TenantId, TenantDirectory>,
}

impl InMemoryDirectoryService {
    /// Creates a directory holding every tenant of the snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &DirectorySnapshot) -> Self {
        let tenants = snapshot
            .tenants
            .iter()
            .map(|tenant| (tenant.tenant_id, TenantDirectory::from(tenant)))
            .collect();

        Self { tenants }
    }
}

fn unknown_tenant(tenant_id: TenantId) -> AppError {
    AppError::NotFound(format!("tenant '{tenant_id}' has no directory"))
}

#[async_trait]
impl DirectoryService for InMemoryDirectoryService {
    async fn is_owner(
        &self,
        tenant_id: TenantId,
        user_id: &str,
        target: &TargetResource,
    ) -> AppResult<bool> {
        if target.id().trim().is_empty() {
            return Ok(false);
        }

        let directory = self
            .tenants
            .get(&tenant_id)
            .ok_or_else(|| unknown_tenant(tenant_id))?;

        Ok(directory.ownerships.contains(&(
            user_id.to_ascii_lowercase(),
            target.id().to_ascii_lowercase(),
        )))
    }

    async fn collect_activities(
        &self,
        tenant_id: TenantId,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<AuditActivity>> {
        let directory = self
            .tenants
            .get(&tenant_id)
            .ok_or_else(|| unknown_tenant(tenant_id))?;

        Ok(directory
            .audit_entries
            .iter()
            .filter(|entry| entry.initiated_by.eq_ignore_ascii_case(user_id))
            .filter(|entry| entry.activity_date_time >= from && entry.activity_date_time < to)
            .filter(|entry| !entry.activity_name.trim().is_empty())
            .map(|entry| AuditActivity {
                activity_name: entry.activity_name.clone(),
                target_resources: entry.target_resources.clone(),
            })
            .collect())
    }

    async fn expand_users_or_groups(
        &self,
        tenant_id: TenantId,
        subjects: &[ReviewSubject],
    ) -> AppResult<Vec<String>> {
        let directory = self
            .tenants
            .get(&tenant_id)
            .ok_or_else(|| unknown_tenant(tenant_id))?;

        let mut users = Vec::new();
        let mut visited = HashSet::new();
        for subject in subjects {
            match subject {
                ReviewSubject::User(user_id) => users.push(user_id.clone()),
                ReviewSubject::Group(group_id) => {
                    directory.expand_group(group_id, &mut visited, &mut users);
                }
            }
        }

        Ok(users)
    }

    async fn get_user(&self, tenant_id: TenantId, user_id: &str) -> AppResult<UserContext> {
        let directory = self
            .tenants
            .get(&tenant_id)
            .ok_or_else(|| unknown_tenant(tenant_id))?;
        let user = directory
            .users
            .get(&user_id.to_ascii_lowercase())
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' does not exist")))?;

        Ok(UserContext {
            user_id: user.id.clone(),
            tenant_id,
            display_name: user.display_name.clone(),
            active_role_ids: user.active_role_ids.clone(),
            eligible_role_ids: user.eligible_role_ids.clone(),
        })
    }
}
