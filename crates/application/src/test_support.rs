use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rolereaper_core::{AppError, AppResult, TenantId};
use rolereaper_domain::{
    Activity, AuditActivity, PermissionCondition, PermissionSet, ResourceAction, ReviewSubject,
    RoleDefinition, TargetResource, UserContext,
};

use crate::ownership_resolver::OwnershipResolver;
use crate::review_ports::{
    DirectoryService, PermissionCatalog, ReviewJob, ReviewJobId, ReviewJobListQuery,
    ReviewJobOutcome, ReviewJobRepository, ReviewJobStatus,
};
use crate::{ActivityPermissionAnalyzer, ConditionEvaluator};

pub fn action(value: &str, is_privileged: bool) -> ResourceAction {
    ResourceAction::new(value, is_privileged).unwrap_or_else(|_| unreachable!())
}

pub fn permission_set(
    condition: PermissionCondition,
    actions: Vec<ResourceAction>,
) -> PermissionSet {
    PermissionSet::new(condition.as_str(), condition, actions)
}

pub fn role(id: &str, sets: Vec<PermissionSet>) -> RoleDefinition {
    RoleDefinition::new(id, format!("Role {id}"), sets).unwrap_or_else(|_| unreachable!())
}

pub fn activity(name: &str, actions: &[&str]) -> Activity {
    Activity::new(
        name,
        actions.iter().map(|value| action(value, false)).collect(),
    )
    .unwrap_or_else(|_| unreachable!())
}

pub fn target(id: &str) -> TargetResource {
    TargetResource::new(id, "Group", format!("Target {id}"))
}

#[derive(Default)]
pub struct FakeDirectory {
    pub owners: HashSet<(String, String)>,
    pub failing_ownership_targets: HashSet<String>,
    pub activities: HashMap<String, Vec<AuditActivity>>,
    pub failing_activity_users: HashSet<String>,
    pub groups: HashMap<String, Vec<String>>,
    pub owner_calls: AtomicUsize,
}

impl FakeDirectory {
    pub fn with_owner(mut self, user_id: &str, target_id: &str) -> Self {
        self.owners
            .insert((user_id.to_owned(), target_id.to_owned()));
        self
    }

    pub fn with_failing_ownership(mut self, target_id: &str) -> Self {
        self.failing_ownership_targets.insert(target_id.to_owned());
        self
    }

    pub fn with_activities(mut self, user_id: &str, activities: Vec<AuditActivity>) -> Self {
        self.activities.insert(user_id.to_owned(), activities);
        self
    }

    pub fn with_group(mut self, group_id: &str, members: &[&str]) -> Self {
        self.groups.insert(
            group_id.to_owned(),
            members.iter().map(|member| (*member).to_owned()).collect(),
        );
        self
    }

    pub fn with_failing_activity_collection(mut self, user_id: &str) -> Self {
        self.failing_activity_users.insert(user_id.to_owned());
        self
    }

    pub fn owner_calls(&self) -> usize {
        self.owner_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryService for FakeDirectory {
    async fn is_owner(
        &self,
        _tenant_id: TenantId,
        user_id: &str,
        target: &TargetResource,
    ) -> AppResult<bool> {
        self.owner_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_ownership_targets.contains(target.id()) {
            return Err(AppError::Internal("directory unavailable".to_owned()));
        }

        Ok(self
            .owners
            .contains(&(user_id.to_owned(), target.id().to_owned())))
    }

    async fn collect_activities(
        &self,
        _tenant_id: TenantId,
        user_id: &str,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> AppResult<Vec<AuditActivity>> {
        if self.failing_activity_users.contains(user_id) {
            return Err(AppError::Internal("audit log unavailable".to_owned()));
        }

        Ok(self.activities.get(user_id).cloned().unwrap_or_default())
    }

    async fn expand_users_or_groups(
        &self,
        _tenant_id: TenantId,
        subjects: &[ReviewSubject],
    ) -> AppResult<Vec<String>> {
        let mut users = Vec::new();
        for subject in subjects {
            match subject {
                ReviewSubject::User(user_id) => users.push(user_id.clone()),
                ReviewSubject::Group(group_id) => {
                    users.extend(self.groups.get(group_id).cloned().unwrap_or_default());
                }
            }
        }
        Ok(users)
    }

    async fn get_user(&self, tenant_id: TenantId, user_id: &str) -> AppResult<UserContext> {
        Ok(UserContext {
            display_name: Some(format!("User {user_id}")),
            ..UserContext::new(user_id, tenant_id)
        })
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub roles: Vec<RoleDefinition>,
    pub activities: Vec<Activity>,
    pub assignments: HashMap<String, Vec<String>>,
}

impl FakeCatalog {
    pub fn with_roles(mut self, roles: Vec<RoleDefinition>) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_activities(mut self, activities: Vec<Activity>) -> Self {
        self.activities = activities;
        self
    }

    pub fn with_assignment(mut self, user_id: &str, role_ids: &[&str]) -> Self {
        self.assignments.insert(
            user_id.to_owned(),
            role_ids
                .iter()
                .map(|role_id| (*role_id).to_owned())
                .collect(),
        );
        self
    }
}

#[async_trait]
impl PermissionCatalog for FakeCatalog {
    async fn list_roles(&self, _tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>> {
        Ok(self.roles.clone())
    }

    async fn list_current_role_ids(
        &self,
        _tenant_id: TenantId,
        user_id: &str,
    ) -> AppResult<Vec<String>> {
        Ok(self.assignments.get(user_id).cloned().unwrap_or_default())
    }

    async fn list_activities(
        &self,
        _tenant_id: TenantId,
        activity_names: &[String],
    ) -> AppResult<Vec<Activity>> {
        Ok(self
            .activities
            .iter()
            .filter(|activity| activity_names.iter().any(|name| activity.is_named(name)))
            .cloned()
            .collect())
    }
}

pub fn ownership(directory: Arc<FakeDirectory>) -> Arc<OwnershipResolver> {
    Arc::new(OwnershipResolver::new(TenantId::new(), directory))
}

pub fn analyzer(directory: Arc<FakeDirectory>) -> ActivityPermissionAnalyzer {
    ActivityPermissionAnalyzer::new(ConditionEvaluator::new(ownership(directory)))
}

#[derive(Default)]
pub struct FakeReviewJobRepository {
    pub jobs: tokio::sync::Mutex<Vec<ReviewJob>>,
}

impl FakeReviewJobRepository {
    pub async fn job(&self, job_id: ReviewJobId) -> Option<ReviewJob> {
        self.jobs
            .lock()
            .await
            .iter()
            .find(|job| job.job_id == job_id)
            .cloned()
    }
}

#[async_trait]
impl ReviewJobRepository for FakeReviewJobRepository {
    async fn insert_job(&self, job: ReviewJob) -> AppResult<()> {
        let mut jobs = self.jobs.lock().await;
        if let Some(duplicate) = jobs
            .iter()
            .find(|stored| stored.is_in_flight_duplicate_of(&job))
        {
            return Err(duplicate.duplicate_conflict());
        }

        jobs.push(job);
        Ok(())
    }

    async fn find_job(
        &self,
        tenant_id: TenantId,
        job_id: ReviewJobId,
    ) -> AppResult<Option<ReviewJob>> {
        Ok(self
            .jobs
            .lock()
            .await
            .iter()
            .find(|job| job.job_id == job_id && job.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_jobs(&self, query: ReviewJobListQuery) -> AppResult<Vec<ReviewJob>> {
        let mut jobs: Vec<ReviewJob> = self
            .jobs
            .lock()
            .await
            .iter()
            .filter(|job| query.tenant_id.is_none_or(|tenant_id| job.tenant_id == tenant_id))
            .filter(|job| {
                query
                    .requested_by
                    .as_deref()
                    .is_none_or(|requested_by| job.requested_by.eq_ignore_ascii_case(requested_by))
            })
            .cloned()
            .collect();
        jobs.reverse();
        Ok(jobs)
    }

    async fn claim_next_job(&self, started_at: DateTime<Utc>) -> AppResult<Option<ReviewJob>> {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs
            .iter_mut()
            .find(|job| job.status == ReviewJobStatus::Queued)
        else {
            return Ok(None);
        };

        job.start(started_at)?;
        Ok(Some(job.clone()))
    }

    async fn finish_job(
        &self,
        job_id: ReviewJobId,
        outcome: ReviewJobOutcome,
        finished_at: DateTime<Utc>,
    ) -> AppResult<ReviewJob> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|job| job.job_id == job_id)
            .ok_or_else(|| AppError::NotFound(job_id.to_string()))?;

        job.finish(outcome, finished_at)?;
        Ok(job.clone())
    }

    async fn cancel_job(
        &self,
        tenant_id: TenantId,
        job_id: ReviewJobId,
        cancelled_at: DateTime<Utc>,
    ) -> AppResult<ReviewJob> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|job| job.job_id == job_id && job.tenant_id == tenant_id)
            .ok_or_else(|| AppError::NotFound(job_id.to_string()))?;

        job.cancel(cancelled_at)?;
        Ok(job.clone())
    }

    async fn delete_finished_jobs(&self, completed_before: DateTime<Utc>) -> AppResult<usize> {
        let mut jobs = self.jobs.lock().await;
        let before = jobs.len();
        jobs.retain(|job| {
            !(job.status.is_terminal()
                && job
                    .completed_at
                    .is_some_and(|completed_at| completed_at < completed_before))
        });
        Ok(before - jobs.len())
    }
}
