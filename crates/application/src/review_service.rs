use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use rolereaper_core::{AppError, AppResult, TenantId};
use rolereaper_domain::{
    Activity, ActivityReviewResult, AuditActivity, ReviewJobResult, RoleDefinition,
    SuggestedRoleChanges, TargetResource, UserContext, UserReviewResult,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::activity_permission_analyzer::ActivityPermissionAnalyzer;
use crate::condition_evaluator::ConditionEvaluator;
use crate::ownership_resolver::OwnershipResolver;
use crate::review_ports::{DirectoryService, PermissionCatalog, ReviewJob};
use crate::role_advisor::RoleAdvisor;
use crate::role_evaluation_service::RoleEvaluationService;

/// Concurrency limits applied while processing review jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewConcurrency {
    max_concurrent_jobs: usize,
    max_concurrent_users: usize,
    max_concurrent_activities: usize,
}

impl ReviewConcurrency {
    /// Creates limits; every limit must be greater than zero.
    pub fn new(
        max_concurrent_jobs: usize,
        max_concurrent_users: usize,
        max_concurrent_activities: usize,
    ) -> AppResult<Self> {
        for (name, value) in [
            ("max_concurrent_jobs", max_concurrent_jobs),
            ("max_concurrent_users", max_concurrent_users),
            ("max_concurrent_activities", max_concurrent_activities),
        ] {
            if value == 0 {
                return Err(AppError::Validation(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        Ok(Self {
            max_concurrent_jobs,
            max_concurrent_users,
            max_concurrent_activities,
        })
    }

    /// Returns how many jobs may run at once.
    #[must_use]
    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    /// Returns how many users of one job may be reviewed at once.
    #[must_use]
    pub fn max_concurrent_users(&self) -> usize {
        self.max_concurrent_users
    }

    /// Returns how many activities of one user may be reviewed at once.
    #[must_use]
    pub fn max_concurrent_activities(&self) -> usize {
        self.max_concurrent_activities
    }
}

impl Default for ReviewConcurrency {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            max_concurrent_users: 4,
            max_concurrent_activities: 8,
        }
    }
}

/// Computes the review result for one job.
#[derive(Clone)]
pub struct ReviewService {
    catalog: Arc<dyn PermissionCatalog>,
    directory: Arc<dyn DirectoryService>,
    concurrency: ReviewConcurrency,
}

// Collaborators built once per job run and dropped with it.
struct ReviewRun<'a> {
    job: &'a ReviewJob,
    advisor: RoleAdvisor,
    scoring: RoleEvaluationService,
    cancellation: &'a CancellationToken,
}

impl ReviewService {
    /// Creates a review service.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn PermissionCatalog>,
        directory: Arc<dyn DirectoryService>,
        concurrency: ReviewConcurrency,
    ) -> Self {
        Self {
            catalog,
            directory,
            concurrency,
        }
    }

    /// Returns the configured limits.
    #[must_use]
    pub fn concurrency(&self) -> ReviewConcurrency {
        self.concurrency
    }

    /// Reviews every user the job's subjects expand to.
    ///
    /// Once `cancellation` fires no further users or activities are started;
    /// whatever was already computed is returned. A user whose activities
    /// were cut short keeps the reviewed ones but gets no role changes.
    pub async fn review(
        &self,
        job: &ReviewJob,
        cancellation: &CancellationToken,
    ) -> AppResult<ReviewJobResult> {
        let tenant_id = job.tenant_id;
        let ownership = Arc::new(OwnershipResolver::new(tenant_id, self.directory.clone()));
        let analyzer = ActivityPermissionAnalyzer::new(ConditionEvaluator::new(ownership.clone()));
        let run = ReviewRun {
            job,
            advisor: RoleAdvisor::load(tenant_id, analyzer, self.catalog.clone()).await?,
            scoring: RoleEvaluationService::standard(ownership.clone()),
            cancellation,
        };

        let user_ids = self.expand_users(tenant_id, job).await?;
        info!(
            job_id = %job.job_id,
            tenant_id = %tenant_id,
            users = user_ids.len(),
            roles = run.advisor.roles().len(),
            "reviewing users"
        );

        let run = &run;
        let users: Vec<UserReviewResult> = stream::iter(user_ids)
            .map(|user_id| async move { self.review_user(run, user_id.as_str()).await })
            .buffered(self.concurrency.max_concurrent_users)
            .try_filter_map(|review| async move { Ok(review) })
            .try_collect()
            .await?;

        debug!(
            job_id = %job.job_id,
            ownership_lookups = ownership.cached_entries().await,
            "review run finished"
        );

        Ok(ReviewJobResult { users })
    }

    async fn expand_users(&self, tenant_id: TenantId, job: &ReviewJob) -> AppResult<Vec<String>> {
        let expanded = self
            .directory
            .expand_users_or_groups(tenant_id, &job.subjects)
            .await?;

        let mut user_ids: Vec<String> = Vec::with_capacity(expanded.len());
        for user_id in expanded {
            let user_id = user_id.trim();
            if user_id.is_empty()
                || user_ids
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(user_id))
            {
                continue;
            }
            user_ids.push(user_id.to_owned());
        }

        Ok(user_ids)
    }

    async fn review_user(
        &self,
        run: &ReviewRun<'_>,
        user_id: &str,
    ) -> AppResult<Option<UserReviewResult>> {
        if run.cancellation.is_cancelled() {
            return Ok(None);
        }

        let tenant_id = run.job.tenant_id;
        let user = self.directory.get_user(tenant_id, user_id).await?;
        let current_role_ids = run.advisor.current_role_ids(user_id).await?;
        let audit = self
            .directory
            .collect_activities(tenant_id, user_id, run.job.audit_from, run.job.audit_to)
            .await?;
        let reviewable = self.reviewable_activities(tenant_id, audit).await?;

        debug!(
            job_id = %run.job.job_id,
            user_id = %user_id,
            activities = reviewable.len(),
            "collected user activities"
        );

        let activity_count = reviewable.len();
        let user_ref = &user;
        let current = current_role_ids.as_slice();
        let reviewed: Vec<(ActivityReviewResult, Vec<&RoleDefinition>)> = stream::iter(reviewable)
            .map(|(activity, targets)| async move {
                review_activity(run, user_ref, current, activity, targets).await
            })
            .buffered(self.concurrency.max_concurrent_activities)
            .try_filter_map(|review| async move { Ok(review) })
            .try_collect()
            .await?;

        let mut suggested: Vec<&RoleDefinition> = Vec::new();
        let mut activities = Vec::with_capacity(reviewed.len());
        for (activity_review, roles) in reviewed {
            for role in roles {
                if !suggested.iter().any(|known| known.id() == role.id()) {
                    suggested.push(role);
                }
            }
            activities.push(activity_review);
        }

        // Skipped activities leave the suggestion set incomplete.
        let role_changes = if activities.len() < activity_count {
            SuggestedRoleChanges::default()
        } else {
            run.advisor.diff_role_sets(&suggested, &current_role_ids)
        };
        info!(
            job_id = %run.job.job_id,
            user_id = %user_id,
            activities = activities.len(),
            roles_to_add = role_changes.roles_to_add.len(),
            roles_to_remove = role_changes.roles_to_remove.len(),
            "user review finished"
        );

        Ok(Some(UserReviewResult {
            user,
            activities,
            role_changes,
        }))
    }

    // Merges audit entries by name, resolves catalog mappings and drops
    // excluded activities. Unmapped activities are kept with no actions.
    async fn reviewable_activities(
        &self,
        tenant_id: TenantId,
        audit: Vec<AuditActivity>,
    ) -> AppResult<Vec<(Activity, Vec<TargetResource>)>> {
        let merged: Vec<AuditActivity> = AuditActivity::merge_by_name(audit)
            .into_iter()
            .filter(|entry| !entry.activity_name.trim().is_empty())
            .collect();
        let names: Vec<String> = merged
            .iter()
            .map(|entry| entry.activity_name.clone())
            .collect();
        let mapped = self.catalog.list_activities(tenant_id, &names).await?;

        let mut reviewable = Vec::with_capacity(merged.len());
        for entry in merged {
            let activity = match mapped
                .iter()
                .find(|activity| activity.is_named(entry.activity_name.as_str()))
            {
                Some(activity) if activity.is_excluded() => continue,
                Some(activity) => activity.clone(),
                None => Activity::new(entry.activity_name, Vec::new())?,
            };
            reviewable.push((activity, entry.target_resources));
        }

        Ok(reviewable)
    }
}

async fn review_activity<'r>(
    run: &'r ReviewRun<'_>,
    user: &UserContext,
    current_role_ids: &[String],
    activity: Activity,
    targets: Vec<TargetResource>,
) -> AppResult<Option<(ActivityReviewResult, Vec<&'r RoleDefinition>)>> {
    if run.cancellation.is_cancelled() {
        debug!(
            job_id = %run.job.job_id,
            activity = %activity.name(),
            "skipping activity of cancelled job"
        );
        return Ok(None);
    }

    let suggested = run
        .advisor
        .get_suggested_roles(&activity, &targets, user.user_id.as_str())
        .await;
    let evaluation = run
        .scoring
        .evaluate_best(user, &activity, &targets, &suggested)
        .await?;
    let role_changes = run.advisor.diff_role_sets(&suggested, current_role_ids);

    debug!(
        job_id = %run.job.job_id,
        user_id = %user.user_id,
        activity = %activity.name(),
        suggested = suggested.len(),
        "activity reviewed"
    );

    Ok(Some((
        ActivityReviewResult {
            activity_name: activity.name().to_owned(),
            targets,
            role_changes,
            evaluation,
        },
        suggested,
    )))
}
