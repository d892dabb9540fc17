use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rolereaper_application::{
    ReviewJob, ReviewJobId, ReviewJobListQuery, ReviewJobOutcome, ReviewJobRepository,
    ReviewJobStatus,
};
use rolereaper_core::{AppError, AppResult, TenantId};
use tokio::sync::RwLock;

/// In-memory review job table.
#[derive(Debug, Default)]
pub struct InMemoryReviewJobRepository {
    jobs: RwLock<HashMap<ReviewJobId, ReviewJob>>,
}

impl InMemoryReviewJobRepository {
    /// Creates an empty job table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(job_id: ReviewJobId) -> AppError {
    AppError::NotFound(format!("review job '{job_id}' does not exist"))
}

#[async_trait]
impl ReviewJobRepository for InMemoryReviewJobRepository {
    async fn insert_job(&self, job: ReviewJob) -> AppResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.job_id) {
            return Err(AppError::Conflict(format!(
                "review job '{}' already exists",
                job.job_id
            )));
        }
        if let Some(duplicate) = jobs
            .values()
            .find(|stored| stored.is_in_flight_duplicate_of(&job))
        {
            return Err(duplicate.duplicate_conflict());
        }

        jobs.insert(job.job_id, job);
        Ok(())
    }

    async fn find_job(
        &self,
        tenant_id: TenantId,
        job_id: ReviewJobId,
    ) -> AppResult<Option<ReviewJob>> {
        Ok(self
            .jobs
            .read()
            .await
            .get(&job_id)
            .filter(|job| job.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_jobs(&self, query: ReviewJobListQuery) -> AppResult<Vec<ReviewJob>> {
        let jobs = self.jobs.read().await;

        let mut values: Vec<ReviewJob> = jobs
            .values()
            .filter(|job| query.tenant_id.is_none_or(|tenant_id| job.tenant_id == tenant_id))
            .filter(|job| {
                query
                    .requested_by
                    .as_deref()
                    .is_none_or(|requested_by| job.requested_by.eq_ignore_ascii_case(requested_by))
            })
            .cloned()
            .collect();
        values.sort_by(|left, right| {
            right
                .enqueued_at
                .cmp(&left.enqueued_at)
                .then_with(|| right.job_id.cmp(&left.job_id))
        });

        Ok(values)
    }

    async fn claim_next_job(&self, started_at: DateTime<Utc>) -> AppResult<Option<ReviewJob>> {
        let mut jobs = self.jobs.write().await;

        let Some(job) = jobs
            .values_mut()
            .filter(|job| job.status == ReviewJobStatus::Queued)
            .min_by(|left, right| {
                left.enqueued_at
                    .cmp(&right.enqueued_at)
                    .then_with(|| left.job_id.cmp(&right.job_id))
            })
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
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&job_id).ok_or_else(|| not_found(job_id))?;

        job.finish(outcome, finished_at)?;
        Ok(job.clone())
    }

    async fn cancel_job(
        &self,
        tenant_id: TenantId,
        job_id: ReviewJobId,
        cancelled_at: DateTime<Utc>,
    ) -> AppResult<ReviewJob> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&job_id)
            .filter(|job| job.tenant_id == tenant_id)
            .ok_or_else(|| not_found(job_id))?;

        job.cancel(cancelled_at)?;
        Ok(job.clone())
    }

    async fn delete_finished_jobs(&self, completed_before: DateTime<Utc>) -> AppResult<usize> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();

        jobs.retain(|_, job| {
            !job.status.is_terminal()
                || job
                    .completed_at
                    .is_none_or(|completed_at| completed_at >= completed_before)
        });

        Ok(before - jobs.len())
    }
}
