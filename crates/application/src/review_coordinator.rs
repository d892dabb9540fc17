use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use futures::{TryStreamExt, stream};
use rolereaper_core::{AppError, AppResult, UserIdentity};
use rolereaper_domain::{ReviewJobResult, ReviewSubject};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::review_ports::{
    ReviewJob, ReviewJobId, ReviewJobListQuery, ReviewJobOutcome, ReviewJobRepository,
    ReviewJobStatus,
};
use crate::review_service::ReviewService;

/// Input payload for enqueueing a review job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueReviewInput {
    /// Users and groups to review.
    pub subjects: Vec<ReviewSubject>,
    /// Audit window start.
    pub audit_from: DateTime<Utc>,
    /// Audit window end; must be after `audit_from`.
    pub audit_to: DateTime<Utc>,
}

/// Status view of one review job, without its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewJobSummary {
    /// Job identifier.
    pub job_id: ReviewJobId,
    /// Subject of the caller that enqueued the job.
    pub requested_by: String,
    /// Current status.
    pub status: ReviewJobStatus,
    /// Number of requested users and groups.
    pub subject_count: usize,
    /// Audit window start.
    pub audit_from: DateTime<Utc>,
    /// Audit window end.
    pub audit_to: DateTime<Utc>,
    /// Enqueue timestamp.
    pub enqueued_at: DateTime<Utc>,
    /// Worker start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Terminal transition timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Captured failure message.
    pub error: Option<String>,
}

impl From<&ReviewJob> for ReviewJobSummary {
    fn from(job: &ReviewJob) -> Self {
        Self {
            job_id: job.job_id,
            requested_by: job.requested_by.clone(),
            status: job.status,
            subject_count: job.subjects.len(),
            audit_from: job.audit_from,
            audit_to: job.audit_to,
            enqueued_at: job.enqueued_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error: job.error.clone(),
        }
    }
}

/// Result lookup outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewResultLookup {
    /// The job completed; its result is attached.
    Ready(ReviewJobResult),
    /// The job is still queued or running.
    Pending(ReviewJobStatus),
    /// The job ended without a complete result.
    Unavailable(ReviewJobSummary),
}

/// Owns review job lifecycle: enqueue, run, cancel, query and prune.
#[derive(Clone)]
pub struct ReviewCoordinator {
    repository: Arc<dyn ReviewJobRepository>,
    review_service: ReviewService,
    running: Arc<Mutex<HashMap<ReviewJobId, CancellationToken>>>,
}

impl ReviewCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(repository: Arc<dyn ReviewJobRepository>, review_service: ReviewService) -> Self {
        Self {
            repository,
            review_service,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Stores a queued job for the caller's tenant and returns its id.
    ///
    /// Fails with a conflict while the caller already has a queued or running
    /// job for the same users and groups.
    pub async fn enqueue(
        &self,
        actor: &UserIdentity,
        input: EnqueueReviewInput,
    ) -> AppResult<ReviewJobId> {
        if input.subjects.is_empty() {
            return Err(AppError::Validation(
                "at least one user or group is required".to_owned(),
            ));
        }

        if input.audit_from >= input.audit_to {
            return Err(AppError::Validation(
                "audit_from must be before audit_to".to_owned(),
            ));
        }

        let job = ReviewJob::queued(
            actor.subject(),
            actor.tenant_id(),
            input.subjects,
            input.audit_from,
            input.audit_to,
            Utc::now(),
        );
        let job_id = job.job_id;
        let subject_count = job.subjects.len();
        self.repository.insert_job(job).await?;

        info!(
            job_id = %job_id,
            tenant_id = %actor.tenant_id(),
            requested_by = %actor.subject(),
            subjects = subject_count,
            "review job enqueued"
        );

        Ok(job_id)
    }

    /// Returns a job of the caller's tenant, including partial state.
    pub async fn get(&self, actor: &UserIdentity, job_id: ReviewJobId) -> AppResult<ReviewJob> {
        self.repository
            .find_job(actor.tenant_id(), job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("review job '{job_id}' does not exist")))
    }

    /// Returns status and timestamps of a job.
    pub async fn get_status(
        &self,
        actor: &UserIdentity,
        job_id: ReviewJobId,
    ) -> AppResult<ReviewJobSummary> {
        let job = self.get(actor, job_id).await?;
        Ok(ReviewJobSummary::from(&job))
    }

    /// Returns the result of a completed job.
    pub async fn get_result(
        &self,
        actor: &UserIdentity,
        job_id: ReviewJobId,
    ) -> AppResult<ReviewResultLookup> {
        let job = self.get(actor, job_id).await?;

        Ok(match (job.status, job.result.as_ref()) {
            (ReviewJobStatus::Completed, Some(result)) => ReviewResultLookup::Ready(result.clone()),
            (ReviewJobStatus::Queued | ReviewJobStatus::Running, _) => {
                ReviewResultLookup::Pending(job.status)
            }
            _ => ReviewResultLookup::Unavailable(ReviewJobSummary::from(&job)),
        })
    }

    /// Lists jobs of the caller's tenant newest first, optionally for one requester.
    pub async fn list(
        &self,
        actor: &UserIdentity,
        requested_by: Option<&str>,
    ) -> AppResult<Vec<ReviewJobSummary>> {
        let jobs = self
            .repository
            .list_jobs(ReviewJobListQuery {
                tenant_id: Some(actor.tenant_id()),
                requested_by: requested_by.map(str::to_owned),
            })
            .await?;

        Ok(jobs.iter().map(ReviewJobSummary::from).collect())
    }

    /// Cancels a job the caller enqueued.
    ///
    /// A running job is marked cancelled at once and its worker stops before
    /// the next activity.
    pub async fn cancel(&self, actor: &UserIdentity, job_id: ReviewJobId) -> AppResult<ReviewJob> {
        let job = self.get(actor, job_id).await?;

        if !actor.is_subject(job.requested_by.as_str()) {
            return Err(AppError::Forbidden(format!(
                "review job '{job_id}' was requested by another user"
            )));
        }

        if job.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "review job '{job_id}' is already {}",
                job.status.as_str()
            )));
        }

        let cancelled = self
            .repository
            .cancel_job(actor.tenant_id(), job_id, Utc::now())
            .await?;
        if let Some(token) = self.running.lock().await.get(&job_id) {
            token.cancel();
        }

        info!(
            job_id = %job_id,
            tenant_id = %actor.tenant_id(),
            requested_by = %actor.subject(),
            "review job cancelled"
        );

        Ok(cancelled)
    }

    /// Claims and runs queued jobs until the queue is empty.
    ///
    /// At most `max_concurrent_jobs` jobs run at once. Failed reviews are
    /// recorded on their job; only repository failures are returned.
    pub async fn run_pending(&self) -> AppResult<usize> {
        let processed = AtomicUsize::new(0);
        let repository = self.repository.clone();

        let claimed = stream::try_unfold(repository, |repository| async move {
            let next = repository.claim_next_job(Utc::now()).await?;
            Ok::<_, AppError>(next.map(|job| (job, repository)))
        });

        claimed
            .try_for_each_concurrent(
                self.review_service.concurrency().max_concurrent_jobs(),
                |job| {
                    let processed = &processed;
                    async move {
                        self.process(job).await;
                        processed.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    }
                },
            )
            .await?;

        Ok(processed.into_inner())
    }

    /// Deletes terminal jobs that completed longer than `retention` ago.
    pub async fn prune_finished(&self, retention: TimeDelta) -> AppResult<usize> {
        let removed = self
            .repository
            .delete_finished_jobs(Utc::now() - retention)
            .await?;

        if removed > 0 {
            info!(removed, "pruned finished review jobs");
        }

        Ok(removed)
    }

    async fn process(&self, job: ReviewJob) {
        let job_id = job.job_id;
        let token = CancellationToken::new();
        self.running.lock().await.insert(job_id, token.clone());

        // A cancel may land between the claim and the token registration.
        if let Ok(Some(current)) = self.repository.find_job(job.tenant_id, job_id).await
            && current.status == ReviewJobStatus::Cancelled
        {
            token.cancel();
        }

        info!(
            job_id = %job_id,
            tenant_id = %job.tenant_id,
            requested_by = %job.requested_by,
            "review job started"
        );

        let outcome = match self.review_service.review(&job, &token).await {
            Ok(result) if token.is_cancelled() => ReviewJobOutcome::Cancelled(result),
            Ok(result) => ReviewJobOutcome::Completed(result),
            Err(error) => {
                warn!(job_id = %job_id, error = %error, "review job failed");
                ReviewJobOutcome::Failed(error.to_string())
            }
        };

        self.running.lock().await.remove(&job_id);

        match self
            .repository
            .finish_job(job_id, outcome, Utc::now())
            .await
        {
            Ok(finished) => info!(
                job_id = %job_id,
                status = finished.status.as_str(),
                "review job finished"
            ),
            Err(error) => warn!(
                job_id = %job_id,
                error = %error,
                "failed to record review job outcome"
            ),
        }
    }
}

#[cfg(test)]
mod tests;
