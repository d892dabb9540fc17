use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rolereaper_core::{AppError, AppResult, TenantId};
use rolereaper_domain::{ReviewJobResult, ReviewSubject};
use uuid::Uuid;

/// Stable review job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReviewJobId(Uuid);

impl ReviewJobId {
    /// Creates a random job id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a job id from its transport value.
    pub fn parse(value: &str) -> AppResult<Self> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid job id '{value}': {error}")))
    }
}

impl Default for ReviewJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ReviewJobId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Lifecycle status of one review job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewJobStatus {
    /// Waiting for a worker.
    Queued,
    /// Claimed by a worker.
    Running,
    /// Finished with a result.
    Completed,
    /// Aborted by an unrecoverable error.
    Failed,
    /// Cancelled by its requester.
    Cancelled,
}

impl ReviewJobStatus {
    /// Returns stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Final outcome reported by the worker that ran a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewJobOutcome {
    /// Run finished normally.
    Completed(ReviewJobResult),
    /// Run aborted with an error message.
    Failed(String),
    /// Run stopped after a cancel request; carries what was computed.
    Cancelled(ReviewJobResult),
}

/// One review job and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewJob {
    /// Job identifier.
    pub job_id: ReviewJobId,
    /// Subject of the caller that enqueued the job.
    pub requested_by: String,
    /// Tenant scope of the job.
    pub tenant_id: TenantId,
    /// Users and groups to review.
    pub subjects: Vec<ReviewSubject>,
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
    /// Current status.
    pub status: ReviewJobStatus,
    /// Captured failure message.
    pub error: Option<String>,
    /// Aggregated result; partial for jobs cancelled mid-run.
    pub result: Option<ReviewJobResult>,
}

impl ReviewJob {
    /// Creates a queued job.
    #[must_use]
    pub fn queued(
        requested_by: impl Into<String>,
        tenant_id: TenantId,
        subjects: Vec<ReviewSubject>,
        audit_from: DateTime<Utc>,
        audit_to: DateTime<Utc>,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: ReviewJobId::new(),
            requested_by: requested_by.into(),
            tenant_id,
            subjects,
            audit_from,
            audit_to,
            enqueued_at,
            started_at: None,
            completed_at: None,
            status: ReviewJobStatus::Queued,
            error: None,
            result: None,
        }
    }

    /// Moves a queued job to running.
    pub fn start(&mut self, started_at: DateTime<Utc>) -> AppResult<()> {
        if self.status != ReviewJobStatus::Queued {
            return Err(self.transition_conflict("start"));
        }

        self.status = ReviewJobStatus::Running;
        self.started_at = Some(started_at);
        Ok(())
    }

    /// Cancels a job that is not terminal yet.
    pub fn cancel(&mut self, cancelled_at: DateTime<Utc>) -> AppResult<()> {
        if self.status.is_terminal() {
            return Err(self.transition_conflict("cancel"));
        }

        self.status = ReviewJobStatus::Cancelled;
        self.completed_at = Some(cancelled_at);
        Ok(())
    }

    /// Applies the outcome reported by the worker that ran the job.
    ///
    /// A job cancelled while running keeps its cancelled status and accepts
    /// the worker's result once, as its partial result.
    pub fn finish(
        &mut self,
        outcome: ReviewJobOutcome,
        finished_at: DateTime<Utc>,
    ) -> AppResult<()> {
        match self.status {
            ReviewJobStatus::Running => {
                match outcome {
                    ReviewJobOutcome::Completed(result) => {
                        self.status = ReviewJobStatus::Completed;
                        self.result = Some(result);
                    }
                    ReviewJobOutcome::Failed(error) => {
                        self.status = ReviewJobStatus::Failed;
                        self.error = Some(error);
                    }
                    ReviewJobOutcome::Cancelled(partial) => {
                        self.status = ReviewJobStatus::Cancelled;
                        self.result = Some(partial);
                    }
                }
                self.completed_at = Some(finished_at);
                Ok(())
            }
            ReviewJobStatus::Cancelled if self.started_at.is_some() && self.result.is_none() => {
                match outcome {
                    ReviewJobOutcome::Completed(partial) | ReviewJobOutcome::Cancelled(partial) => {
                        self.result = Some(partial);
                        Ok(())
                    }
                    ReviewJobOutcome::Failed(_) => Err(self.transition_conflict("fail")),
                }
            }
            _ => Err(self.transition_conflict("finish")),
        }
    }

    /// Returns whether `subjects` names the same users and groups, ignoring case and order.
    #[must_use]
    pub fn targets_same_subjects(&self, subjects: &[ReviewSubject]) -> bool {
        let mut own: Vec<String> = self
            .subjects
            .iter()
            .map(ReviewSubject::normalized)
            .collect();
        let mut other: Vec<String> = subjects.iter().map(ReviewSubject::normalized).collect();
        own.sort();
        own.dedup();
        other.sort();
        other.dedup();
        own == other
    }

    /// Returns whether `candidate` repeats this job while it is still queued or running.
    ///
    /// Duplicates share tenant, requester (ignoring case) and subjects.
    #[must_use]
    pub fn is_in_flight_duplicate_of(&self, candidate: &ReviewJob) -> bool {
        !self.status.is_terminal()
            && self.tenant_id == candidate.tenant_id
            && self
                .requested_by
                .eq_ignore_ascii_case(candidate.requested_by.as_str())
            && self.targets_same_subjects(&candidate.subjects)
    }

    /// Builds the conflict returned when a new job repeats this one.
    #[must_use]
    pub fn duplicate_conflict(&self) -> AppError {
        AppError::Conflict(format!(
            "review job '{}' for the same users and groups is already {}",
            self.job_id,
            self.status.as_str()
        ))
    }

    fn transition_conflict(&self, transition: &str) -> AppError {
        AppError::Conflict(format!(
            "cannot {transition} review job '{}' in status '{}'",
            self.job_id,
            self.status.as_str()
        ))
    }
}

/// Review job listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewJobListQuery {
    /// Optional tenant scope.
    pub tenant_id: Option<TenantId>,
    /// Optional requester subject, compared case-insensitively.
    pub requested_by: Option<String>,
}

/// Repository port for the review job table.
///
/// Every mutating method applies its transition under an exclusive lock on
/// the job record; readers receive snapshots.
#[async_trait]
pub trait ReviewJobRepository: Send + Sync {
    /// Stores a new job.
    ///
    /// The duplicate check and the insert happen under one lock: a job that
    /// repeats a queued or running job is rejected with the conflict from
    /// [`ReviewJob::duplicate_conflict`].
    async fn insert_job(&self, job: ReviewJob) -> AppResult<()>;

    /// Returns one job scoped to a tenant.
    async fn find_job(
        &self,
        tenant_id: TenantId,
        job_id: ReviewJobId,
    ) -> AppResult<Option<ReviewJob>>;

    /// Lists jobs newest first.
    async fn list_jobs(&self, query: ReviewJobListQuery) -> AppResult<Vec<ReviewJob>>;

    /// Claims the oldest queued job and marks it running.
    async fn claim_next_job(&self, started_at: DateTime<Utc>) -> AppResult<Option<ReviewJob>>;

    /// Applies a worker outcome to a job.
    async fn finish_job(
        &self,
        job_id: ReviewJobId,
        outcome: ReviewJobOutcome,
        finished_at: DateTime<Utc>,
    ) -> AppResult<ReviewJob>;

    /// Cancels a job that is not terminal yet.
    async fn cancel_job(
        &self,
        tenant_id: TenantId,
        job_id: ReviewJobId,
        cancelled_at: DateTime<Utc>,
    ) -> AppResult<ReviewJob>;

    /// Deletes terminal jobs that completed before the cutoff.
    async fn delete_finished_jobs(&self, completed_before: DateTime<Utc>) -> AppResult<usize>;
}
