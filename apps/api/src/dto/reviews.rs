use chrono::{DateTime, Utc};
use rolereaper_application::{EnqueueReviewInput, ReviewJobId, ReviewJobStatus, ReviewJobSummary};
use rolereaper_core::AppError;
use rolereaper_domain::ReviewSubject;
use serde::{Deserialize, Serialize};

/// Incoming payload for enqueueing a review job.
///
/// Subjects are `user:<id>`, `group:<id>` or a bare user id.
#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueReviewRequest {
    pub subjects: Vec<String>,
    pub audit_from: DateTime<Utc>,
    pub audit_to: DateTime<Utc>,
}

impl TryFrom<EnqueueReviewRequest> for EnqueueReviewInput {
    type Error = AppError;

    fn try_from(value: EnqueueReviewRequest) -> Result<Self, Self::Error> {
        let subjects = value
            .subjects
            .iter()
            .map(|subject| ReviewSubject::parse(subject.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            subjects,
            audit_from: value.audit_from,
            audit_to: value.audit_to,
        })
    }
}

/// Response returned when a job is accepted.
#[derive(Debug, Serialize)]
pub struct ReviewJobCreatedResponse {
    pub job_id: String,
}

impl From<ReviewJobId> for ReviewJobCreatedResponse {
    fn from(value: ReviewJobId) -> Self {
        Self {
            job_id: value.to_string(),
        }
    }
}

/// Query string of the job list endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ReviewListQuery {
    /// Lists every job of the tenant instead of only the caller's.
    #[serde(default)]
    pub all: bool,
}

/// Status view of one review job.
#[derive(Debug, Serialize)]
pub struct ReviewJobResponse {
    pub job_id: String,
    pub requested_by: String,
    pub status: String,
    pub subject_count: usize,
    pub audit_from: DateTime<Utc>,
    pub audit_to: DateTime<Utc>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl From<ReviewJobSummary> for ReviewJobResponse {
    fn from(value: ReviewJobSummary) -> Self {
        Self {
            job_id: value.job_id.to_string(),
            requested_by: value.requested_by,
            status: value.status.as_str().to_owned(),
            subject_count: value.subject_count,
            audit_from: value.audit_from,
            audit_to: value.audit_to,
            enqueued_at: value.enqueued_at,
            started_at: value.started_at,
            completed_at: value.completed_at,
            error: value.error,
        }
    }
}

/// Response returned while a job's result is not ready yet.
#[derive(Debug, Serialize)]
pub struct ReviewResultPendingResponse {
    pub job_id: String,
    pub status: String,
}

impl ReviewResultPendingResponse {
    pub fn new(job_id: ReviewJobId, status: ReviewJobStatus) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: status.as_str().to_owned(),
        }
    }
}
