mod reviews;

use serde::Serialize;

pub use reviews::{
    EnqueueReviewRequest, ReviewJobCreatedResponse, ReviewJobResponse, ReviewListQuery,
    ReviewResultPendingResponse,
};

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
