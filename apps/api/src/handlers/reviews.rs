use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rolereaper_application::{ReviewJobId, ReviewResultLookup};
use rolereaper_core::{AppError, UserIdentity};

use crate::dto::{
    EnqueueReviewRequest, ReviewJobCreatedResponse, ReviewJobResponse, ReviewListQuery,
    ReviewResultPendingResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn enqueue_review_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<EnqueueReviewRequest>,
) -> ApiResult<(StatusCode, Json<ReviewJobCreatedResponse>)> {
    let job_id = state
        .review_coordinator
        .enqueue(&user, payload.try_into()?)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ReviewJobCreatedResponse::from(job_id)),
    ))
}

pub async fn list_reviews_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<ReviewListQuery>,
) -> ApiResult<Json<Vec<ReviewJobResponse>>> {
    let requested_by = (!query.all).then_some(user.subject());
    let jobs = state
        .review_coordinator
        .list(&user, requested_by)
        .await?
        .into_iter()
        .map(ReviewJobResponse::from)
        .collect();

    Ok(Json(jobs))
}

pub async fn review_status_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<ReviewJobResponse>> {
    let job_id = ReviewJobId::parse(job_id.as_str())?;
    let summary = state.review_coordinator.get_status(&user, job_id).await?;

    Ok(Json(ReviewJobResponse::from(summary)))
}

pub async fn review_result_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job_id = ReviewJobId::parse(job_id.as_str())?;

    match state.review_coordinator.get_result(&user, job_id).await? {
        ReviewResultLookup::Ready(result) => Ok((StatusCode::OK, Json(result)).into_response()),
        ReviewResultLookup::Pending(status) => Ok((
            StatusCode::ACCEPTED,
            Json(ReviewResultPendingResponse::new(job_id, status)),
        )
            .into_response()),
        ReviewResultLookup::Unavailable(summary) => Err(AppError::Conflict(format!(
            "review job '{job_id}' ended as {} without a result",
            summary.status.as_str()
        ))
        .into()),
    }
}

pub async fn cancel_review_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(job_id): Path<String>,
) -> ApiResult<StatusCode> {
    let job_id = ReviewJobId::parse(job_id.as_str())?;
    state.review_coordinator.cancel(&user, job_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
