use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{get, post};

use crate::state::AppState;
use crate::{handlers, middleware};

pub(super) fn build_review_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/reviews",
            get(handlers::reviews::list_reviews_handler)
                .post(handlers::reviews::enqueue_review_handler),
        )
        .route(
            "/api/reviews/{job_id}",
            get(handlers::reviews::review_status_handler),
        )
        .route(
            "/api/reviews/{job_id}/result",
            get(handlers::reviews::review_result_handler),
        )
        .route(
            "/api/reviews/{job_id}/cancel",
            post(handlers::reviews::cancel_review_handler),
        )
        .route_layer(from_fn(middleware::require_identity))
}
