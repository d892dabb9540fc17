use rolereaper_application::ReviewCoordinator;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub review_coordinator: ReviewCoordinator,
}
