// Route modules
pub mod credits;

use std::time::Duration;

use crate::{app_state::AppState, middleware::logging_middleware};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let request_timeout = Duration::from_millis(state.config.server.request_timeout_ms);

    Router::new()
        .nest("/api/v1", api_v1_routes())
        .layer(middleware::from_fn(logging_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/accounts/{user_id}/credits", get(credits::get_credits_info))
        .route(
            "/accounts/{user_id}/reservations",
            post(credits::reserve_credits),
        )
        .route(
            "/accounts/{user_id}/reservations/recover",
            post(credits::recover_reservation),
        )
        .route(
            "/accounts/{user_id}/reservations/finalize",
            post(credits::finalize_credits),
        )
        .route(
            "/accounts/{user_id}/reservations/release",
            post(credits::release_credits),
        )
}
