pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod state;

pub use rate_limit::METRIC_RATE_LIMITED;
pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::RouterState;
use crate::infra::http::middleware::{log_responses, set_request_context};

pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    let rate_state = state.api.clone();

    let comments = Router::new()
        .route("/api/comments", post(handlers::create_comment))
        .route_layer(axum_middleware::from_fn_with_state(
            rate_state,
            rate_limit::comment_rate_limit,
        ));

    Router::new()
        .route("/api/posts", get(handlers::list_posts))
        .route(
            "/api/revalidate",
            get(handlers::revalidate_challenge).post(handlers::revalidate),
        )
        .route("/api/summarize-content", post(handlers::summarize_content))
        .merge(comments)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
