//! Comment throttling keyed by client address.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics::counter;
use time::OffsetDateTime;
use tracing::warn;

use crate::application::rate_limit::RateLimitDecision;

use super::error::ApiError;
use super::state::ApiState;

pub const METRIC_RATE_LIMITED: &str = "folio_rate_limited_total";

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

const CLIENT_ADDRESS_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "x-client-ip"];
const UNKNOWN_CLIENT: &str = "unknown";

/// First address of the first forwarding header present, else `unknown`.
pub fn client_identity(headers: &HeaderMap) -> String {
    CLIENT_ADDRESS_HEADERS
        .iter()
        .find_map(|name| headers.get(*name).and_then(|value| value.to_str().ok()))
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
    headers.insert(
        RESET_HEADER,
        HeaderValue::from(decision.resets_at.unix_timestamp()),
    );
}

pub async fn comment_rate_limit(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_identity(request.headers());
    let now = OffsetDateTime::now_utc();
    let decision = state.rate_limiter.check_at(&client, now);

    if !decision.allowed {
        counter!(METRIC_RATE_LIMITED).increment(1);
        warn!(
            target = "folio::api::ratelimit",
            client = %client,
            limit = decision.limit,
            "comment submission throttled"
        );
        let mut response = ApiError::rate_limited(decision.retry_after_secs(now));
        apply_rate_limit_headers(response.headers_mut(), &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}
