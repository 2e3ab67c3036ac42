use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::application::comments::{CommentError, CommentRequest};
use crate::application::revalidate::WebhookPayload;
use crate::application::summary::{SummarizeError, SummaryReport};
use crate::domain::entities::PostSummary;

use super::error::ApiError;
use super::state::ApiState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResource {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub published_at: Option<String>,
    pub summary: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
}

impl From<PostSummary> for PostResource {
    fn from(post: PostSummary) -> Self {
        Self {
            id: post.id,
            slug: post.slug,
            title: post.title,
            published_at: post.published_on.map(|date| date.to_string()),
            summary: post.summary,
            tags: post.tags,
            category: post.category,
        }
    }
}

pub async fn list_posts(State(state): State<ApiState>) -> Response {
    match state.content.posts().await {
        Ok(posts) => Json(
            posts
                .into_iter()
                .map(PostResource::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(err) => ApiError::upstream("Failed to fetch posts", err.to_string())
            .with_source("infra::http::api::list_posts")
            .into_response(),
    }
}

pub async fn create_comment(
    State(state): State<ApiState>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return ApiError::invalid_input(rejection.body_text())
                .with_source("infra::http::api::create_comment")
                .into_response();
        }
    };

    match state.comments.submit(request).await {
        Ok(_) => Json(json!({ "success": true })).into_response(),
        Err(err) => comment_error_response(err),
    }
}

fn comment_error_response(err: CommentError) -> Response {
    let source = "infra::http::api::create_comment";
    match err {
        CommentError::Validation(message) => ApiError::invalid_input(message),
        CommentError::Unconfigured => ApiError::unconfigured("Comments database not configured"),
        CommentError::Store(err) => ApiError::upstream("Failed to create comment", err.to_string()),
    }
    .with_source(source)
    .into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChallengeQuery {
    challenge: Option<String>,
}

/// Webhook endpoint verification: echo the challenge back.
pub async fn revalidate_challenge(Query(query): Query<ChallengeQuery>) -> Response {
    match query.challenge.filter(|challenge| !challenge.is_empty()) {
        Some(challenge) => Json(json!({ "challenge": challenge })).into_response(),
        None => ApiError::bad_request("No challenge provided", None)
            .with_source("infra::http::api::revalidate_challenge")
            .into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RevalidateQuery {
    path: Option<String>,
}

pub async fn revalidate(
    State(state): State<ApiState>,
    Query(query): Query<RevalidateQuery>,
    body: Bytes,
) -> Response {
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        WebhookPayload::default()
    } else {
        match serde_json::from_slice::<WebhookPayload>(&body) {
            Ok(payload) => payload,
            Err(err) => {
                return ApiError::invalid_input(err.to_string())
                    .with_source("infra::http::api::revalidate")
                    .into_response();
            }
        }
    };

    let outcome = state.revalidation.handle(&payload, query.path.as_deref());
    Json(outcome).into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SummarizeQuery {
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SummarizeBody {
    page_id: Option<String>,
    id: Option<String>,
}

#[derive(Debug, Serialize)]
struct SummarizeResponse {
    success: bool,
    message: &'static str,
    #[serde(flatten)]
    report: SummaryReport,
}

/// Page id from `?id=`, else from a JSON body carrying `pageId` or `id`.
fn requested_page_id(query: SummarizeQuery, body: &[u8]) -> String {
    query
        .id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| {
            serde_json::from_slice::<SummarizeBody>(body)
                .ok()
                .and_then(|body| body.page_id.or(body.id))
        })
        .unwrap_or_default()
}

pub async fn summarize_content(
    State(state): State<ApiState>,
    Query(query): Query<SummarizeQuery>,
    body: Bytes,
) -> Response {
    let page_id = requested_page_id(query, &body);
    info!(target = "folio::api::summarize", page_id = %page_id, "summarization requested");

    match state.summaries.summarize(&page_id).await {
        Ok(report) => Json(SummarizeResponse {
            success: true,
            message: "Content summarized and appended successfully",
            report,
        })
        .into_response(),
        Err(err) => summarize_error_response(err),
    }
}

fn summarize_error_response(err: SummarizeError) -> Response {
    let source = "infra::http::api::summarize_content";
    let error = match err {
        SummarizeError::MissingPageId => ApiError::bad_request("Page ID is required", None),
        SummarizeError::MissingSourceUrl => {
            ApiError::bad_request("No URL found in page properties", None)
        }
        SummarizeError::EmptyArticle { url } => {
            ApiError::bad_request("No content extracted from URL", Some(url))
        }
        SummarizeError::Unconfigured => ApiError::unconfigured("Summarizer not configured"),
        other => {
            warn!(
                target = "folio::api::summarize",
                error = %other,
                "summarization failed"
            );
            ApiError::upstream("Failed to process content", other.to_string())
        }
    };
    error.with_source(source).into_response()
}
