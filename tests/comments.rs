mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use folio::application::content::ContentSources;
use serde_json::{Value, json};
use support::{
    COMMENTS_DB, MemoryStore, StoreWrite, TestAppBuilder, all_sources, body_json, body_string,
    question_page,
};
use tower::ServiceExt;

fn comment_request(body: Value, client: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/comments")
        .header("content-type", "application/json")
        .header("x-forwarded-for", client)
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn valid_comment_is_written_as_published_row() {
    let app = TestAppBuilder::new(MemoryStore::default()).build();

    let response = app
        .router
        .clone()
        .oneshot(comment_request(
            json!({ "questionId": "q-1", "name": "  Ada ", "comment": "Have you tried bisecting?" }),
            "203.0.113.1",
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-ratelimit-limit")
            .and_then(|value| value.to_str().ok()),
        Some("100")
    );
    assert_eq!(body_json(response).await, json!({ "success": true }));

    let writes = app.store.writes().await;
    assert_eq!(writes.len(), 1);
    let StoreWrite::CreatePage {
        database_id,
        properties,
    } = &writes[0]
    else {
        panic!("expected a created page, got {writes:?}");
    };
    assert_eq!(database_id, COMMENTS_DB);
    assert_eq!(
        properties["Comment"]["title"][0]["text"]["content"],
        "Have you tried bisecting?"
    );
    assert_eq!(properties["Name"]["rich_text"][0]["text"]["content"], "Ada");
    assert_eq!(properties["Question"]["relation"][0]["id"], "q-1");
    assert_eq!(properties["Published"]["checkbox"], true);
}

#[tokio::test]
async fn blank_name_is_recorded_as_anonymous() {
    let app = TestAppBuilder::new(MemoryStore::default()).build();

    let response = app
        .router
        .clone()
        .oneshot(comment_request(
            json!({ "questionId": "q-1", "comment": "Interesting" }),
            "203.0.113.2",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let writes = app.store.writes().await;
    let StoreWrite::CreatePage { properties, .. } = &writes[0] else {
        panic!("expected a created page");
    };
    assert_eq!(
        properties["Name"]["rich_text"][0]["text"]["content"],
        "Anonymous"
    );
}

#[tokio::test]
async fn overlong_comment_is_rejected_without_writing() {
    let app = TestAppBuilder::new(MemoryStore::default()).build();

    let response = app
        .router
        .clone()
        .oneshot(comment_request(
            json!({ "questionId": "q-1", "comment": "a".repeat(1001) }),
            "203.0.113.3",
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_input");
    assert!(app.store.writes().await.is_empty());
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let app = TestAppBuilder::new(MemoryStore::default()).build();

    let request = Request::builder()
        .method("POST")
        .uri("/api/comments")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let response = app.router.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.writes().await.is_empty());
}

#[tokio::test]
async fn store_write_failure_returns_generic_error() {
    let app = TestAppBuilder::new(MemoryStore {
        fail_writes: true,
        ..MemoryStore::default()
    })
    .build();

    let response = app
        .router
        .clone()
        .oneshot(comment_request(
            json!({ "questionId": "q-1", "name": "Ada", "comment": "Still broken?" }),
            "203.0.113.4",
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let raw = body_string(response).await;
    assert!(!raw.contains("object_not_found"), "store detail leaked: {raw}");
    assert!(!raw.contains(COMMENTS_DB), "database id leaked: {raw}");
    let body: Value = serde_json::from_str(&raw).expect("json body");
    assert_eq!(body["error"]["code"], "upstream_error");
    assert_eq!(body["error"]["message"], "Failed to create comment");
    assert!(body["error"].get("hint").is_none());
    assert!(app.store.writes().await.is_empty());
}

#[tokio::test]
async fn fourth_comment_in_window_is_throttled() {
    let app = TestAppBuilder::new(MemoryStore::default())
        .rate_limit(3)
        .build();

    for attempt in 0..3 {
        let response = app
            .router
            .clone()
            .oneshot(comment_request(
                json!({ "questionId": "q-1", "comment": format!("comment {attempt}") }),
                "198.51.100.9",
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK, "attempt {attempt}");
    }

    let response = app
        .router
        .clone()
        .oneshot(comment_request(
            json!({ "questionId": "q-1", "comment": "one too many" }),
            "198.51.100.9",
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let headers = response.headers();
    assert_eq!(
        headers.get("x-ratelimit-limit").and_then(|v| v.to_str().ok()),
        Some("3")
    );
    assert_eq!(
        headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok()),
        Some("0")
    );
    assert!(headers.contains_key("x-ratelimit-reset"));
    let retry_after: u64 = headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("retry-after seconds");
    assert!(retry_after <= 60);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "rate_limited");
    assert_eq!(app.store.writes().await.len(), 3);

    let other_client = app
        .router
        .clone()
        .oneshot(comment_request(
            json!({ "questionId": "q-1", "comment": "different address" }),
            "198.51.100.10",
        ))
        .await
        .expect("response");
    assert_eq!(other_client.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_comments_database_returns_service_unavailable() {
    let sources = ContentSources {
        comments_database: None,
        ..all_sources()
    };
    let app = TestAppBuilder::new(MemoryStore::default())
        .sources(sources)
        .build();

    let response = app
        .router
        .clone()
        .oneshot(comment_request(
            json!({ "questionId": "q-1", "comment": "hello" }),
            "203.0.113.4",
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"]["code"], "not_configured");
    assert!(app.store.writes().await.is_empty());
}

#[tokio::test]
async fn accepted_comment_drops_cached_questions_page() {
    let mut store = MemoryStore::default();
    store.databases.insert(
        support::QUESTIONS_DB.to_string(),
        vec![question_page("q-1", "Why do caches go stale?")],
    );
    let app = TestAppBuilder::new(store).with_cache().build();
    let cache = app.cache.clone().expect("cache enabled");

    let page = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/open-questions")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(page.status(), StatusCode::OK);
    let html = body_string(page).await;
    assert!(html.contains("Why do caches go stale?"));
    assert!(html.contains("data-question-id=\"q-1\""));
    assert!(cache.contains("/open-questions"));

    let response = app
        .router
        .clone()
        .oneshot(comment_request(
            json!({ "questionId": "q-1", "comment": "TTLs" }),
            "203.0.113.5",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!cache.contains("/open-questions"));
}
