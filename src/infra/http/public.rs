use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode, header::CONTENT_TYPE},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use time::{Date, OffsetDateTime};

use crate::{
    application::{
        comments::{MAX_COMMENT_CHARS, MAX_NAME_CHARS},
        content::{ContentService, summarize_tags},
        error::{ErrorReport, HttpError},
        render::BlockRenderer,
        sitemap::SitemapService,
    },
    config::SiteSettings,
    infra::cache::{ResponseCache, response_cache_layer},
    presentation::views::{
        HomeView, IndexTemplate, LayoutChrome, LayoutContext, LinksTemplate, LinksView,
        PostDetailView, PostListTemplate, PostListView, PostTemplate, QuestionView,
        QuestionsTemplate, QuestionsView, ThoughtView, ThoughtsTemplate, ThoughtsView,
        render_not_found_response, render_template_response,
    },
};

use super::{
    RouterState,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub content: Arc<ContentService>,
    pub sitemap: Arc<SitemapService>,
    pub renderer: Arc<BlockRenderer>,
    pub site: Arc<SiteSettings>,
    pub comments_enabled: bool,
    pub cache: Option<ResponseCache>,
}

impl HttpState {
    fn chrome(&self, path: &str, page_title: Option<&str>) -> LayoutChrome {
        LayoutChrome::for_site(&self.site, path, page_title)
    }
}

pub fn build_router(state: RouterState) -> Router<RouterState> {
    let cached_routes = Router::new()
        .route("/", get(index))
        .route("/posts", get(posts_index))
        .route("/posts/tag/{tag}", get(tag_index))
        .route("/posts/{slug}", get(post_detail))
        .route("/field-notes", get(field_notes_index))
        .route("/field-notes/{slug}", get(field_note_detail))
        .route("/open-questions", get(open_questions))
        .route("/brain-atm", get(thoughts))
        .route("/links", get(links))
        .route("/sitemap.xml", get(sitemap))
        .route("/robots.txt", get(robots_txt))
        .fallback(fallback);

    let cached_routes = if let Some(cache) = state.http.cache.clone() {
        cached_routes.layer(middleware::from_fn_with_state(cache, response_cache_layer))
    } else {
        cached_routes
    };

    let uncached_routes = Router::new().route("/_health", get(health));

    cached_routes
        .merge(uncached_routes)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

async fn index(State(state): State<HttpState>) -> Response {
    let posts = match state.content.posts().await {
        Ok(posts) => posts,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let today = today();
    let content = HomeView {
        intro: state.site.description.clone(),
        posts: PostListView::posts(&posts, &[], today).posts,
    };
    let view = LayoutContext::new(state.chrome("/", None), content);
    render_template_response(IndexTemplate { view }, StatusCode::OK)
}

async fn posts_index(State(state): State<HttpState>) -> Response {
    let posts = match state.content.posts().await {
        Ok(posts) => posts,
        Err(err) => return HttpError::from(err).into_response(),
    };
    let tags = summarize_tags(&posts);

    let content = PostListView::posts(&posts, &tags, today());
    let view = LayoutContext::new(state.chrome("/posts", Some("Posts")), content);
    render_template_response(PostListTemplate { view }, StatusCode::OK)
}

async fn tag_index(State(state): State<HttpState>, Path(tag): Path<String>) -> Response {
    let path = format!("/posts/tag/{tag}");
    let posts = match state.content.posts_by_tag(&tag).await {
        Ok(Some(posts)) => posts,
        Ok(None) => return render_not_found_response(state.chrome(&path, None)),
        Err(err) => return HttpError::from(err).into_response(),
    };
    let tags = match state.content.tags().await {
        Ok(tags) => tags,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let content = PostListView::tagged(&tag, &posts, &tags, today());
    let chrome = state.chrome(&path, Some(&tag));
    let chrome = match content.description.clone() {
        Some(description) => chrome.with_description(description),
        None => chrome,
    };
    let view = LayoutContext::new(chrome, content);
    render_template_response(PostListTemplate { view }, StatusCode::OK)
}

async fn post_detail(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    let path = format!("/posts/{slug}");
    match state.content.post(&slug).await {
        Ok(Some(post)) => {
            let chrome = state
                .chrome(&path, Some(&post.summary.title))
                .with_description(post.summary.summary.clone());
            let content = PostDetailView::from_post(&post, &state.renderer, "/posts", today());
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(state.chrome(&path, None)),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn field_notes_index(State(state): State<HttpState>) -> Response {
    let notes = match state.content.field_notes().await {
        Ok(notes) => notes,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let content = PostListView::field_notes(&notes, today());
    let view = LayoutContext::new(state.chrome("/field-notes", Some("Field notes")), content);
    render_template_response(PostListTemplate { view }, StatusCode::OK)
}

async fn field_note_detail(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    let path = format!("/field-notes/{slug}");
    match state.content.field_note(&slug).await {
        Ok(Some(note)) => {
            let chrome = state
                .chrome(&path, Some(&note.summary.title))
                .with_description(note.summary.summary.clone());
            let content =
                PostDetailView::from_post(&note, &state.renderer, "/field-notes", today());
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(state.chrome(&path, None)),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn open_questions(State(state): State<HttpState>) -> Response {
    let questions = match state.content.open_questions().await {
        Ok(questions) => questions,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let content = QuestionsView {
        questions: questions.iter().map(QuestionView::from_question).collect(),
        comments_enabled: state.comments_enabled,
        max_name_chars: MAX_NAME_CHARS,
        max_comment_chars: MAX_COMMENT_CHARS,
    };
    let view = LayoutContext::new(
        state.chrome("/open-questions", Some("Open questions")),
        content,
    );
    render_template_response(QuestionsTemplate { view }, StatusCode::OK)
}

async fn thoughts(State(state): State<HttpState>) -> Response {
    let thoughts = match state.content.thoughts().await {
        Ok(thoughts) => thoughts,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let content = ThoughtsView {
        thoughts: thoughts.iter().map(ThoughtView::from_thought).collect(),
    };
    let view = LayoutContext::new(state.chrome("/brain-atm", Some("Brain ATM")), content);
    render_template_response(ThoughtsTemplate { view }, StatusCode::OK)
}

async fn links(State(state): State<HttpState>) -> Response {
    let blocks = state.content.links().await;
    let content = LinksView {
        body_html: state.renderer.render_html(&blocks),
        is_empty: blocks.is_empty(),
    };
    let view = LayoutContext::new(state.chrome("/links", Some("Links")), content);
    render_template_response(LinksTemplate { view }, StatusCode::OK)
}

async fn sitemap(State(state): State<HttpState>) -> Response {
    match state.sitemap.sitemap_xml(today()).await {
        Ok(xml) => with_content_type(xml, "application/xml; charset=utf-8"),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn robots_txt(State(state): State<HttpState>) -> Response {
    with_content_type(state.sitemap.robots_txt(), "text/plain; charset=utf-8")
}

fn with_content_type(body: String, content_type: &'static str) -> Response {
    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

async fn health(State(state): State<HttpState>) -> Response {
    if state.content.sources().posts_database.is_some() {
        return StatusCode::NO_CONTENT.into_response();
    }

    let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
    ErrorReport::from_message(
        "infra::http::public::health",
        StatusCode::SERVICE_UNAVAILABLE,
        "posts database is not configured",
    )
    .attach(&mut response);
    response
}

async fn fallback(State(state): State<HttpState>, request: Request<Body>) -> Response {
    render_not_found_response(state.chrome(request.uri().path(), None))
}
