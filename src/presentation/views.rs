use crate::application::error::{ErrorReport, HttpError};
use crate::application::render::{BlockRenderer, rich_text_html};
use crate::application::sitemap::canonical_url;
use crate::config::SiteSettings;
use crate::domain::dates::{format_date, format_timestamp};
use crate::domain::entities::{
    OpenQuestion, Post, PostSummary, QuestionComment, TagSummary, Thought, tag_description,
};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{Date, OffsetDateTime, format_description::well_known::Rfc3339};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct NavigationView {
    pub entries: Vec<NavigationLinkView>,
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct FooterView {
    pub copy: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
    pub canonical: String,
}

const NAVIGATION: &[(&str, &str)] = &[
    ("Posts", "/posts"),
    ("Field notes", "/field-notes"),
    ("Open questions", "/open-questions"),
    ("Brain ATM", "/brain-atm"),
    ("Links", "/links"),
];

#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub footer: FooterView,
    pub meta: PageMetaView,
}

impl LayoutChrome {
    /// Chrome for `path`; `page_title` is prefixed to the site title.
    pub fn for_site(site: &SiteSettings, path: &str, page_title: Option<&str>) -> Self {
        let title = match page_title {
            Some(page) => format!("{page} | {}", site.title),
            None => site.title.clone(),
        };
        let entries = NAVIGATION
            .iter()
            .map(|(label, href)| NavigationLinkView {
                label: (*label).to_string(),
                href: (*href).to_string(),
                is_active: path == *href || path.starts_with(&format!("{href}/")),
            })
            .collect();

        Self {
            brand: BrandView {
                title: site.title.clone(),
                href: "/".to_string(),
            },
            navigation: NavigationView { entries },
            footer: FooterView {
                copy: format!("© {} {}", OffsetDateTime::now_utc().year(), site.title),
            },
            meta: PageMetaView {
                title,
                description: site.description.clone(),
                canonical: canonical_url(site.base_url.as_str(), path),
            },
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if !description.trim().is_empty() {
            self.meta.description = description;
        }
        self
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub footer: FooterView,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            navigation: chrome.navigation,
            footer: chrome.footer,
            meta: chrome.meta,
            content,
        }
    }
}

#[derive(Clone)]
pub struct TagBadge {
    pub label: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub href: String,
    pub title: String,
    pub summary: String,
    pub iso_date: String,
    pub published: String,
    pub badges: Vec<TagBadge>,
}

impl PostCard {
    /// `prefix` is the section the card links into (`/posts` or `/field-notes`).
    pub fn from_summary(post: &PostSummary, prefix: &str, today: Date) -> Self {
        Self {
            href: format!("{prefix}/{}", post.slug),
            title: post.title.clone(),
            summary: post.summary.clone(),
            iso_date: iso_date(post.published_on),
            published: post
                .published_on
                .map(|date| format_date(date, Some(today)))
                .unwrap_or_default(),
            badges: build_tag_badges(&post.tags),
        }
    }
}

#[derive(Clone)]
pub struct TagLinkView {
    pub label: String,
    pub href: String,
    pub count: usize,
    pub is_active: bool,
}

impl TagLinkView {
    pub fn from_summary(tag: &TagSummary, active: Option<&str>) -> Self {
        Self {
            label: tag.name.clone(),
            href: tag_href(&tag.name),
            count: tag.count,
            is_active: active == Some(tag.name.as_str()),
        }
    }
}

pub fn build_tag_badges(tags: &[String]) -> Vec<TagBadge> {
    tags.iter()
        .map(|tag| TagBadge {
            label: tag.clone(),
            href: tag_href(tag),
        })
        .collect()
}

fn tag_href(tag: &str) -> String {
    format!("/posts/tag/{}", url_segment(tag))
}

/// Percent-encode a single path segment.
fn url_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn iso_date(date: Option<Date>) -> String {
    date.map(|date| date.to_string()).unwrap_or_default()
}

pub struct HomeView {
    pub intro: String,
    pub posts: Vec<PostCard>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<HomeView>,
}

pub struct PostListView {
    pub heading: String,
    pub description: Option<String>,
    pub posts: Vec<PostCard>,
    pub tags: Vec<TagLinkView>,
    pub empty_message: String,
}

impl PostListView {
    pub fn posts(posts: &[PostSummary], tags: &[TagSummary], today: Date) -> Self {
        Self {
            heading: "Posts".to_string(),
            description: None,
            posts: cards(posts, "/posts", today),
            tags: tags.iter().map(|tag| TagLinkView::from_summary(tag, None)).collect(),
            empty_message: "No posts yet.".to_string(),
        }
    }

    pub fn tagged(tag: &str, posts: &[PostSummary], tags: &[TagSummary], today: Date) -> Self {
        Self {
            heading: format!("Posts tagged “{tag}”"),
            description: tag_description(tag).map(str::to_string),
            posts: cards(posts, "/posts", today),
            tags: tags
                .iter()
                .map(|summary| TagLinkView::from_summary(summary, Some(tag)))
                .collect(),
            empty_message: "No posts carry this tag.".to_string(),
        }
    }

    pub fn field_notes(notes: &[PostSummary], today: Date) -> Self {
        Self {
            heading: "Field notes".to_string(),
            description: tag_description("field-notes").map(str::to_string),
            posts: cards(notes, "/field-notes", today),
            tags: Vec::new(),
            empty_message: "No field notes yet.".to_string(),
        }
    }
}

fn cards(posts: &[PostSummary], prefix: &str, today: Date) -> Vec<PostCard> {
    posts
        .iter()
        .map(|post| PostCard::from_summary(post, prefix, today))
        .collect()
}

#[derive(Template)]
#[template(path = "posts.html")]
pub struct PostListTemplate {
    pub view: LayoutContext<PostListView>,
}

pub struct PostDetailView {
    pub title: String,
    pub published: String,
    pub iso_date: String,
    pub badges: Vec<TagBadge>,
    pub body_html: String,
    pub back_href: String,
    pub back_label: String,
}

impl PostDetailView {
    pub fn from_post(post: &Post, renderer: &BlockRenderer, section: &str, today: Date) -> Self {
        let (back_href, back_label) = match section {
            "/field-notes" => ("/field-notes", "All field notes"),
            _ => ("/posts", "All posts"),
        };
        Self {
            title: post.summary.title.clone(),
            published: post
                .summary
                .published_on
                .map(|date| format_date(date, Some(today)))
                .unwrap_or_default(),
            iso_date: iso_date(post.summary.published_on),
            badges: build_tag_badges(&post.summary.tags),
            body_html: renderer.render_html(&post.blocks),
            back_href: back_href.to_string(),
            back_label: back_label.to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailView>,
}

pub struct CommentView {
    pub author: String,
    pub body_html: String,
    pub posted: String,
}

impl CommentView {
    fn from_comment(comment: &QuestionComment) -> Self {
        Self {
            author: comment.author.clone(),
            body_html: rich_text_html(&comment.body),
            posted: timestamp_label(comment.created_at),
        }
    }
}

pub struct QuestionView {
    pub id: String,
    pub question_html: String,
    pub tags: Vec<String>,
    pub asked: String,
    pub comments: Vec<CommentView>,
}

impl QuestionView {
    pub fn from_question(question: &OpenQuestion) -> Self {
        Self {
            id: question.id.clone(),
            question_html: rich_text_html(&question.question),
            tags: question.tags.clone(),
            asked: timestamp_label(question.created_at),
            comments: question.comments.iter().map(CommentView::from_comment).collect(),
        }
    }
}

pub struct QuestionsView {
    pub questions: Vec<QuestionView>,
    pub comments_enabled: bool,
    pub max_name_chars: usize,
    pub max_comment_chars: usize,
}

#[derive(Template)]
#[template(path = "open_questions.html")]
pub struct QuestionsTemplate {
    pub view: LayoutContext<QuestionsView>,
}

pub struct ThoughtView {
    pub text_html: String,
    pub posted: String,
    pub iso_timestamp: String,
}

impl ThoughtView {
    pub fn from_thought(thought: &Thought) -> Self {
        Self {
            text_html: rich_text_html(&thought.text),
            posted: timestamp_label(thought.created_at),
            iso_timestamp: thought
                .created_at
                .and_then(|at| at.format(&Rfc3339).ok())
                .unwrap_or_default(),
        }
    }
}

pub struct ThoughtsView {
    pub thoughts: Vec<ThoughtView>,
}

#[derive(Template)]
#[template(path = "thoughts.html")]
pub struct ThoughtsTemplate {
    pub view: LayoutContext<ThoughtsView>,
}

pub struct LinksView {
    pub body_html: String,
    pub is_empty: bool,
}

#[derive(Template)]
#[template(path = "links.html")]
pub struct LinksTemplate {
    pub view: LayoutContext<LinksView>,
}

fn timestamp_label(timestamp: Option<OffsetDateTime>) -> String {
    timestamp.map(format_timestamp).unwrap_or_default()
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist. Try returning to the homepage to continue exploring.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
