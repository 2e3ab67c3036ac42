//! In-memory doubles for the content store, article reader and language model.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::Response;
use folio::application::comments::CommentService;
use folio::application::content::{ContentService, ContentSources};
use folio::application::rate_limit::FixedWindowRateLimiter;
use folio::application::render::block_renderer;
use folio::application::revalidate::{
    NoopInvalidator, PathInvalidator, RevalidationPlanner, RevalidationService,
};
use folio::application::sitemap::SitemapService;
use folio::application::store::{ContentStore, DatabaseQuery, Filter, StoreError};
use folio::application::summary::{
    Article, ArticleReader, ChatMessage, Completion, LanguageModel, SummaryService,
};
use folio::config::SiteSettings;
use folio::domain::blocks::Block;
use folio::domain::properties::StorePage;
use folio::infra::cache::ResponseCache;
use folio::infra::error::InfraError;
use folio::infra::http::{ApiState, HttpState, RouterState, build_app};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use url::Url;

pub const POSTS_DB: &str = "posts-db";
pub const QUESTIONS_DB: &str = "questions-db";
pub const COMMENTS_DB: &str = "comments-db";
pub const THOUGHTS_DB: &str = "thoughts-db";
pub const LINKS_PAGE: &str = "links-page";

#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    CreatePage { database_id: String, properties: Value },
    AppendChildren { block_id: String, children: Vec<Block> },
    UpdateProperties { page_id: String, properties: Value },
}

#[derive(Default)]
pub struct MemoryStore {
    pub databases: HashMap<String, Vec<StorePage>>,
    pub pages: HashMap<String, StorePage>,
    pub children: HashMap<String, Vec<Block>>,
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub writes: Mutex<Vec<StoreWrite>>,
}

impl MemoryStore {
    fn write_guard(&self, id: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Status {
                status: 404,
                message: format!("object_not_found: Could not find database with ID: {id}"),
            });
        }
        Ok(())
    }

    pub async fn writes(&self) -> Vec<StoreWrite> {
        self.writes.lock().await.clone()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn query_database(
        &self,
        database_id: &str,
        query: &DatabaseQuery,
    ) -> Result<Vec<StorePage>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Timeout);
        }
        let pages = self.databases.get(database_id).cloned().unwrap_or_default();
        if let Some(Filter::And(filters)) = &query.filter
            && let Some(Filter::RelationContains { property, id }) = filters.first()
        {
            return Ok(pages
                .into_iter()
                .filter(|page| page.relation_ids(property).contains(id))
                .collect());
        }
        Ok(pages)
    }

    async fn list_children(&self, block_id: &str) -> Result<Vec<Block>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Timeout);
        }
        Ok(self.children.get(block_id).cloned().unwrap_or_default())
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<StorePage, StoreError> {
        self.pages
            .get(page_id)
            .cloned()
            .ok_or_else(|| StoreError::Status {
                status: 404,
                message: format!("Could not find page with ID: {page_id}"),
            })
    }

    async fn create_page(&self, database_id: &str, properties: Value) -> Result<String, StoreError> {
        self.write_guard(database_id)?;
        let mut writes = self.writes.lock().await;
        writes.push(StoreWrite::CreatePage {
            database_id: database_id.to_string(),
            properties,
        });
        Ok(format!("created-{}", writes.len()))
    }

    async fn append_children(&self, block_id: &str, children: &[Block]) -> Result<(), StoreError> {
        self.write_guard(block_id)?;
        self.writes.lock().await.push(StoreWrite::AppendChildren {
            block_id: block_id.to_string(),
            children: children.to_vec(),
        });
        Ok(())
    }

    async fn update_page_properties(
        &self,
        page_id: &str,
        properties: Value,
    ) -> Result<(), StoreError> {
        self.write_guard(page_id)?;
        self.writes.lock().await.push(StoreWrite::UpdateProperties {
            page_id: page_id.to_string(),
            properties,
        });
        Ok(())
    }
}

pub struct StaticReader {
    pub article: Article,
    pub requests: Mutex<Vec<String>>,
}

impl StaticReader {
    pub fn new(title: Option<&str>, content: &str) -> Self {
        Self {
            article: Article {
                title: title.map(str::to_string),
                content: content.to_string(),
            },
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ArticleReader for StaticReader {
    async fn read(&self, url: &str) -> Result<Article, InfraError> {
        self.requests.lock().await.push(url.to_string());
        Ok(self.article.clone())
    }
}

pub struct ScriptedModel {
    pub reply: Result<String, String>,
    pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion, InfraError> {
        self.prompts.lock().await.push(messages.to_vec());
        match &self.reply {
            Ok(content) => Ok(Completion {
                content: content.clone(),
                model: "test/model".to_string(),
            }),
            Err(message) => Err(InfraError::upstream(message.clone())),
        }
    }
}

pub fn all_sources() -> ContentSources {
    ContentSources {
        posts_database: Some(POSTS_DB.to_string()),
        questions_database: Some(QUESTIONS_DB.to_string()),
        comments_database: Some(COMMENTS_DB.to_string()),
        thoughts_database: Some(THOUGHTS_DB.to_string()),
        links_page: Some(LINKS_PAGE.to_string()),
    }
}

pub struct TestAppBuilder {
    store: MemoryStore,
    sources: ContentSources,
    rate_limit: u32,
    cache: bool,
    reader: Arc<dyn ArticleReader>,
    model: Option<Arc<dyn LanguageModel>>,
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub cache: Option<ResponseCache>,
}

impl TestAppBuilder {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            sources: all_sources(),
            rate_limit: 100,
            cache: false,
            reader: Arc::new(StaticReader::new(None, "")),
            model: None,
        }
    }

    pub fn sources(mut self, sources: ContentSources) -> Self {
        self.sources = sources;
        self
    }

    pub fn rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = limit;
        self
    }

    pub fn with_cache(mut self) -> Self {
        self.cache = true;
        self
    }

    pub fn reader(mut self, reader: Arc<dyn ArticleReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn build(self) -> TestApp {
        let store = Arc::new(self.store);
        let dyn_store: Arc<dyn ContentStore> = store.clone();

        let cache = self
            .cache
            .then(|| ResponseCache::new(std::num::NonZeroUsize::new(32).expect("non-zero")));
        let invalidator: Arc<dyn PathInvalidator> = match cache.clone() {
            Some(cache) => Arc::new(cache),
            None => Arc::new(NoopInvalidator),
        };

        let content = Arc::new(ContentService::new(dyn_store.clone(), self.sources.clone()));
        let comments = Arc::new(CommentService::new(
            dyn_store.clone(),
            self.sources.comments_database.clone(),
            invalidator.clone(),
        ));
        let revalidation = Arc::new(RevalidationService::new(
            RevalidationPlanner::from_sources(&self.sources),
            invalidator,
        ));
        let summaries = Arc::new(SummaryService::new(
            dyn_store.clone(),
            self.reader,
            self.model,
        ));
        let site = site_settings();
        let sitemap = Arc::new(SitemapService::new(content.clone(), site.base_url.clone()));

        let state = RouterState {
            http: HttpState {
                content: content.clone(),
                sitemap,
                renderer: block_renderer(),
                site: Arc::new(site),
                comments_enabled: comments.is_configured(),
                cache: cache.clone(),
            },
            api: ApiState {
                content,
                comments,
                revalidation,
                summaries,
                rate_limiter: Arc::new(FixedWindowRateLimiter::new(
                    self.rate_limit,
                    Duration::from_secs(60),
                )),
            },
        };

        TestApp {
            router: build_app(state),
            store,
            cache,
        }
    }
}

pub fn site_settings() -> SiteSettings {
    SiteSettings {
        base_url: Url::parse("https://folio.test").expect("url"),
        title: "Folio".to_string(),
        description: "Notes from the workshop.".to_string(),
    }
}

pub fn page(value: Value) -> StorePage {
    serde_json::from_value(value).expect("page parses")
}

fn text(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content }, "plain_text": content }])
}

pub fn post_page(id: &str, title: &str, date: &str, tags: &[&str], category: Option<&str>) -> StorePage {
    let tags: Vec<Value> = tags.iter().map(|name| json!({ "name": name })).collect();
    let category = category.map_or(Value::Null, |name| json!({ "name": name }));
    page(json!({
        "id": id,
        "properties": {
            "Name": { "type": "title", "title": text(title) },
            "Date": { "type": "date", "date": { "start": date } },
            "Summary": { "type": "rich_text", "rich_text": text("A short summary") },
            "Tags": { "type": "multi_select", "multi_select": tags },
            "Category": { "type": "select", "select": category },
            "Published": { "type": "checkbox", "checkbox": true }
        }
    }))
}

pub fn question_page(id: &str, question: &str) -> StorePage {
    page(json!({
        "id": id,
        "created_time": "2024-05-01T10:00:00.000Z",
        "properties": {
            "Question": { "type": "title", "title": text(question) },
            "Tags": { "type": "multi_select", "multi_select": [{ "name": "ml" }] },
            "Published": { "type": "checkbox", "checkbox": true }
        }
    }))
}

pub fn comment_page(id: &str, question_id: &str, body: &str, name: &str) -> StorePage {
    page(json!({
        "id": id,
        "created_time": "2024-05-02T09:30:00.000Z",
        "properties": {
            "Comment": { "type": "title", "title": text(body) },
            "Name": { "type": "rich_text", "rich_text": text(name) },
            "Question": { "type": "relation", "relation": [{ "id": question_id }] },
            "Published": { "type": "checkbox", "checkbox": true }
        }
    }))
}

pub fn thought_page(id: &str, thought: &str) -> StorePage {
    page(json!({
        "id": id,
        "created_time": "2024-05-03T08:00:00.000Z",
        "properties": {
            "Thought": { "type": "title", "title": text(thought) },
            "Published": { "type": "checkbox", "checkbox": true }
        }
    }))
}

pub fn source_page(id: &str, title: Option<&str>, url: &str) -> StorePage {
    let title = title.map_or_else(|| json!([]), text);
    page(json!({
        "id": id,
        "properties": {
            "Title": { "type": "title", "title": title },
            "URL": { "type": "url", "url": url }
        }
    }))
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}
