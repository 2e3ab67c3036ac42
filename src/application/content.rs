//! Read-side service assembling site content from the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::application::store::{
    ContentStore, DatabaseQuery, Filter, Sort, StoreError, load_block_tree,
};
use crate::domain::blocks::Block;
use crate::domain::entities::{
    OpenQuestion, Post, PostSummary, QuestionComment, TagSummary, Thought, tag_description,
};

const CREATED_TIME: &str = "Created time";

/// Identifiers of the store databases and pages backing each section.
///
/// A missing identifier leaves its section empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSources {
    pub posts_database: Option<String>,
    pub questions_database: Option<String>,
    pub comments_database: Option<String>,
    pub thoughts_database: Option<String>,
    pub links_page: Option<String>,
}

#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn ContentStore>,
    sources: ContentSources,
}

impl ContentService {
    pub fn new(store: Arc<dyn ContentStore>, sources: ContentSources) -> Self {
        Self { store, sources }
    }

    pub fn sources(&self) -> &ContentSources {
        &self.sources
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Published posts, newest first.
    pub async fn posts(&self) -> Result<Vec<PostSummary>, StoreError> {
        let Some(database) = self.sources.posts_database.as_deref() else {
            return Ok(Vec::new());
        };

        let query = DatabaseQuery::new()
            .filter(Filter::published())
            .sort(Sort::descending("Date"));
        let pages = self.store.query_database(database, &query).await?;
        Ok(pages.iter().map(PostSummary::from_page).collect())
    }

    pub async fn field_notes(&self) -> Result<Vec<PostSummary>, StoreError> {
        let mut posts = self.posts().await?;
        posts.retain(PostSummary::is_field_note);
        Ok(posts)
    }

    /// A published post with its block tree, or `None` when no slug matches.
    pub async fn post(&self, slug: &str) -> Result<Option<Post>, StoreError> {
        let summary = self.posts().await?.into_iter().find(|post| post.slug == slug);
        self.with_blocks(summary).await
    }

    pub async fn field_note(&self, slug: &str) -> Result<Option<Post>, StoreError> {
        let summary = self
            .field_notes()
            .await?
            .into_iter()
            .find(|post| post.slug == slug);
        self.with_blocks(summary).await
    }

    async fn with_blocks(&self, summary: Option<PostSummary>) -> Result<Option<Post>, StoreError> {
        let Some(summary) = summary else {
            return Ok(None);
        };
        let blocks = load_block_tree(&self.store, &summary.id).await?;
        debug!(
            target = "folio::content",
            slug = %summary.slug,
            blocks = blocks.len(),
            "loaded post blocks"
        );
        Ok(Some(Post { summary, blocks }))
    }

    /// Every tag used by a published post with its post count, sorted by name.
    pub async fn tags(&self) -> Result<Vec<TagSummary>, StoreError> {
        Ok(summarize_tags(&self.posts().await?))
    }

    /// Posts carrying `tag`, or `None` when no post uses it.
    pub async fn posts_by_tag(&self, tag: &str) -> Result<Option<Vec<PostSummary>>, StoreError> {
        let posts = self.posts().await?;
        if !posts.iter().any(|post| post.has_tag(tag)) {
            return Ok(None);
        }
        Ok(Some(
            posts.into_iter().filter(|post| post.has_tag(tag)).collect(),
        ))
    }

    /// Published questions, newest first, each with its published comments.
    pub async fn open_questions(&self) -> Result<Vec<OpenQuestion>, StoreError> {
        let Some(database) = self.sources.questions_database.as_deref() else {
            return Ok(Vec::new());
        };

        let query = DatabaseQuery::new()
            .filter(Filter::published())
            .sort(Sort::descending(CREATED_TIME));
        let pages = self.store.query_database(database, &query).await?;
        let questions: Vec<OpenQuestion> = pages.iter().map(OpenQuestion::from_page).collect();

        let comments = try_join_all(
            questions
                .iter()
                .map(|question| self.question_comments(&question.id)),
        )
        .await?;

        Ok(questions
            .into_iter()
            .zip(comments)
            .map(|(mut question, comments)| {
                question.comments = comments;
                question
            })
            .collect())
    }

    /// Published comments on one question, oldest first.
    pub async fn question_comments(
        &self,
        question_id: &str,
    ) -> Result<Vec<QuestionComment>, StoreError> {
        let Some(database) = self.sources.comments_database.as_deref() else {
            return Ok(Vec::new());
        };

        let query = DatabaseQuery::new()
            .filter(Filter::And(vec![
                Filter::RelationContains {
                    property: "Question".to_string(),
                    id: question_id.to_string(),
                },
                Filter::published(),
            ]))
            .sort(Sort::ascending(CREATED_TIME));
        let pages = self.store.query_database(database, &query).await?;
        Ok(pages.iter().map(QuestionComment::from_page).collect())
    }

    pub async fn thoughts(&self) -> Result<Vec<Thought>, StoreError> {
        let Some(database) = self.sources.thoughts_database.as_deref() else {
            return Ok(Vec::new());
        };

        let query = DatabaseQuery::new()
            .filter(Filter::published())
            .sort(Sort::descending(CREATED_TIME));
        let pages = self.store.query_database(database, &query).await?;
        Ok(pages.iter().map(Thought::from_page).collect())
    }

    /// Blocks of the links page. Store failures leave the page empty.
    pub async fn links(&self) -> Vec<Block> {
        let Some(page) = self.sources.links_page.as_deref() else {
            return Vec::new();
        };

        match load_block_tree(&self.store, page).await {
            Ok(blocks) => blocks,
            Err(err) => {
                warn!(
                    target = "folio::content",
                    page_id = %page,
                    error = %err,
                    "failed to load links page"
                );
                Vec::new()
            }
        }
    }
}

pub fn summarize_tags(posts: &[PostSummary]) -> Vec<TagSummary> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for tag in posts.iter().flat_map(|post| post.tags.iter()) {
        *counts.entry(tag.as_str()).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|(name, count)| TagSummary {
            name: name.to_string(),
            count,
            description: tag_description(name),
        })
        .collect()
}
