//! Port describing the external content store.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, try_join_all};
use serde_json::{Value, json};
use thiserror::Error;

use crate::domain::blocks::Block;
use crate::domain::properties::StorePage;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content store request failed: {0}")]
    Request(String),
    #[error("content store responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("content store response could not be decoded: {0}")]
    Decode(String),
    #[error("content store request timed out")]
    Timeout,
}

impl StoreError {
    pub fn request(err: impl std::fmt::Display) -> Self {
        Self::Request(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Filter expression understood by database queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Checkbox { property: String, equals: bool },
    Select { property: String, equals: String },
    RelationContains { property: String, id: String },
    And(Vec<Filter>),
}

impl Filter {
    pub fn published() -> Self {
        Self::Checkbox {
            property: "Published".to_string(),
            equals: true,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Filter::Checkbox { property, equals } => json!({
                "property": property,
                "checkbox": { "equals": equals }
            }),
            Filter::Select { property, equals } => json!({
                "property": property,
                "select": { "equals": equals }
            }),
            Filter::RelationContains { property, id } => json!({
                "property": property,
                "relation": { "contains": id }
            }),
            Filter::And(filters) => json!({
                "and": filters.iter().map(Filter::to_json).collect::<Vec<_>>()
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub property: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn ascending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Descending,
        }
    }

    pub fn to_json(&self) -> Value {
        let direction = match self.direction {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        };
        json!({ "property": self.property, "direction": direction })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseQuery {
    pub filter: Option<Filter>,
    pub sorts: Vec<Sort>,
}

impl DatabaseQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sorts.push(sort);
        self
    }

    /// Request body without the pagination cursor.
    pub fn to_json(&self) -> Value {
        let mut body = serde_json::Map::new();
        if let Some(filter) = &self.filter {
            body.insert("filter".to_string(), filter.to_json());
        }
        if !self.sorts.is_empty() {
            body.insert(
                "sorts".to_string(),
                Value::Array(self.sorts.iter().map(Sort::to_json).collect()),
            );
        }
        Value::Object(body)
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Every record matching the query, across all result pages.
    async fn query_database(
        &self,
        database_id: &str,
        query: &DatabaseQuery,
    ) -> Result<Vec<StorePage>, StoreError>;

    /// Direct children of a block or page, merged across result pages.
    async fn list_children(&self, block_id: &str) -> Result<Vec<Block>, StoreError>;

    async fn retrieve_page(&self, page_id: &str) -> Result<StorePage, StoreError>;

    /// Create a page under a database; returns the new page id.
    async fn create_page(&self, database_id: &str, properties: Value) -> Result<String, StoreError>;

    async fn append_children(&self, block_id: &str, children: &[Block]) -> Result<(), StoreError>;

    async fn update_page_properties(
        &self,
        page_id: &str,
        properties: Value,
    ) -> Result<(), StoreError>;
}

/// Fetch the children of `block_id` and, recursively, of every child flagged
/// as having its own.
///
/// Sibling subtrees are fetched concurrently; a node's children always resolve
/// before its grandchildren are requested.
pub async fn load_block_tree(
    store: &Arc<dyn ContentStore>,
    block_id: &str,
) -> Result<Vec<Block>, StoreError> {
    let blocks = store.list_children(block_id).await?;
    enrich_children(store.clone(), blocks).await
}

pub fn enrich_children(
    store: Arc<dyn ContentStore>,
    blocks: Vec<Block>,
) -> BoxFuture<'static, Result<Vec<Block>, StoreError>> {
    async move {
        let tasks = blocks.into_iter().map(|mut block| {
            let store = store.clone();
            async move {
                if block.has_children && block.children.is_empty() && !block.id.is_empty() {
                    let children = store.list_children(&block.id).await?;
                    block.children = enrich_children(store, children).await?;
                }
                Ok::<Block, StoreError>(block)
            }
        });
        try_join_all(tasks).await
    }
    .boxed()
}
