//! Visitor comments on open questions.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::application::revalidate::PathInvalidator;
use crate::application::store::{ContentStore, StoreError};
use crate::domain::entities::ANONYMOUS;
use crate::domain::properties::{checkbox_value, relation_value, rich_text_value, title_value};

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_COMMENT_CHARS: usize = 1000;
pub const OPEN_QUESTIONS_PATH: &str = "/open-questions";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentRequest {
    pub question_id: String,
    pub name: Option<String>,
    pub comment: String,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub question_id: String,
    pub author: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("invalid comment: {0}")]
    Validation(String),
    #[error("comments database is not configured")]
    Unconfigured,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CommentRequest {
    pub fn validate(self) -> Result<NewComment, CommentError> {
        let question_id = self.question_id.trim();
        if question_id.is_empty() {
            return Err(CommentError::Validation(
                "questionId must not be empty".to_string(),
            ));
        }

        let name = self.name.unwrap_or_default();
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(CommentError::Validation(format!(
                "name must be at most {MAX_NAME_CHARS} characters"
            )));
        }

        let length = self.comment.chars().count();
        if self.comment.trim().is_empty() || length > MAX_COMMENT_CHARS {
            return Err(CommentError::Validation(format!(
                "comment must be between 1 and {MAX_COMMENT_CHARS} characters"
            )));
        }

        let author = match name.trim() {
            "" => ANONYMOUS.to_string(),
            trimmed => trimmed.to_string(),
        };

        Ok(NewComment {
            question_id: question_id.to_string(),
            author,
            body: self.comment,
        })
    }
}

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn ContentStore>,
    database: Option<String>,
    invalidator: Arc<dyn PathInvalidator>,
}

impl CommentService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        database: Option<String>,
        invalidator: Arc<dyn PathInvalidator>,
    ) -> Self {
        Self {
            store,
            database,
            invalidator,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.database.is_some()
    }

    /// Validate, then write the comment as a published row of the comments
    /// database and drop the cached questions page.
    pub async fn submit(&self, request: CommentRequest) -> Result<String, CommentError> {
        let comment = request.validate()?;
        let database = self
            .database
            .as_deref()
            .ok_or(CommentError::Unconfigured)?;

        let properties = json!({
            "Comment": title_value(&comment.body),
            "Name": rich_text_value(&comment.author),
            "Question": relation_value(&[comment.question_id.as_str()]),
            "Published": checkbox_value(true),
        });
        let page_id = self.store.create_page(database, properties).await?;

        info!(
            target = "folio::comments",
            question_id = %comment.question_id,
            page_id = %page_id,
            "comment created"
        );
        self.invalidator.invalidate_path(OPEN_QUESTIONS_PATH);
        Ok(page_id)
    }
}
