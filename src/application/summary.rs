//! Summarise the article a store page links to and write the result back.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::application::markdown::markdown_to_blocks;
use crate::application::store::{ContentStore, StoreError};
use crate::domain::blocks::Block;
use crate::domain::dates::format_timestamp;
use crate::domain::entities::UNTITLED;
use crate::domain::properties::title_value;
use crate::domain::rich_text::RichText;
use crate::infra::error::InfraError;

/// Article bodies are cut to this many characters before prompting.
pub const MAX_ARTICLE_CHARS: usize = 12_000;
pub const SUMMARY_HEADING: &str = "🤖 AI Generated Summary";

pub const SYSTEM_PROMPT: &str = "You are a research assistant that creates concise, insightful summaries of content.

Create a comprehensive summary that includes:
1. **Main Topic & Key Points**: Identify the central theme and 3-5 most important points
2. **Key Insights**: Highlight any unique perspectives, findings, or revelations
3. **Actionable Takeaways**: List specific actions or applications readers can implement
4. **Notable Data**: Include any significant quotes, statistics, or data points
5. **Context & Relevance**: Briefly explain why this content matters

Format Guidelines:
- Use clear sections with headers
- Include bullet points for easy scanning
- Keep the summary between 300-500 words
- Use markdown formatting for structure
- Focus on value and utility for researchers

Write in a professional but accessible tone.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub model: String,
}

#[async_trait]
pub trait ArticleReader: Send + Sync {
    async fn read(&self, url: &str) -> Result<Article, InfraError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion, InfraError>;
}

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("page id is required")]
    MissingPageId,
    #[error("no URL found in page properties")]
    MissingSourceUrl,
    #[error("no content extracted from {url}")]
    EmptyArticle { url: String },
    #[error("model returned an empty summary")]
    EmptySummary,
    #[error("summarizer is not configured")]
    Unconfigured,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Upstream(#[from] InfraError),
}

/// Outcome reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub title: String,
    pub summary_length: usize,
    pub model: String,
    pub title_updated: bool,
}

/// System prompt plus the article, truncated to [`MAX_ARTICLE_CHARS`].
pub fn summarization_messages(content: &str) -> Vec<ChatMessage> {
    let excerpt: String = content.chars().take(MAX_ARTICLE_CHARS).collect();
    vec![
        ChatMessage {
            role: Role::System,
            content: SYSTEM_PROMPT.to_string(),
        },
        ChatMessage {
            role: Role::User,
            content: format!("Please summarize the following content:\n\n{excerpt}"),
        },
    ]
}

/// Converted summary framed by a divider, a labelled heading and a dated footer.
pub fn summary_blocks(summary: &str, generated_at: OffsetDateTime) -> Vec<Block> {
    let mut blocks = vec![
        Block::divider(),
        Block::heading(2, vec![RichText::plain(SUMMARY_HEADING)]),
    ];
    blocks.extend(markdown_to_blocks(summary));

    let mut footer = RichText::plain(format!(
        "Generated on {}",
        format_timestamp(generated_at)
    ));
    footer.annotations.italic = true;
    footer.annotations.color = "gray".to_string();
    blocks.push(Block::paragraph(vec![footer]));
    blocks
}

#[derive(Clone)]
pub struct SummaryService {
    store: Arc<dyn ContentStore>,
    reader: Arc<dyn ArticleReader>,
    model: Option<Arc<dyn LanguageModel>>,
}

impl SummaryService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        reader: Arc<dyn ArticleReader>,
        model: Option<Arc<dyn LanguageModel>>,
    ) -> Self {
        Self {
            store,
            reader,
            model,
        }
    }

    pub async fn summarize(&self, page_id: &str) -> Result<SummaryReport, SummarizeError> {
        let page_id = page_id.trim();
        if page_id.is_empty() {
            return Err(SummarizeError::MissingPageId);
        }
        let model = self.model.as_ref().ok_or(SummarizeError::Unconfigured)?;

        let page = self.store.retrieve_page(page_id).await?;
        let url = page.source_url().ok_or(SummarizeError::MissingSourceUrl)?;
        info!(target = "folio::summary", page_id, url = %url, "extracting article");

        let article = self.reader.read(&url).await?;
        if article.content.trim().is_empty() {
            return Err(SummarizeError::EmptyArticle { url });
        }
        info!(
            target = "folio::summary",
            page_id,
            characters = article.content.chars().count(),
            "article extracted"
        );

        let completion = model
            .complete(&summarization_messages(&article.content))
            .await?;
        if completion.content.trim().is_empty() {
            return Err(SummarizeError::EmptySummary);
        }

        let blocks = summary_blocks(&completion.content, OffsetDateTime::now_utc());
        self.store.append_children(page_id, &blocks).await?;

        let title = article
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());
        let title_updated = match page.title() {
            Some(current) if current != UNTITLED => false,
            _ => {
                let properties = serde_json::json!({ "Title": title_value(&title) });
                self.store.update_page_properties(page_id, properties).await?;
                true
            }
        };

        info!(
            target = "folio::summary",
            page_id,
            blocks = blocks.len(),
            title_updated,
            model = %completion.model,
            "summary appended"
        );
        Ok(SummaryReport {
            title,
            summary_length: completion.content.chars().count(),
            model: completion.model,
            title_updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blocks::BlockKind;
    use time::macros::datetime;

    #[test]
    fn messages_truncate_article() {
        let content = "x".repeat(MAX_ARTICLE_CHARS + 50);
        let messages = summarization_messages(&content);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.starts_with("You are a research assistant"));
        let prefix = "Please summarize the following content:\n\n";
        assert_eq!(
            messages[1].content.chars().count(),
            prefix.chars().count() + MAX_ARTICLE_CHARS
        );
    }

    #[test]
    fn envelope_brackets_converted_content() {
        let blocks = summary_blocks(
            "## Key Points\n\n- one\n- two",
            datetime!(2025-01-05 15:04 UTC),
        );

        assert_eq!(blocks.len(), 6);
        assert!(matches!(blocks[0].kind, BlockKind::Divider));
        assert_eq!(blocks[1].plain_text(), SUMMARY_HEADING);
        assert!(matches!(blocks[1].kind, BlockKind::Heading2(_)));
        assert_eq!(blocks[2].plain_text(), "Key Points");

        let footer = blocks.last().expect("footer");
        assert_eq!(
            footer.plain_text(),
            "Generated on January 5, 2025 at 3:04 PM"
        );
        let span = &footer.rich_text().expect("footer text")[0];
        assert!(span.annotations.italic);
        assert_eq!(span.annotations.color, "gray");
    }

    #[test]
    fn envelope_is_stable_apart_from_footer() {
        let first = summary_blocks("# A\n\ntext", datetime!(2025-01-05 15:04 UTC));
        let second = summary_blocks("# A\n\ntext", datetime!(2026-02-01 09:00 UTC));
        assert_eq!(first[..first.len() - 1], second[..second.len() - 1]);
    }
}
