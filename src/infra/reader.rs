//! Article extraction through a reader proxy that returns page text as JSON.

use async_trait::async_trait;
use reqwest::{Client, Url, header};
use serde::Deserialize;
use tracing::debug;

use crate::application::summary::{Article, ArticleReader};
use crate::config::SummarizerSettings;

use super::error::InfraError;

#[derive(Debug, Default, Deserialize)]
struct ReaderDocument {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReaderResponse {
    #[serde(default)]
    data: Option<ReaderDocument>,
    #[serde(flatten)]
    document: ReaderDocument,
}

impl ReaderResponse {
    fn into_article(self) -> Article {
        let ReaderResponse { data, document } = self;
        let nested = data.unwrap_or_default();

        let title = nested.title.or(document.title);
        let content = nested
            .content
            .or(nested.text)
            .or(document.content)
            .or(document.text)
            .unwrap_or_default();

        Article { title, content }
    }
}

#[derive(Clone, Debug)]
pub struct JinaReader {
    client: Client,
    base: Url,
}

impl JinaReader {
    pub fn new(settings: &SummarizerSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("http client: {err}")))?;

        Ok(Self {
            client,
            base: settings.reader_base.clone(),
        })
    }

    /// The target URL is appended verbatim after the reader's base path.
    fn endpoint(&self, target: &str) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), target)
    }
}

#[async_trait]
impl ArticleReader for JinaReader {
    async fn read(&self, url: &str) -> Result<Article, InfraError> {
        let response = self
            .client
            .get(self.endpoint(url))
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| InfraError::upstream(format!("reader request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InfraError::upstream(format!(
                "reader returned {} for {url}",
                status.as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| InfraError::upstream(format!("reader body: {err}")))?;
        let parsed: ReaderResponse = serde_json::from_slice(&bytes)
            .map_err(|err| InfraError::upstream(format!("reader response: {err}")))?;

        let article = parsed.into_article();
        debug!(
            target = "folio::reader",
            url,
            characters = article.content.chars().count(),
            "article fetched"
        );
        Ok(article)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> Article {
        serde_json::from_value::<ReaderResponse>(value)
            .expect("parses")
            .into_article()
    }

    #[test]
    fn nested_data_wins() {
        let article = parse(json!({
            "code": 200,
            "data": { "title": "Paper", "content": "Body" }
        }));
        assert_eq!(article.title.as_deref(), Some("Paper"));
        assert_eq!(article.content, "Body");
    }

    #[test]
    fn top_level_text_is_accepted() {
        let article = parse(json!({ "text": "Plain body" }));
        assert!(article.title.is_none());
        assert_eq!(article.content, "Plain body");
    }

    #[test]
    fn missing_content_is_empty() {
        assert_eq!(parse(json!({ "data": {} })).content, "");
    }

    #[test]
    fn endpoint_keeps_target_scheme() {
        let reader = JinaReader {
            client: Client::new(),
            base: Url::parse("https://r.jina.ai").expect("url"),
        };
        assert_eq!(
            reader.endpoint("https://example.com/a"),
            "https://r.jina.ai/https://example.com/a"
        );
    }
}
