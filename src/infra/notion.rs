//! Notion REST client implementing the content store port.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::application::store::{ContentStore, DatabaseQuery, StoreError};
use crate::config::NotionSettings;
use crate::domain::blocks::Block;
use crate::domain::properties::StorePage;

use super::error::InfraError;

const PAGE_SIZE: u32 = 100;
/// The API accepts at most this many children per append.
const APPEND_BATCH: usize = 100;

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedPage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NotionClient {
    client: Client,
    base: Url,
    token: String,
    version: String,
}

impl NotionClient {
    pub fn new(settings: &NotionSettings) -> Result<Self, InfraError> {
        let token = settings
            .token
            .clone()
            .ok_or_else(|| InfraError::configuration("notion token is not configured"))?;
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("http client: {err}")))?;

        Ok(Self {
            client,
            base: settings.api_base.clone(),
            token,
            version: settings.version.clone(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("folio/", env!("CARGO_PKG_VERSION"))
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Request(format!("base URL `{}` cannot take a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.version)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;

        if !status.is_success() {
            let message = match serde_json::from_slice::<ApiErrorBody>(&bytes) {
                Ok(ApiErrorBody {
                    code: Some(code),
                    message: Some(message),
                }) => format!("{code}: {message}"),
                Ok(ApiErrorBody {
                    message: Some(message),
                    ..
                }) => message,
                _ => String::from_utf8_lossy(&bytes).into_owned(),
            };
            warn!(
                target = "folio::notion",
                status = status.as_u16(),
                message = %message,
                "notion request failed"
            );
            return Err(StoreError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&bytes).map_err(StoreError::decode)
    }
}

fn map_transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::request(err)
    }
}

#[async_trait]
impl ContentStore for NotionClient {
    async fn query_database(
        &self,
        database_id: &str,
        query: &DatabaseQuery,
    ) -> Result<Vec<StorePage>, StoreError> {
        let url = self.url(&["databases", database_id, "query"])?;
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = query.to_json();
            if let Value::Object(map) = &mut body {
                map.insert("page_size".to_string(), json!(PAGE_SIZE));
                if let Some(cursor) = cursor.take() {
                    map.insert("start_cursor".to_string(), Value::String(cursor));
                }
            }

            let batch: ListResponse<StorePage> = self
                .send(self.request(Method::POST, url.clone()).json(&body))
                .await?;
            pages.extend(batch.results);

            match batch.next_cursor {
                Some(next) if batch.has_more => cursor = Some(next),
                _ => break,
            }
        }

        debug!(
            target = "folio::notion",
            database_id,
            pages = pages.len(),
            "database queried"
        );
        Ok(pages)
    }

    async fn list_children(&self, block_id: &str) -> Result<Vec<Block>, StoreError> {
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut url = self.url(&["blocks", block_id, "children"])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("page_size", &PAGE_SIZE.to_string());
                if let Some(cursor) = cursor.as_deref() {
                    query.append_pair("start_cursor", cursor);
                }
            }

            let batch: ListResponse<Block> = self.send(self.request(Method::GET, url)).await?;
            blocks.extend(batch.results);

            match batch.next_cursor {
                Some(next) if batch.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(blocks)
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<StorePage, StoreError> {
        let url = self.url(&["pages", page_id])?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn create_page(&self, database_id: &str, properties: Value) -> Result<String, StoreError> {
        let url = self.url(&["pages"])?;
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });
        let created: CreatedPage = self
            .send(self.request(Method::POST, url).json(&body))
            .await?;
        Ok(created.id)
    }

    async fn append_children(&self, block_id: &str, children: &[Block]) -> Result<(), StoreError> {
        let url = self.url(&["blocks", block_id, "children"])?;
        for batch in children.chunks(APPEND_BATCH) {
            let body = json!({ "children": batch });
            let _: Value = self
                .send(self.request(Method::PATCH, url.clone()).json(&body))
                .await?;
        }
        Ok(())
    }

    async fn update_page_properties(
        &self,
        page_id: &str,
        properties: Value,
    ) -> Result<(), StoreError> {
        let url = self.url(&["pages", page_id])?;
        let body = json!({ "properties": properties });
        let _: Value = self
            .send(self.request(Method::PATCH, url).json(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::application::content::ContentSources;

    fn settings(base: &str) -> NotionSettings {
        NotionSettings {
            token: Some("secret".to_string()),
            api_base: Url::parse(base).expect("url"),
            version: "2022-06-28".to_string(),
            timeout: Duration::from_secs(5),
            sources: ContentSources::default(),
        }
    }

    #[test]
    fn urls_extend_the_versioned_base() {
        let client = NotionClient::new(&settings("https://api.notion.com/v1")).expect("client");
        let url = client
            .url(&["databases", "abc", "query"])
            .expect("url builds");
        assert_eq!(url.as_str(), "https://api.notion.com/v1/databases/abc/query");

        let client = NotionClient::new(&settings("https://api.notion.com/v1/")).expect("client");
        let url = client.url(&["pages", "p1"]).expect("url builds");
        assert_eq!(url.as_str(), "https://api.notion.com/v1/pages/p1");
    }

    #[test]
    fn missing_token_is_a_configuration_error() {
        let mut settings = settings("https://api.notion.com/v1");
        settings.token = None;
        assert!(matches!(
            NotionClient::new(&settings),
            Err(InfraError::Configuration { .. })
        ));
    }

    #[test]
    fn list_responses_tolerate_missing_cursor() {
        let parsed: ListResponse<Value> =
            serde_json::from_value(json!({ "results": [1, 2], "has_more": false }))
                .expect("parses");
        assert_eq!(parsed.results.len(), 2);
        assert!(parsed.next_cursor.is_none());
    }
}
