//! Chat-completions client for the OpenRouter API.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::summary::{ChatMessage, Completion, LanguageModel};
use crate::config::{SiteSettings, SummarizerSettings};

use super::error::InfraError;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone, Debug)]
pub struct OpenRouterClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    referer: String,
    app_title: String,
}

impl OpenRouterClient {
    /// Returns `Ok(None)` when no API key is configured.
    pub fn from_settings(
        settings: &SummarizerSettings,
        site: &SiteSettings,
    ) -> Result<Option<Self>, InfraError> {
        let Some(api_key) = settings.api_key.clone() else {
            return Ok(None);
        };

        let mut endpoint = settings.api_base.clone();
        endpoint
            .path_segments_mut()
            .map_err(|_| InfraError::configuration("summarizer.api_base cannot take a path"))?
            .pop_if_empty()
            .extend(["chat", "completions"]);

        let client = Client::builder()
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("http client: {err}")))?;

        Ok(Some(Self {
            client,
            endpoint,
            api_key,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens.get(),
            temperature: settings.temperature,
            referer: site.base_url.to_string(),
            app_title: settings.app_title.clone(),
        }))
    }
}

#[async_trait]
impl LanguageModel for OpenRouterClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion, InfraError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.app_title)
            .json(&body)
            .send()
            .await
            .map_err(|err| InfraError::upstream(format!("completion request failed: {err}")))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| InfraError::upstream(format!("completion body: {err}")))?;
        if !status.is_success() {
            return Err(InfraError::upstream(format!(
                "completion API returned {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&bytes)
            )));
        }

        let parsed: CompletionResponse = serde_json::from_slice(&bytes)
            .map_err(|err| InfraError::upstream(format!("completion response: {err}")))?;
        let completion = into_completion(parsed, &self.model);
        debug!(
            target = "folio::openrouter",
            model = %completion.model,
            characters = completion.content.chars().count(),
            "completion received"
        );
        Ok(completion)
    }
}

fn into_completion(response: CompletionResponse, requested: &str) -> Completion {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();
    Completion {
        content,
        model: response.model.unwrap_or_else(|| requested.to_string()),
    }
}
