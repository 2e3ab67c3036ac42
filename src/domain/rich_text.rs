//! Styled inline text runs as stored in Notion.

use serde::{Deserialize, Serialize};

/// One run of text sharing identical styling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichText {
    #[serde(rename = "type", default)]
    pub kind: RichTextKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub plain_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RichTextKind {
    #[default]
    Text,
    Mention,
    Equation,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    pub url: String,
}

/// Independent style flags. Absent flags read as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
    pub code: bool,
    pub color: String,
}

impl Default for Annotations {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            strikethrough: false,
            underline: false,
            code: false,
            color: "default".to_string(),
        }
    }
}

impl RichText {
    /// Build an unstyled text span.
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            kind: RichTextKind::Text,
            text: Some(TextContent {
                content: content.into(),
                link: None,
            }),
            annotations: Annotations::default(),
            plain_text: String::new(),
            href: None,
        }
    }

    pub fn with_link(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        match self.text.as_mut() {
            Some(text) => text.link = Some(LinkTarget { url }),
            None => {
                self.text = Some(TextContent {
                    content: self.plain_text.clone(),
                    link: Some(LinkTarget { url }),
                })
            }
        }
        self
    }

    /// The literal text of the span.
    pub fn literal(&self) -> &str {
        if !self.plain_text.is_empty() {
            return &self.plain_text;
        }
        self.text
            .as_ref()
            .map(|text| text.content.as_str())
            .unwrap_or("")
    }

    /// The hyperlink target, preferring the resolved `href`.
    pub fn link_target(&self) -> Option<&str> {
        self.href.as_deref().or_else(|| {
            self.text
                .as_ref()
                .and_then(|text| text.link.as_ref())
                .map(|link| link.url.as_str())
        })
    }
}

/// Concatenate the literal text of every span.
pub fn plain_text_of(spans: &[RichText]) -> String {
    spans.iter().map(RichText::literal).collect()
}
