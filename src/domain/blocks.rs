//! Content blocks: the tree-shaped page body stored in Notion.
//!
//! Blocks arrive as `{ "type": "<kind>", "<kind>": { ...payload } }`. The
//! discriminator and payload are folded into [`BlockKind`] on the way in; any
//! kind this site does not understand, or whose payload fails to parse, is kept
//! as [`BlockKind::Unsupported`] so a single odd block never sinks a page.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::rich_text::{RichText, plain_text_of};

pub const DEFAULT_CALLOUT_ICON: &str = "💡";
pub const PLAIN_TEXT_LANGUAGE: &str = "plain text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBlock", into = "RawBlock")]
pub struct Block {
    pub id: String,
    /// Set by the store when children exist, whether or not they were fetched.
    pub has_children: bool,
    pub children: Vec<Block>,
    pub kind: BlockKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Paragraph(TextBlock),
    Heading1(TextBlock),
    Heading2(TextBlock),
    Heading3(TextBlock),
    BulletedListItem(TextBlock),
    NumberedListItem(TextBlock),
    Code(CodeBlock),
    Quote(TextBlock),
    Callout(CalloutBlock),
    Divider,
    Image(ImageBlock),
    Bookmark(LinkBlock),
    LinkPreview(LinkBlock),
    Embed(LinkBlock),
    Unsupported { kind: String, payload: Value },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bulleted,
    Numbered,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default = "plain_text_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caption: Vec<RichText>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalloutBlock {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Icon {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<FileRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caption: Vec<RichText>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkBlock {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caption: Vec<RichText>,
}

fn plain_text_language() -> String {
    PLAIN_TEXT_LANGUAGE.to_string()
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Self {
            id: String::new(),
            has_children: false,
            children: Vec::new(),
            kind,
        }
    }

    pub fn paragraph(rich_text: Vec<RichText>) -> Self {
        Self::new(BlockKind::Paragraph(TextBlock { rich_text }))
    }

    /// Heading at `level`, clamped into the three levels the store supports.
    pub fn heading(level: u8, rich_text: Vec<RichText>) -> Self {
        let text = TextBlock { rich_text };
        Self::new(match level.clamp(1, 3) {
            1 => BlockKind::Heading1(text),
            2 => BlockKind::Heading2(text),
            _ => BlockKind::Heading3(text),
        })
    }

    pub fn list_item(kind: ListKind, rich_text: Vec<RichText>) -> Self {
        let text = TextBlock { rich_text };
        Self::new(match kind {
            ListKind::Bulleted => BlockKind::BulletedListItem(text),
            ListKind::Numbered => BlockKind::NumberedListItem(text),
        })
    }

    pub fn quote(rich_text: Vec<RichText>) -> Self {
        Self::new(BlockKind::Quote(TextBlock { rich_text }))
    }

    pub fn code(literal: impl Into<String>, language: impl Into<String>) -> Self {
        let language = language.into();
        Self::new(BlockKind::Code(CodeBlock {
            rich_text: vec![RichText::plain(literal)],
            language: if language.trim().is_empty() {
                plain_text_language()
            } else {
                language
            },
            caption: Vec::new(),
        }))
    }

    pub fn divider() -> Self {
        Self::new(BlockKind::Divider)
    }

    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        self.has_children = !children.is_empty();
        self.children = children;
        self
    }

    /// The store's discriminator string for this block.
    pub fn discriminator(&self) -> &str {
        self.kind.discriminator()
    }

    pub fn list_kind(&self) -> Option<ListKind> {
        match self.kind {
            BlockKind::BulletedListItem(_) => Some(ListKind::Bulleted),
            BlockKind::NumberedListItem(_) => Some(ListKind::Numbered),
            _ => None,
        }
    }

    /// Rich text carried by text-bearing blocks.
    pub fn rich_text(&self) -> Option<&[RichText]> {
        match &self.kind {
            BlockKind::Paragraph(text)
            | BlockKind::Heading1(text)
            | BlockKind::Heading2(text)
            | BlockKind::Heading3(text)
            | BlockKind::BulletedListItem(text)
            | BlockKind::NumberedListItem(text)
            | BlockKind::Quote(text) => Some(&text.rich_text),
            BlockKind::Code(code) => Some(&code.rich_text),
            BlockKind::Callout(callout) => Some(&callout.rich_text),
            _ => None,
        }
    }

    pub fn plain_text(&self) -> String {
        self.rich_text().map(plain_text_of).unwrap_or_default()
    }
}

impl BlockKind {
    pub fn discriminator(&self) -> &str {
        match self {
            BlockKind::Paragraph(_) => "paragraph",
            BlockKind::Heading1(_) => "heading_1",
            BlockKind::Heading2(_) => "heading_2",
            BlockKind::Heading3(_) => "heading_3",
            BlockKind::BulletedListItem(_) => "bulleted_list_item",
            BlockKind::NumberedListItem(_) => "numbered_list_item",
            BlockKind::Code(_) => "code",
            BlockKind::Quote(_) => "quote",
            BlockKind::Callout(_) => "callout",
            BlockKind::Divider => "divider",
            BlockKind::Image(_) => "image",
            BlockKind::Bookmark(_) => "bookmark",
            BlockKind::LinkPreview(_) => "link_preview",
            BlockKind::Embed(_) => "embed",
            BlockKind::Unsupported { kind, .. } => kind,
        }
    }

    fn parse(kind: &str, payload: Value) -> Result<Self, serde_json::Error> {
        use serde_json::from_value;

        let parsed = match kind {
            "paragraph" => BlockKind::Paragraph(from_value(payload)?),
            "heading_1" => BlockKind::Heading1(from_value(payload)?),
            "heading_2" => BlockKind::Heading2(from_value(payload)?),
            "heading_3" => BlockKind::Heading3(from_value(payload)?),
            "bulleted_list_item" => BlockKind::BulletedListItem(from_value(payload)?),
            "numbered_list_item" => BlockKind::NumberedListItem(from_value(payload)?),
            "code" => BlockKind::Code(from_value(payload)?),
            "quote" => BlockKind::Quote(from_value(payload)?),
            "callout" => BlockKind::Callout(from_value(payload)?),
            "divider" => BlockKind::Divider,
            "image" => BlockKind::Image(from_value(payload)?),
            "bookmark" => BlockKind::Bookmark(from_value(payload)?),
            "link_preview" => BlockKind::LinkPreview(from_value(payload)?),
            "embed" => BlockKind::Embed(from_value(payload)?),
            other => BlockKind::Unsupported {
                kind: other.to_string(),
                payload,
            },
        };
        Ok(parsed)
    }

    fn payload(&self) -> Value {
        let encoded = match self {
            BlockKind::Paragraph(text)
            | BlockKind::Heading1(text)
            | BlockKind::Heading2(text)
            | BlockKind::Heading3(text)
            | BlockKind::BulletedListItem(text)
            | BlockKind::NumberedListItem(text)
            | BlockKind::Quote(text) => serde_json::to_value(text),
            BlockKind::Code(code) => serde_json::to_value(code),
            BlockKind::Callout(callout) => serde_json::to_value(callout),
            BlockKind::Divider => Ok(Value::Object(Map::new())),
            BlockKind::Image(image) => serde_json::to_value(image),
            BlockKind::Bookmark(link) | BlockKind::LinkPreview(link) | BlockKind::Embed(link) => {
                serde_json::to_value(link)
            }
            BlockKind::Unsupported { payload, .. } => Ok(payload.clone()),
        };
        encoded.unwrap_or_default()
    }
}

impl ImageBlock {
    /// Externally hosted URL first, then the store-hosted file URL.
    pub fn source_url(&self) -> Option<&str> {
        [self.external.as_ref(), self.file.as_ref()]
            .into_iter()
            .flatten()
            .map(|file| file.url.trim())
            .find(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    object: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default, skip_serializing_if = "is_false")]
    has_children: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Block>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl From<RawBlock> for Block {
    fn from(raw: RawBlock) -> Self {
        let RawBlock {
            id,
            kind,
            has_children,
            children,
            mut rest,
            ..
        } = raw;

        let payload = rest
            .remove(&kind)
            .unwrap_or_else(|| Value::Object(Map::new()));

        let kind = match BlockKind::parse(&kind, payload.clone()) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(
                    target = "folio::domain::blocks",
                    block_id = %id,
                    block_type = %kind,
                    error = %err,
                    "block payload did not match its type; keeping it as unsupported"
                );
                BlockKind::Unsupported { kind, payload }
            }
        };

        Self {
            id,
            has_children,
            children,
            kind,
        }
    }
}

impl From<Block> for RawBlock {
    fn from(block: Block) -> Self {
        let kind = block.discriminator().to_string();
        let mut rest = Map::new();
        rest.insert(kind.clone(), block.kind.payload());
        Self {
            object: Some("block".to_string()),
            id: block.id,
            kind,
            has_children: block.has_children,
            children: block.children,
            rest,
        }
    }
}
