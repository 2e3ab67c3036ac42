//! HTML rendering of content blocks.

mod embeds;
mod highlight;
mod rich_text;

use std::sync::Arc;

use metrics::counter;
use once_cell::sync::Lazy;
use syntect::{html::ClassStyle, parsing::SyntaxSet};
use tracing::warn;

use crate::domain::blocks::{
    Block, BlockKind, CalloutBlock, CodeBlock, DEFAULT_CALLOUT_ICON, ImageBlock, LinkBlock,
    ListKind, TextBlock,
};
use crate::domain::rich_text::{RichText, plain_text_of};

use embeds::EmbedTarget;
pub use rich_text::{render_rich_text, render_span, rich_text_html};

pub const METRIC_UNSUPPORTED_BLOCKS: &str = "folio_unsupported_blocks_total";

const ATTRIBUTION_PREFIXES: [&str; 2] = ["Source", "Inspiration"];

/// Contiguous blocks that render under one parent node.
#[derive(Debug, PartialEq)]
pub enum RenderGroup<'a> {
    List { kind: ListKind, items: Vec<&'a Block> },
    Single(&'a Block),
}

/// Group adjacent list items of the same kind.
///
/// A change of list kind, or any non-list block, closes the pending run.
pub fn group_blocks(blocks: &[Block]) -> Vec<RenderGroup<'_>> {
    let mut groups = Vec::new();
    let mut pending: Option<(ListKind, Vec<&Block>)> = None;

    for block in blocks {
        match (block.list_kind(), pending.as_mut()) {
            (Some(kind), Some((current, items))) if *current == kind => items.push(block),
            (Some(kind), _) => {
                if let Some((kind, items)) = pending.take() {
                    groups.push(RenderGroup::List { kind, items });
                }
                pending = Some((kind, vec![block]));
            }
            (None, _) => {
                if let Some((kind, items)) = pending.take() {
                    groups.push(RenderGroup::List { kind, items });
                }
                groups.push(RenderGroup::Single(block));
            }
        }
    }

    if let Some((kind, items)) = pending {
        groups.push(RenderGroup::List { kind, items });
    }
    groups
}

/// Block-tree renderer with syntax highlighting for code blocks.
pub struct BlockRenderer {
    syntax_set: SyntaxSet,
    class_style: ClassStyle,
}

static BLOCK_RENDERER: Lazy<Arc<BlockRenderer>> = Lazy::new(|| Arc::new(BlockRenderer::new()));

/// Shared renderer instance, initialised on first use.
pub fn block_renderer() -> Arc<BlockRenderer> {
    Arc::clone(&BLOCK_RENDERER)
}

impl Default for BlockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockRenderer {
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            class_style: ClassStyle::SpacedPrefixed { prefix: "syntax-" },
        }
    }

    /// One markup node per render group, in input order.
    pub fn render(&self, blocks: &[Block]) -> Vec<String> {
        group_blocks(blocks)
            .into_iter()
            .filter_map(|group| match group {
                RenderGroup::List { kind, items } => Some(self.render_list(kind, &items)),
                RenderGroup::Single(block) => self.render_block(block),
            })
            .collect()
    }

    pub fn render_html(&self, blocks: &[Block]) -> String {
        self.render(blocks).join("\n")
    }

    fn render_list(&self, kind: ListKind, items: &[&Block]) -> String {
        let (tag, class) = match kind {
            ListKind::Bulleted => ("ul", "list-disc"),
            ListKind::Numbered => ("ol", "list-decimal"),
        };
        let entries: String = items.iter().map(|item| self.render_list_item(item)).collect();
        format!("<{tag} class=\"{class}\">{entries}</{tag}>")
    }

    fn render_list_item(&self, block: &Block) -> String {
        let text = block.rich_text().map(rich_text_html).unwrap_or_default();
        let nested = self.render(&block.children).concat();
        format!("<li>{text}{nested}</li>")
    }

    /// Markup for a block outside a list run. `None` means the block is omitted.
    pub fn render_block(&self, block: &Block) -> Option<String> {
        let html = match &block.kind {
            BlockKind::Paragraph(text) => render_paragraph(text),
            BlockKind::Heading1(text) => format!("<h1>{}</h1>", rich_text_html(&text.rich_text)),
            BlockKind::Heading2(text) => format!("<h2>{}</h2>", rich_text_html(&text.rich_text)),
            BlockKind::Heading3(text) => format!("<h3>{}</h3>", rich_text_html(&text.rich_text)),
            BlockKind::BulletedListItem(_) => self.render_list(ListKind::Bulleted, &[block]),
            BlockKind::NumberedListItem(_) => self.render_list(ListKind::Numbered, &[block]),
            BlockKind::Code(code) => self.render_code(code),
            BlockKind::Quote(text) => format!(
                "<blockquote>{}{}</blockquote>",
                rich_text_html(&text.rich_text),
                self.render(&block.children).concat()
            ),
            BlockKind::Callout(callout) => self.render_callout(callout, &block.children),
            BlockKind::Divider => "<hr>".to_string(),
            BlockKind::Image(image) => render_image(image)?,
            BlockKind::Bookmark(link) | BlockKind::LinkPreview(link) | BlockKind::Embed(link) => {
                render_link_block(link)?
            }
            BlockKind::Unsupported { kind, .. } => {
                warn!(
                    target = "folio::render",
                    block_id = %block.id,
                    block_type = %kind,
                    "skipping unsupported block"
                );
                counter!(METRIC_UNSUPPORTED_BLOCKS, "block_type" => kind.clone()).increment(1);
                return None;
            }
        };
        Some(html)
    }

    fn render_code(&self, code: &CodeBlock) -> String {
        let literal = plain_text_of(&code.rich_text);
        let language = code.language.to_ascii_lowercase();
        let body = match highlight::highlight_code(
            &language,
            &literal,
            &self.syntax_set,
            self.class_style,
        ) {
            Ok(html) => html,
            Err(err) => {
                warn!(
                    target = "folio::render",
                    language = %language,
                    error = %err,
                    "syntax highlighting failed; rendering plain code"
                );
                highlight::plain_code(&literal)
            }
        };

        let language_attr = escape_attribute(&language);
        let class_suffix = language.replace(char::is_whitespace, "-");
        let pre = format!(
            "<pre class=\"code-block syntax-highlight\" data-language=\"{language_attr}\"><code class=\"language-{}\">{body}</code></pre>",
            escape_attribute(&class_suffix)
        );

        if code.caption.is_empty() {
            pre
        } else {
            format!(
                "<figure class=\"code-figure\">{pre}<figcaption>{}</figcaption></figure>",
                rich_text_html(&code.caption)
            )
        }
    }

    fn render_callout(&self, callout: &CalloutBlock, children: &[Block]) -> String {
        let icon = callout
            .icon
            .as_ref()
            .and_then(|icon| icon.emoji.as_deref())
            .filter(|glyph| !glyph.is_empty())
            .unwrap_or(DEFAULT_CALLOUT_ICON);
        format!(
            "<div class=\"callout\"><span class=\"callout-icon\" aria-hidden=\"true\">{}</span><div class=\"callout-body\">{}{}</div></div>",
            escape_html(icon),
            rich_text_html(&callout.rich_text),
            self.render(children).concat()
        )
    }
}

fn render_paragraph(text: &TextBlock) -> String {
    if text.rich_text.iter().all(|span| span.literal().is_empty()) {
        return "<div class=\"spacer\" aria-hidden=\"true\"></div>".to_string();
    }

    let body = rich_text_html(&text.rich_text);
    if is_attribution(&text.rich_text) {
        format!("<p class=\"source-attribution\">{body}</p>")
    } else {
        format!("<p>{body}</p>")
    }
}

fn is_attribution(spans: &[RichText]) -> bool {
    spans.first().is_some_and(|span| {
        let literal = span.literal();
        ATTRIBUTION_PREFIXES
            .iter()
            .any(|prefix| literal.starts_with(prefix))
    })
}

fn render_image(image: &ImageBlock) -> Option<String> {
    let src = image.source_url()?;
    let alt = plain_text_of(&image.caption);
    let caption = if image.caption.is_empty() {
        String::new()
    } else {
        format!("<figcaption>{}</figcaption>", rich_text_html(&image.caption))
    };
    Some(format!(
        "<figure class=\"image\"><img src=\"{}\" alt=\"{}\" loading=\"lazy\">{caption}</figure>",
        escape_attribute(src),
        escape_attribute(&alt)
    ))
}

fn render_link_block(link: &LinkBlock) -> Option<String> {
    let url = link.url.trim();
    if url.is_empty() {
        return None;
    }

    let html = match embeds::classify(url) {
        EmbedTarget::SocialPost { id } => format!(
            "<div class=\"social-embed\"><blockquote class=\"twitter-tweet\" data-tweet-id=\"{id}\"><a href=\"{url}\" target=\"_blank\" rel=\"noopener noreferrer\">View post</a></blockquote></div>",
            id = escape_attribute(&id),
            url = escape_attribute(url)
        ),
        EmbedTarget::Video { id } => format!(
            "<div class=\"video-embed\"><iframe src=\"https://www.youtube.com/embed/{}\" title=\"Embedded video\" loading=\"lazy\" allowfullscreen></iframe></div>",
            escape_attribute(&id)
        ),
        EmbedTarget::Link if !rich_text::is_safe_href(url) => {
            warn!(
                target = "folio::render",
                url = %url,
                "dropping link block with disallowed scheme"
            );
            return None;
        }
        EmbedTarget::Link => {
            let caption = plain_text_of(&link.caption);
            let title = link
                .title
                .as_deref()
                .map(str::trim)
                .filter(|title| !title.is_empty())
                .or_else(|| Some(caption.trim()).filter(|text| !text.is_empty()))
                .unwrap_or(url);
            format!(
                "<a class=\"link-card\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\"><span class=\"link-card-title\">{}</span><span class=\"link-card-url\">{}</span></a>",
                escape_attribute(url),
                escape_html(title),
                escape_html(url)
            )
        }
    };
    Some(html)
}

pub(crate) fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub(crate) fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\n' | '\r' | '\t' => escaped.push(' '),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blocks::{FileRef, Icon};
    use serde_json::json;

    fn bullet(text: &str) -> Block {
        Block::list_item(ListKind::Bulleted, vec![RichText::plain(text)])
    }

    fn numbered(text: &str) -> Block {
        Block::list_item(ListKind::Numbered, vec![RichText::plain(text)])
    }

    fn para(text: &str) -> Block {
        Block::paragraph(vec![RichText::plain(text)])
    }

    #[test]
    fn adjacent_list_items_share_one_container() {
        let blocks = vec![bullet("a"), bullet("b"), bullet("c")];
        let nodes = BlockRenderer::new().render(&blocks);

        assert_eq!(nodes.len(), 1);
        assert_eq!(
            nodes[0],
            "<ul class=\"list-disc\"><li><span>a</span></li><li><span>b</span></li><li><span>c</span></li></ul>"
        );
    }

    #[test]
    fn list_kind_change_splits_containers() {
        let blocks = vec![bullet("a"), numbered("b")];
        let groups = group_blocks(&blocks);
        assert_eq!(groups.len(), 2);

        let nodes = BlockRenderer::new().render(&blocks);
        assert!(nodes[0].starts_with("<ul"));
        assert!(nodes[1].starts_with("<ol class=\"list-decimal\">"));
    }

    #[test]
    fn intervening_block_flushes_pending_run() {
        let blocks = vec![bullet("a"), para("between"), bullet("b")];
        let groups = group_blocks(&blocks);
        assert!(matches!(groups[0], RenderGroup::List { ref items, .. } if items.len() == 1));
        assert!(matches!(groups[1], RenderGroup::Single(_)));
        assert!(matches!(groups[2], RenderGroup::List { ref items, .. } if items.len() == 1));
    }

    #[test]
    fn nested_children_render_inside_item() {
        let parent = bullet("parent").with_children(vec![numbered("x"), numbered("y")]);
        let html = BlockRenderer::new().render_html(&[parent]);
        assert_eq!(
            html,
            "<ul class=\"list-disc\"><li><span>parent</span><ol class=\"list-decimal\"><li><span>x</span></li><li><span>y</span></li></ol></li></ul>"
        );
    }

    #[test]
    fn empty_paragraph_becomes_spacer() {
        let renderer = BlockRenderer::new();
        let spacer = vec!["<div class=\"spacer\" aria-hidden=\"true\"></div>"];
        assert_eq!(renderer.render(&[Block::paragraph(Vec::new())]), spacer);
        let blank_spans = Block::paragraph(vec![RichText::plain(""), RichText::plain("")]);
        assert_eq!(renderer.render(&[blank_spans]), spacer);
        assert_eq!(renderer.render(&[para(" ")]), vec!["<p><span> </span></p>"]);
    }

    #[test]
    fn untyped_block_is_skipped_and_siblings_render() {
        let blocks: Vec<Block> = serde_json::from_value(json!([
            { "id": "x", "has_children": false },
            {
                "type": "paragraph",
                "paragraph": {
                    "rich_text": [{ "type": "text", "text": { "content": "kept" }, "plain_text": "kept" }]
                }
            }
        ]))
        .expect("list parses");

        let html = BlockRenderer::new().render(&blocks);
        assert_eq!(html, vec!["<p><span>kept</span></p>"]);
    }

    #[test]
    fn script_bookmark_is_omitted() {
        let block = Block::new(BlockKind::Bookmark(LinkBlock {
            url: "javascript:alert(1)".to_string(),
            ..LinkBlock::default()
        }));
        assert!(BlockRenderer::new().render(&[block]).is_empty());
    }

    #[test]
    fn attribution_paragraphs_are_tagged() {
        let renderer = BlockRenderer::new();
        assert!(renderer.render(&[para("Source: somewhere")])[0].contains("source-attribution"));
        assert!(renderer.render(&[para("Inspiration from x")])[0].contains("source-attribution"));
        assert_eq!(renderer.render(&[para("Sourced")])[0], "<p class=\"source-attribution\"><span>Sourced</span></p>");
        assert_eq!(renderer.render(&[para("plain")])[0], "<p><span>plain</span></p>");
    }

    #[test]
    fn callout_defaults_icon() {
        let renderer = BlockRenderer::new();
        let bare = Block::new(BlockKind::Callout(CalloutBlock {
            rich_text: vec![RichText::plain("note")],
            icon: None,
        }));
        assert!(renderer.render(&[bare])[0].contains(DEFAULT_CALLOUT_ICON));

        let custom = Block::new(BlockKind::Callout(CalloutBlock {
            rich_text: vec![RichText::plain("note")],
            icon: Some(Icon {
                kind: "emoji".to_string(),
                emoji: Some("🔥".to_string()),
            }),
        }));
        assert!(renderer.render(&[custom])[0].contains("🔥"));
    }

    #[test]
    fn image_without_url_is_omitted() {
        let renderer = BlockRenderer::new();
        assert!(
            renderer
                .render(&[Block::new(BlockKind::Image(ImageBlock::default()))])
                .is_empty()
        );

        let image = Block::new(BlockKind::Image(ImageBlock {
            file: Some(FileRef {
                url: "https://files.example/a.png".to_string(),
            }),
            external: None,
            caption: vec![RichText::plain("A chart")],
        }));
        let html = &renderer.render(&[image])[0];
        assert!(html.contains("src=\"https://files.example/a.png\""));
        assert!(html.contains("<figcaption><span>A chart</span></figcaption>"));
    }

    #[test]
    fn unsupported_blocks_render_nothing() {
        let unknown: Block = serde_json::from_value(json!({
            "id": "u1",
            "type": "table_of_contents",
            "table_of_contents": {}
        }))
        .expect("block parses");
        let nodes = BlockRenderer::new().render(&[para("before"), unknown, para("after")]);
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn code_keeps_text_and_language() {
        let html = BlockRenderer::new().render(&[Block::code("let a = 1 < 2;", "rust")]);
        assert!(html[0].contains("data-language=\"rust\""));
        assert!(html[0].contains("language-rust"));
        assert!(html[0].contains("&lt;"));
    }

    #[test]
    fn link_blocks_pick_embed_or_card() {
        let renderer = BlockRenderer::new();
        let tweet = Block::new(BlockKind::Bookmark(LinkBlock {
            url: "https://x.com/a/status/123?s=1".to_string(),
            ..LinkBlock::default()
        }));
        assert!(renderer.render(&[tweet])[0].contains("data-tweet-id=\"123\""));

        let video = Block::new(BlockKind::Embed(LinkBlock {
            url: "https://youtu.be/abc".to_string(),
            ..LinkBlock::default()
        }));
        assert!(renderer.render(&[video])[0].contains("https://www.youtube.com/embed/abc"));

        let card = Block::new(BlockKind::LinkPreview(LinkBlock {
            url: "https://example.com/page".to_string(),
            ..LinkBlock::default()
        }));
        let html = &renderer.render(&[card])[0];
        assert!(html.contains("<span class=\"link-card-title\">https://example.com/page</span>"));

        let titled = Block::new(BlockKind::Bookmark(LinkBlock {
            url: "https://example.com/page".to_string(),
            title: Some("Example".to_string()),
            caption: Vec::new(),
        }));
        assert!(renderer.render(&[titled])[0].contains(">Example</span>"));
    }

    #[test]
    fn lone_list_item_is_still_wrapped() {
        let nodes = BlockRenderer::new().render(&[numbered("solo")]);
        assert_eq!(
            nodes,
            vec!["<ol class=\"list-decimal\"><li><span>solo</span></li></ol>"]
        );
    }
}
