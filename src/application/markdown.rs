//! Markdown to content-block conversion for text written back into the store.

use comrak::{
    Arena,
    nodes::{AstNode, ListType, NodeValue},
    options::Options,
    parse_document,
};

use crate::domain::blocks::{Block, BlockKind, CodeBlock, ListKind, PLAIN_TEXT_LANGUAGE};
use crate::domain::rich_text::{RichText, plain_text_of};

/// The store rejects text objects longer than this.
pub const MAX_TEXT_CHARS: usize = 2000;
pub const EMPTY_QUOTE_PLACEHOLDER: &str = "Quote";

const STORE_CODE_LANGUAGES: &[&str] = &[
    "abap", "arduino", "bash", "basic", "c", "c#", "c++", "clojure", "coffeescript", "css",
    "dart", "diff", "docker", "elixir", "elm", "erlang", "f#", "flow", "fortran", "gherkin",
    "glsl", "go", "graphql", "groovy", "haskell", "html", "java", "javascript", "json", "julia",
    "kotlin", "latex", "less", "lisp", "livescript", "lua", "makefile", "markdown", "markup",
    "matlab", "mermaid", "nix", "objective-c", "ocaml", "pascal", "perl", "php", "plain text",
    "powershell", "prolog", "protobuf", "python", "r", "reason", "ruby", "rust", "sass", "scala",
    "scheme", "scss", "shell", "sql", "swift", "typescript", "vb.net", "verilog", "vhdl",
    "visual basic", "webassembly", "xml", "yaml",
];

#[derive(Clone, Copy)]
enum Overlay {
    Bold,
    Italic,
    Strikethrough,
}

fn parser_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options
}

/// Convert a markdown document into store blocks.
///
/// Only headings, paragraphs, lists, block quotes, code blocks and thematic
/// breaks produce output; other node kinds are skipped.
pub fn markdown_to_blocks(markdown: &str) -> Vec<Block> {
    let arena = Arena::new();
    let options = parser_options();
    let root = parse_document(&arena, markdown, &options);

    let mut blocks = Vec::new();
    for node in root.children() {
        convert_block(node, &mut blocks);
    }
    blocks
}

fn convert_block<'a>(node: &'a AstNode<'a>, out: &mut Vec<Block>) {
    let data = node.data.borrow();
    match &data.value {
        NodeValue::Paragraph => {
            let spans = inline_spans(node);
            if !plain_text_of(&spans).trim().is_empty() {
                out.push(Block::paragraph(spans));
            }
        }
        NodeValue::Heading(heading) => {
            out.push(Block::heading(heading.level, inline_spans(node)));
        }
        NodeValue::List(list) => {
            let kind = match list.list_type {
                ListType::Bullet => ListKind::Bulleted,
                ListType::Ordered => ListKind::Numbered,
            };
            for item in node.children() {
                let spans = first_child_paragraph(item)
                    .map(inline_spans)
                    .unwrap_or_default();
                out.push(Block::list_item(kind, spans));
            }
        }
        NodeValue::BlockQuote => {
            let spans = first_child_paragraph(node)
                .map(inline_spans)
                .unwrap_or_else(|| vec![RichText::plain(EMPTY_QUOTE_PLACEHOLDER)]);
            out.push(Block::quote(spans));
        }
        NodeValue::CodeBlock(code) => {
            let literal = code.literal.strip_suffix('\n').unwrap_or(&code.literal);
            out.push(Block::new(BlockKind::Code(CodeBlock {
                rich_text: chunk_text(literal)
                    .into_iter()
                    .map(RichText::plain)
                    .collect(),
                language: store_language(&code.info),
                caption: Vec::new(),
            })));
        }
        NodeValue::ThematicBreak => out.push(Block::divider()),
        _ => {}
    }
}

/// Only the first child counts; a list item opening with anything but a
/// paragraph carries no text.
fn first_child_paragraph<'a>(node: &'a AstNode<'a>) -> Option<&'a AstNode<'a>> {
    let child = node.first_child()?;
    let is_paragraph = matches!(child.data.borrow().value, NodeValue::Paragraph);
    is_paragraph.then_some(child)
}

fn inline_spans<'a>(node: &'a AstNode<'a>) -> Vec<RichText> {
    let mut spans = Vec::new();
    for child in node.children() {
        collect_inline(child, &mut spans);
    }
    split_long_spans(merge_adjacent(spans))
}

fn collect_inline<'a>(node: &'a AstNode<'a>, out: &mut Vec<RichText>) {
    let data = node.data.borrow();
    match &data.value {
        NodeValue::Text(text) => out.push(RichText::plain(text.to_string())),
        NodeValue::SoftBreak | NodeValue::LineBreak => out.push(RichText::plain("\n")),
        NodeValue::Code(code) => {
            let mut span = RichText::plain(code.literal.clone());
            span.annotations.code = true;
            out.push(span);
        }
        NodeValue::Strong => overlay_children(node, Overlay::Bold, out),
        NodeValue::Emph => overlay_children(node, Overlay::Italic, out),
        NodeValue::Strikethrough => overlay_children(node, Overlay::Strikethrough, out),
        NodeValue::Link(link) => {
            let url = link.url.clone();
            let mut nested = Vec::new();
            for child in node.children() {
                collect_inline(child, &mut nested);
            }
            out.extend(nested.into_iter().map(|span| span.with_link(url.clone())));
        }
        _ => {}
    }
}

fn overlay_children<'a>(node: &'a AstNode<'a>, overlay: Overlay, out: &mut Vec<RichText>) {
    let mut nested = Vec::new();
    for child in node.children() {
        collect_inline(child, &mut nested);
    }
    for mut span in nested {
        let annotations = &mut span.annotations;
        match overlay {
            Overlay::Bold => annotations.bold = true,
            Overlay::Italic => annotations.italic = true,
            Overlay::Strikethrough => annotations.strikethrough = true,
        }
        out.push(span);
    }
}

/// Join neighbouring spans that share styling and link.
fn merge_adjacent(spans: Vec<RichText>) -> Vec<RichText> {
    let mut merged: Vec<RichText> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(last) = merged.last_mut()
            && last.annotations == span.annotations
            && last.link_target() == span.link_target()
            && let (Some(target), Some(source)) = (last.text.as_mut(), span.text.as_ref())
        {
            target.content.push_str(&source.content);
            continue;
        }
        merged.push(span);
    }
    merged
}

fn split_long_spans(spans: Vec<RichText>) -> Vec<RichText> {
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        let content = span.literal().to_string();
        if content.chars().count() <= MAX_TEXT_CHARS {
            out.push(span);
            continue;
        }
        for chunk in chunk_text(&content) {
            let mut piece = span.clone();
            if let Some(text) = piece.text.as_mut() {
                text.content = chunk;
            }
            out.push(piece);
        }
    }
    out
}

fn chunk_text(text: &str) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(MAX_TEXT_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Map a fence info string onto a language the store accepts.
fn store_language(info: &str) -> String {
    let token = info
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    let normalized = match token.as_str() {
        "" => PLAIN_TEXT_LANGUAGE,
        "js" | "jsx" | "mjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" => "python",
        "rs" => "rust",
        "rb" => "ruby",
        "sh" | "zsh" | "console" => "shell",
        "yml" => "yaml",
        "text" | "txt" | "plaintext" => PLAIN_TEXT_LANGUAGE,
        "cpp" => "c++",
        "csharp" | "cs" => "c#",
        "dockerfile" => "docker",
        "md" => "markdown",
        other => other,
    };

    if STORE_CODE_LANGUAGES.contains(&normalized) {
        normalized.to_string()
    } else {
        PLAIN_TEXT_LANGUAGE.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(block: &Block) -> &[RichText] {
        block.rich_text().expect("text-bearing block")
    }

    #[test]
    fn maps_block_structure() {
        let blocks = markdown_to_blocks(
            "# Title\n\nIntro paragraph.\n\n- one\n- two\n\n1. first\n\n---\n\n> quoted\n",
        );
        let kinds: Vec<&str> = blocks.iter().map(Block::discriminator).collect();
        assert_eq!(
            kinds,
            vec![
                "heading_1",
                "paragraph",
                "bulleted_list_item",
                "bulleted_list_item",
                "numbered_list_item",
                "divider",
                "quote",
            ]
        );
        assert_eq!(blocks[3].plain_text(), "two");
        assert_eq!(blocks[6].plain_text(), "quoted");
    }

    #[test]
    fn deep_headings_clamp_to_level_three() {
        let blocks = markdown_to_blocks("##### Deep");
        assert_eq!(blocks[0].discriminator(), "heading_3");
    }

    #[test]
    fn whitespace_paragraphs_are_dropped() {
        let blocks = markdown_to_blocks("&nbsp;\n\ntext");
        assert!(
            blocks
                .iter()
                .all(|block| !block.plain_text().trim().is_empty())
        );
    }

    #[test]
    fn inline_styles_overlay_nested_spans() {
        let blocks =
            markdown_to_blocks("plain **bold _both_** ~~gone~~ `code` [link **x**](https://e.x)");
        let spans = spans(&blocks[0]);

        let both = spans
            .iter()
            .find(|span| span.literal() == "both")
            .expect("nested span");
        assert!(both.annotations.bold && both.annotations.italic);

        let gone = spans.iter().find(|span| span.literal() == "gone").expect("strike");
        assert!(gone.annotations.strikethrough);

        let code = spans.iter().find(|span| span.literal() == "code").expect("code");
        assert!(code.annotations.code);
        assert!(!code.annotations.bold);

        let linked_bold = spans.iter().find(|span| span.literal() == "x").expect("link");
        assert!(linked_bold.annotations.bold);
        assert_eq!(linked_bold.link_target(), Some("https://e.x"));
    }

    #[test]
    fn code_blocks_keep_literal_and_language() {
        let blocks = markdown_to_blocks("```rs\nfn main() {}\n  indented\n```\n\n```\nraw\n```");
        match &blocks[0].kind {
            BlockKind::Code(code) => {
                assert_eq!(code.language, "rust");
                assert_eq!(plain_text_of(&code.rich_text), "fn main() {}\n  indented");
            }
            other => panic!("unexpected block: {other:?}"),
        }
        match &blocks[1].kind {
            BlockKind::Code(code) => assert_eq!(code.language, PLAIN_TEXT_LANGUAGE),
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn list_item_without_leading_paragraph_is_empty() {
        let blocks = markdown_to_blocks("- ```\n  code\n  ```\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].discriminator(), "bulleted_list_item");
        assert!(spans(&blocks[0]).is_empty());
    }

    #[test]
    fn quote_without_paragraph_uses_placeholder() {
        let blocks = markdown_to_blocks("> # heading in quote\n");
        assert_eq!(blocks[0].plain_text(), EMPTY_QUOTE_PLACEHOLDER);
    }

    #[test]
    fn conversion_is_deterministic() {
        let source = "# Heading\n\nA paragraph with *style*.\n\n- first\n- second\n";
        let first = markdown_to_blocks(source);
        let second = markdown_to_blocks(source);
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn long_text_is_split_for_the_store() {
        let long = "a".repeat(MAX_TEXT_CHARS + 10);
        let blocks = markdown_to_blocks(&long);
        let spans = spans(&blocks[0]);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].literal().len(), MAX_TEXT_CHARS);
        assert_eq!(spans[1].literal().len(), 10);
    }

    #[test]
    fn soft_breaks_become_newlines() {
        let blocks = markdown_to_blocks("line one\nline two");
        assert_eq!(blocks[0].plain_text(), "line one\nline two");
    }
}
