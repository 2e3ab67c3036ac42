use syntect::{
    html::{ClassStyle, ClassedHTMLGenerator},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};

use super::escape_html;

/// Highlight `code` into classed spans. The visible text is unchanged; only
/// markup is added around it.
pub(crate) fn highlight_code(
    language: &str,
    code: &str,
    syntax_set: &SyntaxSet,
    class_style: ClassStyle,
) -> Result<String, syntect::Error> {
    let syntax =
        find_syntax(syntax_set, language).unwrap_or_else(|| syntax_set.find_syntax_plain_text());

    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, class_style);
    for line in LinesWithEndings::from(code) {
        generator.parse_html_for_line_which_includes_newline(line)?;
    }
    Ok(generator.finalize())
}

/// Fallback used when highlighting fails.
pub(crate) fn plain_code(code: &str) -> String {
    escape_html(code)
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, language: &str) -> Option<&'a SyntaxReference> {
    let lowercase = language.to_ascii_lowercase();
    let token = match lowercase.as_str() {
        "plain text" => return None,
        "shell" => "sh",
        "c++" => "cpp",
        "c#" => "cs",
        "objective-c" => "objc",
        "docker" => "dockerfile",
        other => other,
    };
    syntax_set
        .find_syntax_by_token(token)
        .or_else(|| syntax_set.find_syntax_by_name(token))
        .or_else(|| syntax_set.find_syntax_by_extension(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_tags(html: &str) -> String {
        let mut text = String::new();
        let mut in_tag = false;
        for ch in html.chars() {
            match ch {
                '<' => in_tag = true,
                '>' => in_tag = false,
                _ if !in_tag => text.push(ch),
                _ => {}
            }
        }
        text.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&")
    }

    #[test]
    fn highlighting_preserves_text() {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let code = "fn main() {\n    let x = \"<tag>\" ;\n}";
        let html = highlight_code(
            "rust",
            code,
            &syntax_set,
            ClassStyle::SpacedPrefixed { prefix: "syntax-" },
        )
        .expect("highlighting succeeds");

        assert!(html.contains("syntax-"));
        assert_eq!(strip_tags(&html), code);
    }

    #[test]
    fn plain_text_language_skips_lookup() {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        assert!(find_syntax(&syntax_set, "plain text").is_none());
        assert!(find_syntax(&syntax_set, "shell").is_some());
    }
}
