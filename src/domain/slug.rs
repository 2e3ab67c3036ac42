//! URL slugs for posts.

/// Derive a slug from a title: lower-cased, whitespace runs become `-`, and
/// anything outside `[a-z0-9-]` is dropped.
pub fn slugify_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut in_whitespace = false;

    for ch in lowered.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                slug.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            slug.push(ch);
        }
    }

    slug
}

/// An explicit slug wins over one derived from the title.
pub fn resolve_slug(explicit: Option<&str>, title: &str) -> String {
    match explicit.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value.to_string(),
        None => slugify_title(title),
    }
}
