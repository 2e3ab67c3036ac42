//! sitemap.xml and robots.txt generation.

use std::sync::Arc;

use time::{Date, format_description::BorrowedFormatItem, macros::format_description};
use url::Url;

use crate::application::content::ContentService;
use crate::application::store::StoreError;
use crate::domain::entities::PostSummary;

const LASTMOD_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Section pages listed ahead of individual posts.
pub const STATIC_ROUTES: &[&str] = &[
    "/",
    "/posts",
    "/field-notes",
    "/open-questions",
    "/brain-atm",
    "/links",
];

#[derive(Clone)]
pub struct SitemapService {
    content: Arc<ContentService>,
    base_url: Url,
}

impl SitemapService {
    pub fn new(content: Arc<ContentService>, base_url: Url) -> Self {
        Self { content, base_url }
    }

    /// Section pages, then every published post, then field notes under their
    /// own prefix.
    pub async fn sitemap_xml(&self, today: Date) -> Result<String, StoreError> {
        let posts = self.content.posts().await?;
        Ok(build_sitemap(self.base_url.as_str(), &posts, today))
    }

    pub fn robots_txt(&self) -> String {
        let base = normalize_base(self.base_url.as_str());
        format!("User-agent: *\nAllow: /\nSitemap: {base}sitemap.xml\n")
    }
}

pub fn build_sitemap(base: &str, posts: &[PostSummary], today: Date) -> String {
    let base = normalize_base(base);
    let mut entries: Vec<String> = STATIC_ROUTES
        .iter()
        .map(|route| sitemap_entry(&base, route, Some(today)))
        .collect();

    entries.extend(
        posts
            .iter()
            .map(|post| sitemap_entry(&base, &format!("/posts/{}", post.slug), post.published_on)),
    );
    entries.extend(posts.iter().filter(|post| post.is_field_note()).map(|note| {
        sitemap_entry(
            &base,
            &format!("/field-notes/{}", note.slug),
            note.published_on,
        )
    }));

    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for entry in entries {
        xml.push_str(&entry);
    }
    xml.push_str("</urlset>\n");
    xml
}

fn normalize_base(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    format!("{trimmed}/")
}

fn sitemap_entry(base: &str, path: &str, lastmod: Option<Date>) -> String {
    let loc = canonical_url(base, path);
    match lastmod.and_then(|date| date.format(LASTMOD_FORMAT).ok()) {
        Some(lastmod) => format!("  <url><loc>{loc}</loc><lastmod>{lastmod}</lastmod></url>\n"),
        None => format!("  <url><loc>{loc}</loc></url>\n"),
    }
}

pub fn canonical_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path == "/" {
        base.to_string()
    } else {
        format!("{base}{path}")
    }
}
