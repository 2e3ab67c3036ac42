//! Site entities assembled from store pages.

use time::{Date, OffsetDateTime};

use super::blocks::Block;
use super::properties::{Property, StorePage, parse_timestamp};
use super::rich_text::RichText;
use super::slug::resolve_slug;

pub const UNTITLED: &str = "Untitled";
pub const ANONYMOUS: &str = "Anonymous";
pub const FIELD_NOTES_CATEGORY: &str = "Field notes";

#[derive(Debug, Clone, PartialEq)]
pub struct PostSummary {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub published_on: Option<Date>,
    pub summary: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
}

impl PostSummary {
    pub fn from_page(page: &StorePage) -> Self {
        let title = page
            .first_text_property(&["Name", "Title"])
            .unwrap_or_else(|| UNTITLED.to_string());
        let explicit_slug = page.text_property("Slug");
        let slug = resolve_slug(explicit_slug.as_deref(), &title);

        Self {
            id: page.id.clone(),
            slug,
            title,
            published_on: page.date("Date"),
            summary: page.text_property("Summary").unwrap_or_default(),
            tags: page.multi_select_names("Tags"),
            category: page.select_name("Category").map(str::to_string),
        }
    }

    pub fn is_field_note(&self) -> bool {
        self.category.as_deref() == Some(FIELD_NOTES_CATEGORY)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub summary: PostSummary,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenQuestion {
    pub id: String,
    pub question: Vec<RichText>,
    pub tags: Vec<String>,
    pub created_at: Option<OffsetDateTime>,
    pub comments: Vec<QuestionComment>,
}

impl OpenQuestion {
    pub fn from_page(page: &StorePage) -> Self {
        Self {
            id: page.id.clone(),
            question: rich_text_property(page, "Question"),
            tags: page.multi_select_names("Tags"),
            created_at: created_at(page),
            comments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionComment {
    pub id: String,
    pub body: Vec<RichText>,
    pub author: String,
    pub created_at: Option<OffsetDateTime>,
}

impl QuestionComment {
    pub fn from_page(page: &StorePage) -> Self {
        let author = rich_text_property(page, "Name")
            .first()
            .map(|span| span.literal().trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_string());

        Self {
            id: page.id.clone(),
            body: rich_text_property(page, "Comment"),
            author,
            created_at: created_at(page),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thought {
    pub id: String,
    pub text: Vec<RichText>,
    pub created_at: Option<OffsetDateTime>,
}

impl Thought {
    pub fn from_page(page: &StorePage) -> Self {
        Self {
            id: page.id.clone(),
            text: rich_text_property(page, "Thought"),
            created_at: created_at(page),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSummary {
    pub name: String,
    pub count: usize,
    pub description: Option<&'static str>,
}

pub fn tag_description(tag: &str) -> Option<&'static str> {
    match tag {
        "blog" => Some("In-depth thoughts and analysis on various topics."),
        "field-notes" => Some("Notes and observations. Not news. Inconsistent writing style."),
        _ => None,
    }
}

fn rich_text_property(page: &StorePage, name: &str) -> Vec<RichText> {
    match page.property(name) {
        Some(Property::Title { title }) => title.clone(),
        Some(Property::RichText { rich_text }) => rich_text.clone(),
        _ => Vec::new(),
    }
}

fn created_at(page: &StorePage) -> Option<OffsetDateTime> {
    let from_property = match page.property("Created time") {
        Some(Property::CreatedTime {
            created_time: Some(value),
        }) => parse_timestamp(value),
        _ => None,
    };
    from_property.or_else(|| page.created_at())
}
