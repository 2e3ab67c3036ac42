//! Page records and the typed property values the site reads from them.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Value, json};
use time::{Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};

use super::rich_text::{RichText, plain_text_of};

const URL_PROPERTY_NAMES: [&str; 4] = ["URL", "url", "Link", "link"];
const TITLE_PROPERTY_NAMES: [&str; 4] = ["Title", "title", "Name", "name"];

/// A database row or standalone page.
#[derive(Debug, Clone, Deserialize)]
pub struct StorePage {
    pub id: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub parent: Option<Parent>,
    #[serde(default)]
    pub properties: HashMap<String, Property>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Parent {
    DatabaseId {
        database_id: String,
    },
    DataSourceId {
        #[serde(default)]
        database_id: Option<String>,
    },
    PageId {
        page_id: String,
    },
    BlockId {
        block_id: String,
    },
    Workspace,
    #[serde(other)]
    Unknown,
}

impl Parent {
    pub fn database_id(&self) -> Option<&str> {
        match self {
            Parent::DatabaseId { database_id } => Some(database_id),
            Parent::DataSourceId { database_id } => database_id.as_deref(),
            _ => None,
        }
    }

    pub fn page_id(&self) -> Option<&str> {
        match self {
            Parent::PageId { page_id } => Some(page_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Property {
    Title {
        #[serde(default)]
        title: Vec<RichText>,
    },
    RichText {
        #[serde(default)]
        rich_text: Vec<RichText>,
    },
    Url {
        #[serde(default)]
        url: Option<String>,
    },
    Select {
        #[serde(default)]
        select: Option<SelectOption>,
    },
    MultiSelect {
        #[serde(default)]
        multi_select: Vec<SelectOption>,
    },
    Status {
        #[serde(default)]
        status: Option<SelectOption>,
    },
    Date {
        #[serde(default)]
        date: Option<DateValue>,
    },
    Checkbox {
        #[serde(default)]
        checkbox: bool,
    },
    CreatedTime {
        #[serde(default)]
        created_time: Option<String>,
    },
    Relation {
        #[serde(default)]
        relation: Vec<RelationRef>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectOption {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DateValue {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationRef {
    pub id: String,
}

impl StorePage {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Text of a property rendered as a single string.
    ///
    /// Title and rich text join their spans; select yields the option name;
    /// multi-select joins option names with `", "`.
    pub fn text_property(&self, name: &str) -> Option<String> {
        let text = match self.property(name)? {
            Property::Title { title } => plain_text_of(title),
            Property::RichText { rich_text } => plain_text_of(rich_text),
            Property::Url { url } => url.clone()?,
            Property::Select { select } | Property::Status { status: select } => {
                select.as_ref()?.name.clone()
            }
            Property::MultiSelect { multi_select } => multi_select
                .iter()
                .map(|option| option.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            _ => return None,
        };
        Some(text)
    }

    /// Text of the first property among `names` that is present and non-blank.
    pub fn first_text_property(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| {
            self.text_property(name)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
        })
    }

    pub fn title(&self) -> Option<String> {
        self.first_text_property(&TITLE_PROPERTY_NAMES)
    }

    /// Source URL attached to a research page.
    pub fn source_url(&self) -> Option<String> {
        self.first_text_property(&URL_PROPERTY_NAMES)
    }

    pub fn select_name(&self, name: &str) -> Option<&str> {
        match self.property(name)? {
            Property::Select { select } | Property::Status { status: select } => {
                select.as_ref().map(|option| option.name.as_str())
            }
            _ => None,
        }
    }

    pub fn multi_select_names(&self, name: &str) -> Vec<String> {
        match self.property(name) {
            Some(Property::MultiSelect { multi_select }) => multi_select
                .iter()
                .map(|option| option.name.clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn checkbox(&self, name: &str) -> bool {
        matches!(self.property(name), Some(Property::Checkbox { checkbox: true }))
    }

    pub fn relation_ids(&self, name: &str) -> Vec<String> {
        match self.property(name) {
            Some(Property::Relation { relation }) => {
                relation.iter().map(|item| item.id.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Calendar date held by a date property, ignoring any time component.
    pub fn date(&self, name: &str) -> Option<Date> {
        match self.property(name)? {
            Property::Date { date } => parse_calendar_date(&date.as_ref()?.start),
            Property::CreatedTime { created_time } => {
                parse_timestamp(created_time.as_deref()?).map(|ts| ts.date())
            }
            _ => None,
        }
    }

    pub fn created_at(&self) -> Option<OffsetDateTime> {
        self.created_time.as_deref().and_then(parse_timestamp)
    }
}

pub fn parse_calendar_date(value: &str) -> Option<Date> {
    let prefix = value.get(..10)?;
    Date::parse(prefix, format_description!("[year]-[month]-[day]")).ok()
}

pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).ok()
}

/// Property payload replacing a title property's text.
pub fn title_value(text: &str) -> Value {
    json!({
        "title": [{ "type": "text", "text": { "content": text } }]
    })
}

pub fn rich_text_value(text: &str) -> Value {
    json!({
        "rich_text": [{ "type": "text", "text": { "content": text } }]
    })
}

pub fn relation_value(ids: &[&str]) -> Value {
    let relation: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
    json!({ "relation": relation })
}

pub fn checkbox_value(checked: bool) -> Value {
    json!({ "checkbox": checked })
}
