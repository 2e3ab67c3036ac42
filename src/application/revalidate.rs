//! Webhook-driven cache invalidation.
//!
//! The store notifies us when a page changes; the planner maps the event to
//! the site paths whose rendered output depends on it.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::application::content::ContentSources;

pub const METRIC_REVALIDATED_PATHS: &str = "folio_revalidated_paths_total";

const POST_PATHS: &[&str] = &["/", "/posts", "/field-notes", "/sitemap.xml"];
const QUESTION_PATHS: &[&str] = &["/open-questions"];
const THOUGHT_PATHS: &[&str] = &["/brain-atm"];
const LINK_PATHS: &[&str] = &["/links"];

/// Something that can drop cached output for a path.
pub trait PathInvalidator: Send + Sync {
    /// Remove `path` and every path nested under it; returns the entries removed.
    fn invalidate_path(&self, path: &str) -> usize;
}

/// Discards nothing. Used when response caching is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInvalidator;

impl PathInvalidator for NoopInvalidator {
    fn invalidate_path(&self, _path: &str) -> usize {
        0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityRef {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub parent: Option<EntityRef>,
}

/// Webhook body. Verification handshakes carry only `verification_token`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub verification_token: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub entity: Option<EntityRef>,
    #[serde(default)]
    pub data: Option<EventData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RevalidationOutcome {
    Verification {
        message: &'static str,
        received_token: String,
    },
    Revalidated {
        message: &'static str,
        paths: Vec<String>,
    },
}

/// Maps store identifiers to the paths rendered from them.
#[derive(Debug, Clone, Default)]
pub struct RevalidationPlanner {
    by_id: HashMap<String, &'static [&'static str]>,
    links_page: Option<String>,
}

impl RevalidationPlanner {
    pub fn from_sources(sources: &ContentSources) -> Self {
        let mut by_id = HashMap::new();
        let tables: [(&Option<String>, &'static [&'static str]); 4] = [
            (&sources.posts_database, POST_PATHS),
            (&sources.questions_database, QUESTION_PATHS),
            (&sources.comments_database, QUESTION_PATHS),
            (&sources.thoughts_database, THOUGHT_PATHS),
        ];
        for (id, paths) in tables {
            if let Some(id) = id {
                by_id.insert(normalize_id(id), paths);
            }
        }

        Self {
            by_id,
            links_page: sources.links_page.as_deref().map(normalize_id),
        }
    }

    /// Paths affected by one event, deduplicated in first-seen order.
    pub fn plan(&self, payload: &WebhookPayload) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        let mut push = |candidates: &[&str]| {
            for candidate in candidates {
                if !paths.iter().any(|existing| existing == candidate) {
                    paths.push((*candidate).to_string());
                }
            }
        };

        if payload.kind.starts_with("comment.") {
            push(QUESTION_PATHS);
        }

        let entity = payload.entity.as_ref();
        let parent = payload.data.as_ref().and_then(|data| data.parent.as_ref());

        for reference in [entity, parent].into_iter().flatten() {
            let id = normalize_id(&reference.id);
            if id.is_empty() {
                continue;
            }
            if self.links_page.as_deref() == Some(id.as_str()) {
                push(LINK_PATHS);
            }
            if let Some(table) = self.by_id.get(&id) {
                push(table);
            }
        }

        paths
    }
}

#[derive(Clone)]
pub struct RevalidationService {
    planner: RevalidationPlanner,
    invalidator: Arc<dyn PathInvalidator>,
}

impl RevalidationService {
    pub fn new(planner: RevalidationPlanner, invalidator: Arc<dyn PathInvalidator>) -> Self {
        Self {
            planner,
            invalidator,
        }
    }

    /// Handle a webhook delivery. `explicit_path` overrides event planning.
    pub fn handle(
        &self,
        payload: &WebhookPayload,
        explicit_path: Option<&str>,
    ) -> RevalidationOutcome {
        if let Some(token) = payload.verification_token.as_deref() {
            info!(
                target = "folio::revalidate",
                "webhook verification token received"
            );
            return RevalidationOutcome::Verification {
                message: "Verification token received",
                received_token: token.to_string(),
            };
        }

        let paths = match explicit_path.map(str::trim).filter(|path| !path.is_empty()) {
            Some(path) => vec![path.to_string()],
            None => self.planner.plan(payload),
        };
        self.invalidate(&paths);

        info!(
            target = "folio::revalidate",
            event = %payload.kind,
            paths = ?paths,
            "revalidation complete"
        );
        RevalidationOutcome::Revalidated {
            message: "Revalidation successful",
            paths,
        }
    }

    pub fn invalidate(&self, paths: &[String]) {
        for path in paths {
            let removed = self.invalidator.invalidate_path(path);
            counter!(METRIC_REVALIDATED_PATHS).increment(1);
            debug!(
                target = "folio::revalidate",
                path = %path,
                removed,
                "invalidated cached path"
            );
        }
    }
}

/// Store ids appear both hyphenated and bare.
fn normalize_id(id: &str) -> String {
    id.chars()
        .filter(|ch| *ch != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct RecordingInvalidator {
        paths: Mutex<Vec<String>>,
    }

    impl PathInvalidator for RecordingInvalidator {
        fn invalidate_path(&self, path: &str) -> usize {
            self.paths
                .lock()
                .expect("invalidator lock")
                .push(path.to_string());
            1
        }
    }

    fn sources() -> ContentSources {
        ContentSources {
            posts_database: Some("1111-2222".to_string()),
            questions_database: Some("q-db".to_string()),
            comments_database: Some("c-db".to_string()),
            thoughts_database: Some("t-db".to_string()),
            links_page: Some("links-page".to_string()),
        }
    }

    fn payload(value: serde_json::Value) -> WebhookPayload {
        serde_json::from_value(value).expect("payload parses")
    }

    #[test]
    fn page_in_posts_database_touches_post_listings() {
        let planner = RevalidationPlanner::from_sources(&sources());
        let paths = planner.plan(&payload(json!({
            "type": "page.content_updated",
            "entity": { "id": "abc", "type": "page" },
            "data": { "parent": { "id": "11112222", "type": "database" } }
        })));
        assert_eq!(paths, vec!["/", "/posts", "/field-notes", "/sitemap.xml"]);
    }

    #[test]
    fn links_page_and_comment_events_are_special_cased() {
        let planner = RevalidationPlanner::from_sources(&sources());
        let links = planner.plan(&payload(json!({
            "type": "page.content_updated",
            "entity": { "id": "LINKS-PAGE", "type": "page" }
        })));
        assert_eq!(links, vec!["/links"]);

        let comment = planner.plan(&payload(json!({
            "type": "comment.created",
            "entity": { "id": "x", "type": "comment" },
            "data": { "parent": { "id": "c-db", "type": "database" } }
        })));
        assert_eq!(comment, vec!["/open-questions"]);
    }

    #[test]
    fn unknown_entities_plan_nothing() {
        let planner = RevalidationPlanner::from_sources(&sources());
        assert!(
            planner
                .plan(&payload(json!({ "type": "page.created", "entity": { "id": "zzz" } })))
                .is_empty()
        );
    }

    #[test]
    fn verification_token_is_echoed_without_invalidating() {
        let invalidator = Arc::new(RecordingInvalidator::default());
        let service = RevalidationService::new(
            RevalidationPlanner::from_sources(&sources()),
            invalidator.clone(),
        );
        let outcome = service.handle(&payload(json!({ "verification_token": "tok" })), None);
        assert_eq!(
            outcome,
            RevalidationOutcome::Verification {
                message: "Verification token received",
                received_token: "tok".to_string(),
            }
        );
        assert!(invalidator.paths.lock().expect("lock").is_empty());
    }

    #[test]
    fn explicit_path_overrides_planning() {
        let invalidator = Arc::new(RecordingInvalidator::default());
        let service = RevalidationService::new(
            RevalidationPlanner::from_sources(&sources()),
            invalidator.clone(),
        );
        let outcome = service.handle(&WebhookPayload::default(), Some("/posts/hello"));
        assert_eq!(
            outcome,
            RevalidationOutcome::Revalidated {
                message: "Revalidation successful",
                paths: vec!["/posts/hello".to_string()],
            }
        );
        assert_eq!(
            *invalidator.paths.lock().expect("lock"),
            vec!["/posts/hello".to_string()]
        );
    }
}
