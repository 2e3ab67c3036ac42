use std::sync::Arc;

use crate::application::comments::CommentService;
use crate::application::content::ContentService;
use crate::application::rate_limit::FixedWindowRateLimiter;
use crate::application::revalidate::RevalidationService;
use crate::application::summary::SummaryService;

#[derive(Clone)]
pub struct ApiState {
    pub content: Arc<ContentService>,
    pub comments: Arc<CommentService>,
    pub revalidation: Arc<RevalidationService>,
    pub summaries: Arc<SummaryService>,
    pub rate_limiter: Arc<FixedWindowRateLimiter>,
}
