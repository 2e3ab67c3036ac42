//! Rendered page cache.
//!
//! Successful public GET responses are kept in a bounded LRU keyed by path and
//! query string. Webhooks and comment submissions drop entries by path.

use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard},
};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use lru::LruCache;
use metrics::{counter, gauge};
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::revalidate::PathInvalidator;

pub const METRIC_CACHE_HIT: &str = "folio_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "folio_cache_miss_total";
pub const METRIC_CACHE_ENTRIES: &str = "folio_cache_entries";

pub const CACHE_STATUS_HEADER: &str = "x-cache";
const MAX_CACHED_BODY_BYTES: usize = 2 * 1024 * 1024;
const SOURCE: &str = "infra::cache";

#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<Mutex<LruCache<String, CachedResponse>>>,
}

impl ResponseCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn get(&self, key: &str) -> Option<Response> {
        let mut guard = lock(&self.entries, "get");
        guard.get(key).cloned().map(CachedResponse::into_response)
    }

    pub fn put(&self, key: String, response: CachedResponse) {
        let mut guard = lock(&self.entries, "put");
        guard.put(key, response);
        gauge!(METRIC_CACHE_ENTRIES).set(guard.len() as f64);
    }

    pub fn len(&self) -> usize {
        lock(&self.entries, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.entries, "contains").contains(key)
    }

    /// Drop `path` and everything nested under it. The root path only matches
    /// itself.
    pub fn invalidate(&self, path: &str) -> usize {
        let mut guard = lock(&self.entries, "invalidate");
        let stale: Vec<String> = guard
            .iter()
            .map(|(key, _)| key)
            .filter(|key| path_matches(key_path(key), path))
            .cloned()
            .collect();
        for key in &stale {
            guard.pop(key);
        }
        gauge!(METRIC_CACHE_ENTRIES).set(guard.len() as f64);
        stale.len()
    }
}

impl PathInvalidator for ResponseCache {
    fn invalidate_path(&self, path: &str) -> usize {
        self.invalidate(path)
    }
}

#[derive(Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        let headers = headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Self {
            status,
            headers,
            body,
        }
    }

    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }
        headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static("HIT"));

        response
    }
}

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("failed to buffer response body: {0}")]
    Buffer(String),
}

pub fn should_store_response(response: &Response) -> bool {
    if response.status() != StatusCode::OK {
        return false;
    }

    !response.headers().contains_key(header::SET_COOKIE)
}

pub fn cache_key(path: &str, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{path}?{query}"),
        _ => path.to_string(),
    }
}

/// Serve cached pages and remember fresh successful ones.
pub async fn response_cache_layer(
    State(cache): State<ResponseCache>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = cache_key(request.uri().path(), request.uri().query());

    if let Some(cached) = cache.get(&key) {
        counter!(METRIC_CACHE_HIT).increment(1);
        debug!(target = "folio::cache", key = %key, outcome = "hit", "serving cached response");
        return cached;
    }

    counter!(METRIC_CACHE_MISS).increment(1);
    debug!(target = "folio::cache", key = %key, outcome = "miss", "rendering response");

    let response = next.run(request).await;
    if !should_store_response(&response) {
        return response;
    }

    match buffer_response(response).await {
        Ok((mut rebuilt, cached)) => {
            cache.put(key, cached);
            rebuilt
                .headers_mut()
                .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("MISS"));
            rebuilt
        }
        Err((rebuilt, error)) => {
            warn!(
                target = "folio::cache",
                key = %key,
                error = %error,
                "response could not be cached"
            );
            rebuilt
        }
    }
}

pub async fn buffer_response(
    response: Response,
) -> Result<(Response, CachedResponse), (Response, CacheStoreError)> {
    let (parts, body) = response.into_parts();
    match axum::body::to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => {
            let cached = CachedResponse::new(parts.status, &parts.headers, bytes.clone());
            let rebuilt = Response::from_parts(parts, Body::from(bytes));
            Ok((rebuilt, cached))
        }
        Err(error) => {
            let mut rebuilt = Response::from_parts(parts, Body::empty());
            *rebuilt.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            Err((rebuilt, CacheStoreError::Buffer(error.to_string())))
        }
    }
}

fn key_path(key: &str) -> &str {
    key.split_once('?').map_or(key, |(path, _)| path)
}

fn path_matches(candidate: &str, path: &str) -> bool {
    let path = match path.trim_end_matches('/') {
        "" => return candidate == "/",
        trimmed => trimmed,
    };
    candidate == path
        || candidate
            .strip_prefix(path)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn lock<'a, T>(mutex: &'a Mutex<T>, op: &'static str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = SOURCE,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}
