//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::content::ContentSources;

pub use cli::{CliArgs, Command, RenderArgs, SecretArgs, ServeArgs, ServeOverrides, SummarizeArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_SITE_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_SITE_TITLE: &str = "Folio";
const DEFAULT_SITE_DESCRIPTION: &str = "Posts, field notes and open questions.";
const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com/v1";
const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
const DEFAULT_NOTION_TIMEOUT_SECS: u64 = 15;
const DEFAULT_READER_BASE: &str = "https://r.jina.ai";
const DEFAULT_OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
const DEFAULT_SUMMARY_MODEL: &str = "google/gemini-2.5-flash";
const DEFAULT_SUMMARY_MAX_TOKENS: u64 = 1500;
const DEFAULT_SUMMARY_TEMPERATURE: f32 = 0.7;
const DEFAULT_SUMMARY_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SUMMARY_APP_TITLE: &str = "Research Content Summarizer";
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u64 = 3;
const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub site: SiteSettings,
    pub notion: NotionSettings,
    pub summarizer: SummarizerSettings,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub base_url: Url,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NotionSettings {
    pub token: Option<String>,
    pub api_base: Url,
    pub version: String,
    pub timeout: Duration,
    pub sources: ContentSources,
}

#[derive(Debug, Clone)]
pub struct SummarizerSettings {
    pub api_key: Option<String>,
    pub api_base: Url,
    pub reader_base: Url,
    pub model: String,
    pub max_tokens: NonZeroU32,
    pub temperature: f32,
    pub app_title: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window_seconds: NonZeroU32,
    pub max_requests: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FOLIO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_secrets(&cli.secrets);
    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(_)) | Some(Command::Summarize(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    site: RawSiteSettings,
    notion: RawNotionSettings,
    summarizer: RawSummarizerSettings,
    rate_limit: RawRateLimitSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_secrets(&mut self, secrets: &SecretArgs) {
        if let Some(token) = secrets.notion_token.as_ref() {
            self.notion.token = Some(token.clone());
        }
        if let Some(key) = secrets.openrouter_api_key.as_ref() {
            self.summarizer.api_key = Some(key.clone());
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(base_url) = overrides.site_base_url.as_ref() {
            self.site.base_url = Some(base_url.clone());
        }
        if let Some(window) = overrides.rate_limit_window_seconds {
            self.rate_limit.window_seconds = Some(window);
        }
        if let Some(max) = overrides.rate_limit_max_requests {
            self.rate_limit.max_requests = Some(max);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            site,
            notion,
            summarizer,
            rate_limit,
            cache,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            site: build_site_settings(site)?,
            notion: build_notion_settings(notion)?,
            summarizer: build_summarizer_settings(summarizer)?,
            rate_limit: build_rate_limit_settings(rate_limit)?,
            cache: build_cache_settings(cache)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let base_url = parse_url(
        site.base_url.as_deref().unwrap_or(DEFAULT_SITE_BASE_URL),
        "site.base_url",
    )?;

    Ok(SiteSettings {
        base_url,
        title: non_blank(site.title).unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string()),
        description: non_blank(site.description)
            .unwrap_or_else(|| DEFAULT_SITE_DESCRIPTION.to_string()),
    })
}

fn build_notion_settings(notion: RawNotionSettings) -> Result<NotionSettings, LoadError> {
    let api_base = parse_url(
        notion.api_base.as_deref().unwrap_or(DEFAULT_NOTION_API_BASE),
        "notion.api_base",
    )?;

    let timeout_secs = notion.timeout_seconds.unwrap_or(DEFAULT_NOTION_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "notion.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(NotionSettings {
        token: non_blank(notion.token),
        api_base,
        version: non_blank(notion.version).unwrap_or_else(|| DEFAULT_NOTION_VERSION.to_string()),
        timeout: Duration::from_secs(timeout_secs),
        sources: ContentSources {
            posts_database: non_blank(notion.posts_database),
            questions_database: non_blank(notion.questions_database),
            comments_database: non_blank(notion.comments_database),
            thoughts_database: non_blank(notion.thoughts_database),
            links_page: non_blank(notion.links_page),
        },
    })
}

fn build_summarizer_settings(
    summarizer: RawSummarizerSettings,
) -> Result<SummarizerSettings, LoadError> {
    let api_base = parse_url(
        summarizer
            .api_base
            .as_deref()
            .unwrap_or(DEFAULT_OPENROUTER_API_BASE),
        "summarizer.api_base",
    )?;
    let reader_base = parse_url(
        summarizer
            .reader_base
            .as_deref()
            .unwrap_or(DEFAULT_READER_BASE),
        "summarizer.reader_base",
    )?;

    let max_tokens = non_zero_u32(
        summarizer.max_tokens.unwrap_or(DEFAULT_SUMMARY_MAX_TOKENS),
        "summarizer.max_tokens",
    )?;

    let temperature = summarizer
        .temperature
        .unwrap_or(DEFAULT_SUMMARY_TEMPERATURE);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(LoadError::invalid(
            "summarizer.temperature",
            "must be between 0.0 and 2.0",
        ));
    }

    let timeout_secs = summarizer
        .timeout_seconds
        .unwrap_or(DEFAULT_SUMMARY_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "summarizer.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(SummarizerSettings {
        api_key: non_blank(summarizer.api_key),
        api_base,
        reader_base,
        model: non_blank(summarizer.model).unwrap_or_else(|| DEFAULT_SUMMARY_MODEL.to_string()),
        max_tokens,
        temperature,
        app_title: non_blank(summarizer.app_title)
            .unwrap_or_else(|| DEFAULT_SUMMARY_APP_TITLE.to_string()),
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let window_seconds_val = rate_limit
        .window_seconds
        .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS);
    let window_seconds = non_zero_u32(window_seconds_val, "rate_limit.window_seconds")?;

    let max_requests_val = rate_limit
        .max_requests
        .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS);
    let max_requests = non_zero_u32(max_requests_val, "rate_limit.max_requests")?;

    Ok(RateLimitSettings {
        window_seconds,
        max_requests,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity = NonZeroUsize::new(cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY))
        .ok_or_else(|| LoadError::invalid("cache.capacity", "must be greater than zero"))?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    base_url: Option<String>,
    title: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNotionSettings {
    token: Option<String>,
    api_base: Option<String>,
    version: Option<String>,
    timeout_seconds: Option<u64>,
    posts_database: Option<String>,
    questions_database: Option<String>,
    comments_database: Option<String>,
    thoughts_database: Option<String>,
    links_page: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSummarizerSettings {
    api_key: Option<String>,
    api_base: Option<String>,
    reader_base: Option<String>,
    model: Option<String>,
    max_tokens: Option<u64>,
    temperature: Option<f32>,
    app_title: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    window_seconds: Option<u64>,
    max_requests: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    Url::parse(value.trim()).map_err(|err| LoadError::invalid(key, format!("invalid URL: {err}")))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
