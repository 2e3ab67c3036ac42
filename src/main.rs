use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use folio::{
    application::{
        comments::CommentService,
        content::ContentService,
        error::AppError,
        rate_limit::FixedWindowRateLimiter,
        render::block_renderer,
        revalidate::{NoopInvalidator, PathInvalidator, RevalidationPlanner, RevalidationService},
        sitemap::SitemapService,
        store::{ContentStore, load_block_tree},
        summary::{LanguageModel, SummaryService},
    },
    config::{self, RenderArgs, Settings, SummarizeArgs},
    infra::{
        cache::ResponseCache,
        error::InfraError,
        http::{self, ApiState, HttpState, RouterState},
        notion::NotionClient,
        openrouter::OpenRouterClient,
        reader::JinaReader,
        telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
        config::Command::Summarize(args) => run_summarize(settings, args).await,
    }
}

struct ApplicationContext {
    store: Arc<dyn ContentStore>,
    content: Arc<ContentService>,
    comments: Arc<CommentService>,
    revalidation: Arc<RevalidationService>,
    summaries: Arc<SummaryService>,
    sitemap: Arc<SitemapService>,
    cache: Option<ResponseCache>,
}

fn build_application_context(settings: &Settings) -> Result<ApplicationContext, AppError> {
    let sources = settings.notion.sources.clone();
    let store: Arc<dyn ContentStore> = Arc::new(NotionClient::new(&settings.notion)?);

    let cache = settings
        .cache
        .enabled
        .then(|| ResponseCache::new(settings.cache.capacity));
    let invalidator: Arc<dyn PathInvalidator> = match cache.clone() {
        Some(cache) => Arc::new(cache),
        None => Arc::new(NoopInvalidator),
    };

    let content = Arc::new(ContentService::new(store.clone(), sources.clone()));
    let comments = Arc::new(CommentService::new(
        store.clone(),
        sources.comments_database.clone(),
        invalidator.clone(),
    ));
    let revalidation = Arc::new(RevalidationService::new(
        RevalidationPlanner::from_sources(&sources),
        invalidator,
    ));

    let reader = Arc::new(JinaReader::new(&settings.summarizer)?);
    let model = OpenRouterClient::from_settings(&settings.summarizer, &settings.site)?
        .map(|client| Arc::new(client) as Arc<dyn LanguageModel>);
    if model.is_none() {
        warn!(
            target = "folio::bootstrap",
            "summarizer API key missing; summarization is disabled"
        );
    }
    let summaries = Arc::new(SummaryService::new(store.clone(), reader, model));
    let sitemap = Arc::new(SitemapService::new(
        content.clone(),
        settings.site.base_url.clone(),
    ));

    Ok(ApplicationContext {
        store,
        content,
        comments,
        revalidation,
        summaries,
        sitemap,
        cache,
    })
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings)?;

    let window = Duration::from_secs(u64::from(settings.rate_limit.window_seconds.get()));
    let rate_limiter = Arc::new(FixedWindowRateLimiter::new(
        settings.rate_limit.max_requests.get(),
        window,
    ));
    let purge_handle = spawn_rate_limit_purge(rate_limiter.clone(), window);

    let http_state = HttpState {
        content: app.content.clone(),
        sitemap: app.sitemap.clone(),
        renderer: block_renderer(),
        site: Arc::new(settings.site.clone()),
        comments_enabled: app.comments.is_configured(),
        cache: app.cache.clone(),
    };
    let api_state = ApiState {
        content: app.content.clone(),
        comments: app.comments.clone(),
        revalidation: app.revalidation.clone(),
        summaries: app.summaries.clone(),
        rate_limiter,
    };

    let result = serve_http(&settings, http_state, api_state).await;
    purge_handle.abort();
    result
}

fn spawn_rate_limit_purge(
    limiter: Arc<FixedWindowRateLimiter>,
    window: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(window);
        interval.tick().await;
        loop {
            interval.tick().await;
            limiter.purge_expired(time::OffsetDateTime::now_utc());
        }
    })
}

async fn serve_http(
    settings: &Settings,
    http_state: HttpState,
    api_state: ApiState,
) -> Result<(), AppError> {
    let router_state = RouterState {
        http: http_state,
        api: api_state,
    };
    let router = http::build_app(router_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "folio::bootstrap",
        addr = %settings.server.addr,
        "listening"
    );

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.notified().await }
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        () = shutdown_signal() => {}
    }

    info!(
        target = "folio::bootstrap",
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "shutting down"
    );
    shutdown.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                target = "folio::bootstrap",
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

async fn run_render(settings: Settings, args: RenderArgs) -> Result<(), AppError> {
    let app = build_application_context(&settings)?;
    info!(
        target = "folio::render",
        block_id = %args.block_id,
        "rendering block tree"
    );

    let blocks = load_block_tree(&app.store, &args.block_id).await?;
    println!("{}", block_renderer().render_html(&blocks));
    Ok(())
}

async fn run_summarize(settings: Settings, args: SummarizeArgs) -> Result<(), AppError> {
    let app = build_application_context(&settings)?;

    let report = app
        .summaries
        .summarize(&args.page_id)
        .await
        .map_err(|err| AppError::unexpected(format!("summarization failed: {err}")))?;
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AppError::unexpected(format!("failed to encode report: {err}")))?;
    println!("{rendered}");
    Ok(())
}
