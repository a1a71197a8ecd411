//! schoolcache - warm and inspect the school website cache from a terminal.
//!
//! Every read command prints what is cached first, then refreshes from the
//! backend and prints again only when the server sent something different.

mod args;

use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use schoolcache_core::auth::TokenStore;
use schoolcache_core::cache::RefreshOutcome;
use schoolcache_core::models::{GalleryImageUpdate, GalleryQuery, NewsQuery};
use schoolcache_core::stores::{NewsListView, NewsStore};
use schoolcache_core::{ApiClient, CacheView, Config, SchoolCache};

use args::{AdminCommand, Cli, Command};

/// Initialize the tracing subscriber for logging
///
/// Logs go to stderr, or to `log_file` when given; stdout is reserved for
/// JSON output. The returned guard flushes the file writer on drop.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .context("Log file path has no file name")?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;

    let mut config = Config::load()?;
    config.api_url_override = cli.api_url.clone();
    match cli.command {
        Command::SetToken { ref user } => return set_token(&mut config, user),
        Command::ClearToken => return clear_token(&mut config),
        _ => {}
    }

    let cache = SchoolCache::from_config(&config)?;
    info!(command = ?cli.command, "schoolcache starting");
    let result = run(&cache, &config, cli.command).await;
    cache.shutdown();
    result
}

async fn run(cache: &SchoolCache, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Warm => warm(cache).await,
        Command::Settings => settings(cache).await,
        Command::News(args) => news(cache, &args.query()).await,
        Command::NewsDetail { id } => news_detail(cache, id).await,
        Command::Gallery(args) => gallery(cache, &args.query()).await,
        Command::Theme => theme(cache).await,
        Command::CacheInfo => cache_info(cache),
        Command::ClearCache => {
            cache.clear_all();
            println!("Cache cleared");
            Ok(())
        }
        Command::Admin(args) => admin(cache, config, args.action).await,
        Command::SetToken { .. } | Command::ClearToken => Ok(()),
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn warm(cache: &SchoolCache) -> Result<()> {
    let report = cache.warm().await;
    print_json(&json!({
        "settings": outcome(&report.settings),
        "carousel": outcome(&report.carousel),
        "featuredGallery": outcome(&report.featured_gallery),
        "news": outcome(&report.news),
        "theme": outcome(&report.theme),
    }))?;
    if report.failures() > 0 {
        warn!(failures = report.failures(), "Some refreshes failed; cached data kept");
    }
    Ok(())
}

async fn settings(cache: &SchoolCache) -> Result<()> {
    let store = cache.settings();
    print_json(&serde_json::to_value(store.settings())?)?;
    if store.refresh().await.is_updated() {
        print_json(&serde_json::to_value(store.settings())?)?;
    }
    report_error(&store.view())
}

async fn news(cache: &SchoolCache, query: &NewsQuery) -> Result<()> {
    let store = cache.news();
    let before = read_news(store, query);
    if before.news.is_empty() {
        eprintln!("(no cached news)");
    } else {
        print_json(&news_json(&before)?)?;
    }

    let outcome = match query.category.as_deref() {
        Some(category) => store.refresh_category_feed(category).await,
        None => store.refresh_list(query).await,
    };
    let after = read_news(store, query);
    if outcome.is_updated() || (after.is_fallback && !before.is_fallback) {
        print_json(&news_json(&after)?)?;
    }
    if let Some(ref error) = after.error {
        eprintln!("Refresh failed: {}", error);
    }
    Ok(())
}

/// `--category` reads the category feed, anything else a list page.
fn read_news(store: &NewsStore<ApiClient>, query: &NewsQuery) -> NewsListView {
    match query.category.as_deref() {
        Some(category) => store.category_feed(category),
        None => store.list(query),
    }
}

fn news_json(view: &NewsListView) -> Result<Value> {
    Ok(json!({
        "news": serde_json::to_value(&view.news)?,
        "pagination": serde_json::to_value(view.pagination)?,
        "fallback": view.is_fallback,
    }))
}

async fn news_detail(cache: &SchoolCache, id: i64) -> Result<()> {
    let store = cache.news();
    let before = store.detail(id);
    if let Some(ref item) = before.value {
        print_json(&serde_json::to_value(item)?)?;
    }

    let views = store.record_view(id);
    if store.refresh_detail(id).await.is_updated() {
        if let Some(item) = store.detail(id).value {
            print_json(&serde_json::to_value(item)?)?;
        }
    }
    // The view count is fire-and-forget, but let it finish before exiting
    let _ = views.await;

    let after = store.detail(id);
    if !after.has_data() {
        bail!(
            "Article {} not available: {}",
            id,
            after.error.unwrap_or_else(|| "not cached".into())
        );
    }
    report_error(&after)
}

async fn gallery(cache: &SchoolCache, query: &GalleryQuery) -> Result<()> {
    let store = cache.gallery();
    let before = store.images(query);
    if let Some(ref images) = before.value {
        print_json(&serde_json::to_value(images)?)?;
    }
    if store.refresh(query).await.is_updated() {
        if let Some(images) = store.images(query).value {
            print_json(&serde_json::to_value(images)?)?;
        }
    }
    report_error(&store.images(query))
}

async fn theme(cache: &SchoolCache) -> Result<()> {
    let store = cache.theme();
    store.refresh().await;
    print!("{}", store.stylesheet());
    report_error(&store.view())
}

fn cache_info(cache: &SchoolCache) -> Result<()> {
    let ages = cache.cache_ages()?;
    if ages.is_empty() {
        println!("Cache is empty");
        return Ok(());
    }
    let width = ages.iter().map(|a| a.key.len()).max().unwrap_or(0);
    for age in ages {
        let when = age.age.unwrap_or_else(|| "-".to_string());
        if age.entries > 1 {
            println!("{:<width$}  {} ({} entries)", age.key, when, age.entries, width = width);
        } else {
            println!("{:<width$}  {}", age.key, when, width = width);
        }
    }
    Ok(())
}

fn set_token(config: &mut Config, user: &str) -> Result<()> {
    let token = rpassword::prompt_password(format!("Admin token for {}: ", user))?;
    let token = token.trim();
    if token.is_empty() {
        bail!("Token must not be empty");
    }
    TokenStore::store(user, token)?;
    config.admin_user = Some(user.to_string());
    config.save()?;
    println!("Token stored for {}", user);
    Ok(())
}

fn clear_token(config: &mut Config) -> Result<()> {
    let user = config
        .admin_user
        .take()
        .context("No admin user configured; nothing to remove")?;
    TokenStore::delete(&user)?;
    config.save()?;
    println!("Token removed for {}", user);
    Ok(())
}

async fn admin(cache: &SchoolCache, config: &Config, action: AdminCommand) -> Result<()> {
    let token = TokenStore::resolve(config.admin_user.as_deref())
        .context("Admin token unavailable; run `schoolcache set-token <user>` or set SCHOOLCACHE_TOKEN")?;
    let session = cache.admin(token);

    match action {
        AdminCommand::SetSetting(args) => {
            let patch = args.patch();
            if patch.is_empty() {
                bail!("Nothing to change; pass at least one setting");
            }
            let saved = session.update_settings(&patch).await?;
            print_json(&serde_json::to_value(saved)?)?;
        }
        AdminCommand::UploadLogo { path } => {
            let mime = args::logo_mime(&path)
                .with_context(|| format!("Unsupported logo type: {}", path.display()))?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .context("Logo path has no file name")?
                .to_string();
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let logo = session.upload_logo(&file_name, bytes, mime).await?;
            print_json(&serde_json::to_value(logo)?)?;
        }
        AdminCommand::ActivateLogo { id } => {
            session.activate_logo(id).await?;
            println!("Logo {} activated", id);
        }
        AdminCommand::DeleteLogo { id } => {
            session.delete_logo(id).await?;
            println!("Logo {} deleted", id);
        }
        AdminCommand::UpdateGallery(args) => {
            let update = args.update();
            if update == GalleryImageUpdate::default() {
                bail!("Nothing to change; pass --title, --category, --featured or --carousel");
            }
            session.update_gallery_image(args.id, &update).await?;
            println!("Gallery image {} updated", args.id);
        }
        AdminCommand::DeleteGallery { id } => {
            session.delete_gallery_image(id).await?;
            println!("Gallery image {} deleted", id);
        }
        AdminCommand::DeleteNews { id } => {
            session.delete_news(id).await?;
            println!("News article {} deleted", id);
        }
        AdminCommand::SetColor {
            component,
            element,
            color_type,
            value,
        } => {
            let setting = args::theme_setting(&component, &element, &color_type, &value);
            session.update_theme_setting(&setting).await?;
            print!("{}", cache.theme().stylesheet());
        }
    }
    Ok(())
}

// ============================================================================
// Output helpers
// ============================================================================

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn outcome(outcome: &RefreshOutcome) -> Value {
    match outcome {
        RefreshOutcome::Updated => json!("updated"),
        RefreshOutcome::Unchanged => json!("unchanged"),
        RefreshOutcome::Superseded => json!("superseded"),
        RefreshOutcome::Failed(error) => json!({ "failed": error }),
    }
}

fn report_error<T>(view: &CacheView<T>) -> Result<()> {
    if let Some(ref error) = view.error {
        eprintln!("Refresh failed, showing cached data: {}", error);
    }
    Ok(())
}
