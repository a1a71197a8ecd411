//! Application-level cache context.
//!
//! `SchoolCache` is built once at startup and owns everything with a
//! lifetime: the event bus, the durable store, every typed store, the blob
//! registry and the background pollers. Dropping it (or calling `shutdown`)
//! stops all background work.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::IgnoredAny;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::admin::AdminSession;
use crate::api::{AdminApi, ApiClient, ApiError, SchoolApi};
use crate::cache::lock::mutex_lock;
use crate::cache::{CacheEntry, Clock, DurableStore, FileStore, RefreshOutcome, SystemClock};
use crate::config::Config;
use crate::events::{CacheEvent, EventBus, Published};
use crate::models::{ContactMessage, NewsQuery};
use crate::stores::{
    BlobCache, BlobRegistry, DocumentHead, GalleryStore, MemoryBlobRegistry, NewsStore,
    PollHandle, SettingsStore, ThemeStore,
};

/// Runtime knobs shared by the stores.
#[derive(Clone)]
pub struct CacheOptions {
    /// Origin serving uploaded media, e.g. `http://localhost:8000`.
    pub backend_origin: String,
    pub theme_poll: Duration,
    pub gallery_poll: Duration,
    pub logo_timeout: Duration,
    pub clock: Arc<dyn Clock>,
}

impl CacheOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            backend_origin: config.backend_origin(),
            theme_poll: config.theme_poll_interval(),
            gallery_poll: config.gallery_poll_interval(),
            logo_timeout: config.logo_timeout(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Outcome of each refresh issued by `warm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmReport {
    pub settings: RefreshOutcome,
    pub carousel: RefreshOutcome,
    pub featured_gallery: RefreshOutcome,
    pub news: RefreshOutcome,
    pub theme: RefreshOutcome,
}

impl WarmReport {
    pub fn failures(&self) -> usize {
        [&self.settings, &self.carousel, &self.featured_gallery, &self.news, &self.theme]
            .iter()
            .filter(|o| matches!(o, RefreshOutcome::Failed(_)))
            .count()
    }
}

/// Age of one durable key, for `cache-info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheAge {
    pub key: String,
    /// Entries stored under the key (collections hold several).
    pub entries: usize,
    /// Age of the newest entry, `None` for raw values such as data URLs.
    pub age: Option<String>,
}

pub struct SchoolCache<A = ApiClient> {
    api: Arc<A>,
    store: Arc<dyn DurableStore>,
    bus: EventBus,
    options: CacheOptions,
    settings: Arc<SettingsStore<A>>,
    gallery: Arc<GalleryStore<A>>,
    news: Arc<NewsStore<A>>,
    theme: Arc<ThemeStore<A>>,
    logos: Arc<BlobCache<A>>,
    news_images: Arc<BlobCache<A>>,
    pollers: Mutex<Vec<PollHandle>>,
}

impl SchoolCache<ApiClient> {
    /// Production wiring: HTTP client, file-backed store, in-memory blobs.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_url = config.api_url();
        let api = ApiClient::new(&api_url).context("Failed to build HTTP client")?;
        let cache_dir = config.cache_dir()?;
        let store = FileStore::new(cache_dir.clone())
            .with_context(|| format!("Failed to open cache directory {}", cache_dir.display()))?;
        info!(api_url = %api_url, cache_dir = %cache_dir.display(), "School cache ready");

        Ok(Self::with_parts(
            Arc::new(api),
            Arc::new(store),
            Arc::new(MemoryBlobRegistry::new()),
            CacheOptions::from_config(config),
        ))
    }
}

impl<A: AdminApi> SchoolCache<A> {
    /// Admin operations authenticated with `token`.
    pub fn admin(&self, token: String) -> AdminSession<'_, A> {
        AdminSession::new(self.api.authorized(token), self)
    }
}

impl<A: SchoolApi> SchoolCache<A> {
    pub fn with_parts(
        api: Arc<A>,
        store: Arc<dyn DurableStore>,
        registry: Arc<dyn BlobRegistry>,
        options: CacheOptions,
    ) -> Self {
        let bus = EventBus::new();
        let clock = options.clock.clone();
        let origin = options.backend_origin.clone();

        let settings = SettingsStore::new(api.clone(), store.clone(), bus.clone(), clock.clone());
        let gallery = GalleryStore::new(api.clone(), store.clone(), bus.clone(), clock.clone(), origin.clone());
        let news = NewsStore::new(api.clone(), store.clone(), bus.clone(), clock.clone(), origin.clone());
        let theme = ThemeStore::new(api.clone(), store.clone(), bus.clone(), clock);
        let logos = BlobCache::logos(api.clone(), registry.clone(), store.clone(), bus.clone(), origin.clone())
            .with_timeout(options.logo_timeout);
        let news_images = BlobCache::news_images(api.clone(), registry, store.clone(), bus.clone(), origin)
            .with_timeout(options.logo_timeout);

        Self {
            api,
            store,
            bus,
            options,
            settings: Arc::new(settings),
            gallery: Arc::new(gallery),
            news: Arc::new(news),
            theme: Arc::new(theme),
            logos: Arc::new(logos),
            news_images: Arc::new(news_images),
            pollers: Mutex::new(Vec::new()),
        }
    }

    // ===== Accessors =====

    pub fn settings(&self) -> &Arc<SettingsStore<A>> {
        &self.settings
    }

    pub fn gallery(&self) -> &Arc<GalleryStore<A>> {
        &self.gallery
    }

    pub fn news(&self) -> &Arc<NewsStore<A>> {
        &self.news
    }

    pub fn theme(&self) -> &Arc<ThemeStore<A>> {
        &self.theme
    }

    pub fn logos(&self) -> &Arc<BlobCache<A>> {
        &self.logos
    }

    pub fn news_images(&self) -> &Arc<BlobCache<A>> {
        &self.news_images
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.bus.subscribe()
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Title and favicon following settings changes.
    pub fn document_head(&self) -> DocumentHead {
        DocumentHead::spawn(self.settings.clone(), &self.bus, self.options.backend_origin.clone())
    }

    // ===== Lifecycle =====

    /// Refresh everything the home page shows, concurrently.
    pub async fn warm(&self) -> WarmReport {
        let first_page = NewsQuery::default();
        let (settings, carousel, featured_gallery, news, theme) = futures::join!(
            self.settings.refresh(),
            self.gallery.refresh_carousel(),
            self.gallery.refresh_featured(),
            self.news.refresh_list(&first_page),
            self.theme.refresh(),
        );

        if let Some(url) = self.settings.settings().logo_url {
            if self.logos.blob_for(&url).is_none() {
                if let Err(e) = self.logos.preload(&url).await {
                    warn!(url = %url, error = %e, "Logo preload failed");
                }
            }
        }

        let report = WarmReport {
            settings,
            carousel,
            featured_gallery,
            news,
            theme,
        };
        info!(failures = report.failures(), "Cache warmed");
        report
    }

    /// Start theme polling, gallery auto-refresh, the carousel refresh
    /// listener and the logo follower. Calling it again restarts them.
    pub fn start_background(&self) {
        let mut handles = vec![
            self.theme.spawn_polling(self.options.theme_poll),
            self.gallery.spawn_auto_refresh(self.options.gallery_poll),
            self.gallery.spawn_refresh_listener(),
            self.spawn_logo_follower(),
        ];
        let mut pollers = mutex_lock(&self.pollers, "context", "start_background");
        pollers.clear();
        pollers.append(&mut handles);
        debug!(pollers = pollers.len(), "Background tasks started");
    }

    /// Download the new logo whenever settings announce one.
    fn spawn_logo_follower(&self) -> PollHandle {
        let logos = self.logos.clone();
        let mut events = self.bus.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(published) => {
                        if let CacheEvent::LogoUpdated { url } = published.event {
                            logos.spawn_preload(&url);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Logo follower lagged behind cache events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        PollHandle::from_task("logo_follower", task)
    }

    pub fn background_tasks(&self) -> Vec<&'static str> {
        mutex_lock(&self.pollers, "context", "background_tasks")
            .iter()
            .map(PollHandle::name)
            .collect()
    }

    /// Stop background work and revoke every blob URL. Returns how many
    /// blob URLs were revoked.
    pub fn shutdown(&self) -> usize {
        let stopped: Vec<PollHandle> = mutex_lock(&self.pollers, "context", "shutdown").drain(..).collect();
        let tasks = stopped.len();
        drop(stopped);
        let released = self.logos.release_all() + self.news_images.release_all();
        info!(tasks, released, "School cache shut down");
        released
    }

    // ===== Operations =====

    /// Send the public contact form; invalid input never reaches the network.
    pub async fn submit_contact(&self, message: &ContactMessage) -> Result<(), ApiError> {
        message.validate().map_err(ApiError::InvalidRequest)?;
        self.api.submit_contact(message).await
    }

    /// Every durable key with the age of what it holds.
    pub fn cache_ages(&self) -> Result<Vec<CacheAge>> {
        let now = self.options.clock.now();
        let mut ages = Vec::new();
        for key in self.store.keys().context("Failed to list cache keys")? {
            let Some(raw) = self.store.get(&key)? else {
                continue;
            };
            ages.push(describe_entry(key, &raw, now));
        }
        Ok(ages)
    }

    /// Forget every cached value in both tiers (explicit user action).
    pub fn clear_all(&self) {
        self.settings.clear();
        self.gallery.clear();
        self.news.clear();
        let released = self.logos.clear() + self.news_images.clear();
        info!(released, "All caches cleared");
    }
}

fn describe_entry(key: String, raw: &str, now: chrono::DateTime<chrono::Utc>) -> CacheAge {
    if let Ok(entry) = serde_json::from_str::<CacheEntry<IgnoredAny>>(raw) {
        return CacheAge {
            key,
            entries: 1,
            age: Some(entry.age_display(now)),
        };
    }
    if let Ok(entries) = serde_json::from_str::<BTreeMap<String, CacheEntry<IgnoredAny>>>(raw) {
        let newest = entries.values().max_by_key(|e| e.fetched_at);
        return CacheAge {
            key,
            entries: entries.len(),
            age: newest.map(|e| e.age_display(now)),
        };
    }
    CacheAge {
        key,
        entries: 1,
        age: None,
    }
}
