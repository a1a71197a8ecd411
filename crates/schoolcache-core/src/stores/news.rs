//! News list pages, category feeds and article detail.
//!
//! All three share the stale-while-revalidate primitive. Article detail is
//! the only bounded cache: entries expire five minutes after they were
//! fetched and at most fifty are kept, all under one `newsDetailCache` key.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::SchoolApi;
use crate::cache::swr::RefreshOutcome;
use crate::cache::{CachePolicy, CacheView, Clock, DurableLayout, DurableStore, LoadState, SwrCache};
use crate::events::{CacheEvent, EventBus};
use crate::models::{NewsItem, NewsPage, NewsQuery, Pagination};
use crate::utils::keys::NEWS_IMAGE_KEY_PREFIX;
use crate::utils::news_image_url;

use super::news_fallback::fallback_page;

pub const NEWS_DETAIL_CACHE_KEY: &str = "newsDetailCache";
pub const CATEGORY_FEED_PREFIX: &str = "newsPage_";

fn owns_list(key: &str) -> bool {
    key.starts_with("news_") && !key.starts_with(NEWS_IMAGE_KEY_PREFIX)
}

fn owns_feed(key: &str) -> bool {
    key.starts_with(CATEGORY_FEED_PREFIX)
}

pub fn category_feed_key(category: &str) -> String {
    format!("{}{}", CATEGORY_FEED_PREFIX, category)
}

/// A news list as rendered: cached page, or the bundled articles when there
/// is nothing cached and the last fetch failed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsListView {
    pub news: Vec<NewsItem>,
    pub pagination: Pagination,
    pub state: LoadState,
    pub error: Option<String>,
    pub is_fallback: bool,
}

impl NewsListView {
    pub fn is_refreshing(&self) -> bool {
        self.state.is_refreshing()
    }

    /// Nothing to show and nothing coming: the page offers a retry button.
    pub fn needs_retry(&self) -> bool {
        self.news.is_empty() && self.error.is_some() && !self.is_refreshing()
    }
}

pub struct NewsStore<A> {
    api: Arc<A>,
    lists: SwrCache<NewsPage>,
    feeds: SwrCache<NewsPage>,
    details: SwrCache<NewsItem>,
    origin: String,
}

impl<A: SchoolApi> NewsStore<A> {
    pub fn new(
        api: Arc<A>,
        store: Arc<dyn DurableStore>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        origin: impl Into<String>,
    ) -> Self {
        let lists = SwrCache::new("news", DurableLayout::PerKey { owns: owns_list }, store.clone())
            .with_clock(clock.clone())
            .with_notifier(bus.clone(), |key| CacheEvent::NewsUpdated { key: key.to_string() });

        let feeds = SwrCache::new("news_feed", DurableLayout::PerKey { owns: owns_feed }, store.clone())
            .with_clock(clock.clone())
            .with_notifier(bus.clone(), |key| CacheEvent::NewsUpdated { key: key.to_string() });

        let details = SwrCache::new(
            "news_detail",
            DurableLayout::Collection {
                name: NEWS_DETAIL_CACHE_KEY,
            },
            store,
        )
        .with_policy(CachePolicy::news_detail())
        .with_clock(clock)
        .with_notifier(bus, |id| CacheEvent::NewsDetailUpdated { id: id.to_string() });

        Self {
            api,
            lists,
            feeds,
            details,
            origin: origin.into(),
        }
    }

    // ===== List pages =====

    pub fn list(&self, query: &NewsQuery) -> NewsListView {
        self.list_view(self.lists.get(&query.cache_key()), query)
    }

    pub async fn refresh_list(&self, query: &NewsQuery) -> RefreshOutcome {
        self.lists.refresh(&query.cache_key(), self.api.fetch_news(query)).await
    }

    // ===== Category feeds =====

    pub fn category_feed(&self, category: &str) -> NewsListView {
        let query = NewsQuery::for_category(category);
        self.list_view(self.feeds.get(&category_feed_key(category)), &query)
    }

    pub async fn refresh_category_feed(&self, category: &str) -> RefreshOutcome {
        let query = NewsQuery::for_category(category);
        self.feeds
            .refresh(&category_feed_key(category), self.api.fetch_news(&query))
            .await
    }

    fn list_view(&self, view: CacheView<NewsPage>, query: &NewsQuery) -> NewsListView {
        let ts = view.fetched_at.map(|at| at.timestamp_millis()).unwrap_or(0);
        match view.value {
            Some(page) => NewsListView {
                news: page.items.into_iter().map(|item| self.resolve(item, ts)).collect(),
                pagination: page.pagination,
                state: view.state,
                error: view.error,
                is_fallback: false,
            },
            None if view.error.is_some() && !view.state.is_refreshing() => {
                debug!(key = %query.cache_key(), "No cached news, showing bundled articles");
                let page = fallback_page(query);
                NewsListView {
                    news: page.items,
                    pagination: page.pagination,
                    state: view.state,
                    error: view.error,
                    is_fallback: true,
                }
            }
            None => NewsListView {
                news: Vec::new(),
                pagination: Pagination::default(),
                state: view.state,
                error: view.error,
                is_fallback: false,
            },
        }
    }

    fn resolve(&self, mut item: NewsItem, ts: i64) -> NewsItem {
        item.image_url = Some(news_image_url(item.image_url.as_deref(), &self.origin, ts));
        item
    }

    // ===== Article detail =====

    pub fn detail(&self, id: i64) -> CacheView<NewsItem> {
        let view = self.details.get(&id.to_string());
        let ts = view.fetched_at.map(|at| at.timestamp_millis()).unwrap_or(0);
        view.map(|item| self.resolve(item, ts))
    }

    pub async fn refresh_detail(&self, id: i64) -> RefreshOutcome {
        self.details.refresh(&id.to_string(), self.api.fetch_news_item(id)).await
    }

    /// Count a view; the request runs on its own task and failures are only logged.
    pub fn record_view(self: &Arc<Self>, id: i64) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            match api.record_news_view(id).await {
                Ok(()) => debug!(id, "News view recorded"),
                Err(e) => warn!(id, error = %e, "Failed to record news view"),
            }
        })
    }

    // ===== Maintenance =====

    pub fn cached_detail_ids(&self) -> Vec<String> {
        self.details.cached_keys()
    }

    /// Drop a cached article after a server-side delete.
    pub fn forget_article(&self, id: i64) {
        self.details.invalidate(&id.to_string());
    }

    pub fn clear(&self) {
        self.lists.clear();
        self.feeds.clear();
        self.details.clear();
    }
}
