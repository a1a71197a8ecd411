//! Gallery listings and the homepage carousel.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::api::SchoolApi;
use crate::cache::lock::mutex_lock;
use crate::cache::swr::RefreshOutcome;
use crate::cache::{CacheView, Clock, DurableLayout, DurableStore, SwrCache};
use crate::events::{CacheEvent, EventBus};
use crate::models::{GalleryImage, GalleryQuery};
use crate::utils::gallery_image_url;

use super::poll::PollHandle;

pub const CAROUSEL_KEY: &str = "carouselImages";

fn owns_listing(key: &str) -> bool {
    key.starts_with("gallery_")
}

fn owns_carousel(key: &str) -> bool {
    key == CAROUSEL_KEY
}

pub struct GalleryStore<A> {
    api: Arc<A>,
    listings: SwrCache<Vec<GalleryImage>>,
    carousel: SwrCache<Vec<GalleryImage>>,
    bus: EventBus,
    origin: String,
    /// Queries refreshed so far, keyed by cache key, for `refresh_all`.
    seen: Mutex<BTreeMap<String, GalleryQuery>>,
}

impl<A: SchoolApi> GalleryStore<A> {
    pub fn new(
        api: Arc<A>,
        store: Arc<dyn DurableStore>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        origin: impl Into<String>,
    ) -> Self {
        let listings = SwrCache::new(
            "gallery",
            DurableLayout::PerKey { owns: owns_listing },
            store.clone(),
        )
        .with_clock(clock.clone())
        .with_notifier(bus.clone(), |key| CacheEvent::GalleryUpdated { key: key.to_string() });

        let carousel = SwrCache::new(
            "carousel",
            DurableLayout::PerKey { owns: owns_carousel },
            store,
        )
        .with_clock(clock)
        .with_notifier(bus.clone(), |_| CacheEvent::CarouselUpdated);

        Self {
            api,
            listings,
            carousel,
            bus,
            origin: origin.into(),
            seen: Mutex::new(BTreeMap::new()),
        }
    }

    // ===== Reads =====

    /// Cached images for `query`, with display-ready URLs.
    pub fn images(&self, query: &GalleryQuery) -> CacheView<Vec<GalleryImage>> {
        self.resolved(self.listings.get(&query.cache_key()))
    }

    pub fn featured(&self) -> CacheView<Vec<GalleryImage>> {
        self.images(&GalleryQuery::featured())
    }

    pub fn carousel(&self) -> CacheView<Vec<GalleryImage>> {
        self.resolved(self.carousel.get(CAROUSEL_KEY))
    }

    /// Stored URLs are the server's; the `?t=` stamp is the entry's fetch time.
    fn resolved(&self, view: CacheView<Vec<GalleryImage>>) -> CacheView<Vec<GalleryImage>> {
        let ts = view.fetched_at.map(|at| at.timestamp_millis()).unwrap_or(0);
        view.map(|images| {
            images
                .into_iter()
                .map(|mut image| {
                    image.image_url = Some(gallery_image_url(image.image_url.as_deref(), &self.origin, ts));
                    image
                })
                .collect()
        })
    }

    // ===== Refresh =====

    pub async fn refresh(&self, query: &GalleryQuery) -> RefreshOutcome {
        let key = query.cache_key();
        mutex_lock(&self.seen, "stores::gallery", "refresh").insert(key.clone(), query.clone());
        self.listings.refresh(&key, self.api.fetch_gallery(query)).await
    }

    pub async fn refresh_featured(&self) -> RefreshOutcome {
        self.refresh(&GalleryQuery::featured()).await
    }

    pub async fn refresh_carousel(&self) -> RefreshOutcome {
        self.carousel.refresh(CAROUSEL_KEY, self.api.fetch_carousel()).await
    }

    /// Refresh the carousel and every listing refreshed before.
    pub async fn refresh_all(&self) {
        let queries: Vec<GalleryQuery> = mutex_lock(&self.seen, "stores::gallery", "refresh_all")
            .values()
            .cloned()
            .collect();
        let carousel = self.refresh_carousel();
        let listings = join_all(queries.iter().map(|q| self.refresh(q)));
        let (carousel, listings) = futures::join!(carousel, listings);
        let updated = listings.iter().filter(|o| o.is_updated()).count();
        debug!(carousel = ?carousel, listings = listings.len(), updated, "Gallery refreshed");
    }

    /// Ask every carousel listener to refetch, e.g. after an admin upload.
    pub fn request_carousel_refresh(&self) {
        self.bus.publish(CacheEvent::CarouselRefreshRequested);
    }

    pub fn clear(&self) {
        self.listings.clear();
        self.carousel.clear();
        mutex_lock(&self.seen, "stores::gallery", "clear").clear();
    }

    // ===== Background tasks =====

    /// Serve `CarouselRefreshRequested` events until the handle is dropped.
    pub fn spawn_refresh_listener(self: &Arc<Self>) -> PollHandle {
        let store = Arc::clone(self);
        let mut events = self.bus.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(published) if published.event == CacheEvent::CarouselRefreshRequested => {
                        info!("Carousel refresh requested");
                        store.refresh_carousel().await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Carousel listener lagged, refreshing");
                        store.refresh_carousel().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        PollHandle::from_task("carousel_listener", task)
    }

    /// Refresh everything every `period` until the handle is dropped.
    pub fn spawn_auto_refresh(self: &Arc<Self>, period: Duration) -> PollHandle {
        let store = Arc::clone(self);
        PollHandle::spawn_interval("gallery", period, move || {
            let store = store.clone();
            async move { store.refresh_all().await }
        })
    }
}
