//! Typed change notifications.
//!
//! Stores publish a `CacheEvent` whenever a cached value actually changes, and
//! consumers (document head, carousel refresher, the CLI) subscribe instead of
//! polling. Delivery is broadcast, fire-and-forget: a subscriber created after
//! an event was published never sees it and should re-read the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

/// Events retained for slow subscribers before they start lagging.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Monotonic ordering of published events within this process.
pub type Epoch = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// School settings changed (server refresh or local override).
    SchoolSettingsUpdated,
    /// The active logo URL changed.
    LogoUpdated { url: String },
    /// Cached bytes for the navbar logo are ready to display.
    NavbarLogoUpdated { url: String },
    /// A gallery listing changed.
    GalleryUpdated { key: String },
    /// Carousel images changed.
    CarouselUpdated,
    /// Something changed the carousel on the server; listeners should refetch.
    CarouselRefreshRequested,
    /// A news list page changed.
    NewsUpdated { key: String },
    /// A cached news article changed.
    NewsDetailUpdated { id: String },
    /// The colour palette changed.
    ThemeUpdated,
}

/// An event stamped with its publish order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub epoch: Epoch,
    pub event: CacheEvent,
}

/// Cheap-to-clone handle on a broadcast channel of cache events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Published>,
    epoch: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tx,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event to current subscribers and return its epoch.
    pub fn publish(&self, event: CacheEvent) -> Epoch {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst);
        debug!(epoch, event = ?event, "Cache event published");
        // No subscribers is fine: nobody is rendering right now.
        let _ = self.tx.send(Published { epoch, event });
        epoch
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
