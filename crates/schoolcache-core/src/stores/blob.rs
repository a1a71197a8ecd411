//! Downloaded images kept as blob URLs (this session) and data URLs (durable).
//!
//! A blob URL is cheap to hand to a renderer but dies with the process; the
//! data URL copy under `logo_<base64(url)>` or `news_img_cache_<base64(url)>`
//! lets the next session paint the image before any request completes.
//! Every blob URL minted here is revoked exactly once, by `release_all`,
//! `clear` or when a newer download replaces it. After `release_all` no new
//! blob is minted; late downloads only refresh the durable copy.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiError, SchoolApi};
use crate::cache::lock::mutex_lock;
use crate::cache::{DurableStore, StorageError};
use crate::events::{CacheEvent, EventBus};
use crate::utils::keys::{data_url, decode_data_url, LOGO_KEY_PREFIX, NEWS_IMAGE_KEY_PREFIX};
use crate::utils::{logo_key, news_image_key};

/// Durable mirror of the current logo for the very first paint.
pub const FAST_LOGO_KEY: &str = "__FAST_LOGO__";

/// Default download timeout for logo bytes.
pub const LOGO_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Blob registry
// ============================================================================

/// Mints and revokes in-session object URLs.
pub trait BlobRegistry: Send + Sync {
    fn create(&self, bytes: &[u8], mime: &str) -> String;

    fn revoke(&self, url: &str);
}

/// Registry that keeps blobs in process memory as `blob:schoolcache/<n>`.
#[derive(Debug, Default)]
pub struct MemoryBlobRegistry {
    next: AtomicU64,
    live: Mutex<HashMap<String, (String, Vec<u8>)>>,
    revoked: Mutex<Vec<String>>,
}

impl MemoryBlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// MIME type and bytes behind a live blob URL.
    pub fn resolve(&self, url: &str) -> Option<(String, Vec<u8>)> {
        mutex_lock(&self.live, "stores::blob", "resolve").get(url).cloned()
    }

    pub fn live_count(&self) -> usize {
        mutex_lock(&self.live, "stores::blob", "live_count").len()
    }

    /// Every `revoke` call so far, in order, duplicates included.
    pub fn revoked(&self) -> Vec<String> {
        mutex_lock(&self.revoked, "stores::blob", "revoked").clone()
    }
}

impl BlobRegistry for MemoryBlobRegistry {
    fn create(&self, bytes: &[u8], mime: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        let url = format!("blob:schoolcache/{}", n);
        mutex_lock(&self.live, "stores::blob", "create")
            .insert(url.clone(), (mime.to_string(), bytes.to_vec()));
        url
    }

    fn revoke(&self, url: &str) {
        mutex_lock(&self.live, "stores::blob", "revoke").remove(url);
        mutex_lock(&self.revoked, "stores::blob", "revoke").push(url.to_string());
    }
}

// ============================================================================
// Blob cache
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlobKind {
    Logo,
    NewsImage,
}

impl BlobKind {
    fn name(&self) -> &'static str {
        match self {
            BlobKind::Logo => "logo",
            BlobKind::NewsImage => "news_image",
        }
    }

    fn key(&self, url: &str) -> String {
        match self {
            BlobKind::Logo => logo_key(url),
            BlobKind::NewsImage => news_image_key(url),
        }
    }

    fn owns(&self, key: &str) -> bool {
        match self {
            BlobKind::Logo => key.starts_with(LOGO_KEY_PREFIX) || key == FAST_LOGO_KEY,
            BlobKind::NewsImage => key.starts_with(NEWS_IMAGE_KEY_PREFIX),
        }
    }
}

/// Contents of `__FAST_LOGO__`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastLogo {
    pub url: String,
    pub data_url: String,
}

pub struct BlobCache<A> {
    kind: BlobKind,
    api: Arc<A>,
    registry: Arc<dyn BlobRegistry>,
    store: Arc<dyn DurableStore>,
    bus: EventBus,
    origin: String,
    timeout: Duration,
    /// Source URL to blob URL.
    blobs: Mutex<HashMap<String, String>>,
    pending: Mutex<HashSet<String>>,
    /// Set by `release_all`; the session is over.
    released: AtomicBool,
}

/// Clears the in-flight marker for `url` however the download ends,
/// including when its task is aborted.
struct PendingPreload<A> {
    cache: Arc<BlobCache<A>>,
    url: String,
}

impl<A> Drop for PendingPreload<A> {
    fn drop(&mut self) {
        mutex_lock(&self.cache.pending, "stores::blob", "pending_done").remove(&self.url);
    }
}

impl<A: SchoolApi> BlobCache<A> {
    /// Cache for school logos; also maintains `__FAST_LOGO__`.
    pub fn logos(
        api: Arc<A>,
        registry: Arc<dyn BlobRegistry>,
        store: Arc<dyn DurableStore>,
        bus: EventBus,
        origin: impl Into<String>,
    ) -> Self {
        Self::new(BlobKind::Logo, api, registry, store, bus, origin.into())
    }

    /// Cache for news article images.
    pub fn news_images(
        api: Arc<A>,
        registry: Arc<dyn BlobRegistry>,
        store: Arc<dyn DurableStore>,
        bus: EventBus,
        origin: impl Into<String>,
    ) -> Self {
        Self::new(BlobKind::NewsImage, api, registry, store, bus, origin.into())
    }

    fn new(
        kind: BlobKind,
        api: Arc<A>,
        registry: Arc<dyn BlobRegistry>,
        store: Arc<dyn DurableStore>,
        bus: EventBus,
        origin: String,
    ) -> Self {
        Self {
            kind,
            api,
            registry,
            store,
            bus,
            origin,
            timeout: LOGO_FETCH_TIMEOUT,
            blobs: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashSet::new()),
            released: AtomicBool::new(false),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn absolute(&self, url: &str) -> String {
        if url.contains("://") || url.starts_with("data:") {
            return url.to_string();
        }
        let origin = self.origin.trim_end_matches('/');
        if url.starts_with('/') {
            format!("{}{}", origin, url)
        } else {
            format!("{}/{}", origin, url)
        }
    }

    // ===== Download =====

    /// Download `url`, mint a blob URL for it and persist a data URL copy.
    ///
    /// Once `release_all` has run the data URL is returned instead of a blob.
    pub async fn preload(&self, url: &str) -> Result<String, ApiError> {
        let target = self.absolute(url);
        let fetched = tokio::time::timeout(self.timeout, self.api.fetch_bytes(&target, self.timeout))
            .await
            .map_err(|_| ApiError::Timeout(self.timeout))??;

        let mime = fetched.mime().to_string();
        let data = data_url(&mime, &fetched.bytes);
        let blob = {
            let mut blobs = mutex_lock(&self.blobs, "stores::blob", "preload");
            if self.released.load(Ordering::SeqCst) {
                None
            } else {
                let blob = self.registry.create(&fetched.bytes, &mime);
                if let Some(old) = blobs.insert(url.to_string(), blob.clone()) {
                    self.registry.revoke(&old);
                }
                Some(blob)
            }
        };

        self.persist(&self.kind.key(url), &data);
        let Some(blob) = blob else {
            debug!(cache = self.kind.name(), url, "Download finished after release, no blob minted");
            return Ok(data);
        };
        if self.kind == BlobKind::Logo {
            let fast = FastLogo {
                url: url.to_string(),
                data_url: data,
            };
            match serde_json::to_string(&fast) {
                Ok(json) => self.persist(FAST_LOGO_KEY, &json),
                Err(e) => warn!(error = %e, "Failed to serialize fast logo"),
            }
            self.bus.publish(CacheEvent::NavbarLogoUpdated { url: blob.clone() });
        }

        info!(cache = self.kind.name(), url, bytes = fetched.bytes.len(), "Image cached");
        Ok(blob)
    }

    /// Durable write; a full store drops this cache's older copies and retries once.
    fn persist(&self, key: &str, value: &str) {
        match self.store.set(key, value) {
            Ok(()) => {}
            Err(e) if e.is_quota() => {
                warn!(cache = self.kind.name(), key, error = %e, "Storage quota exceeded, pruning cached images");
                self.prune_durable(key);
                if let Err(e) = self.store.set(key, value) {
                    warn!(cache = self.kind.name(), key, error = %e, "Image kept in memory only");
                }
            }
            Err(e) => warn!(cache = self.kind.name(), key, error = %e, "Failed to persist image"),
        }
    }

    fn prune_durable(&self, keep: &str) {
        if let Err(e) = self.remove_owned(|key| key != keep) {
            warn!(cache = self.kind.name(), error = %e, "Failed to prune cached images");
        }
    }

    fn remove_owned(&self, filter: impl Fn(&str) -> bool) -> Result<usize, StorageError> {
        let mut removed = 0;
        for key in self.store.keys()? {
            if self.kind.owns(&key) && filter(&key) {
                self.store.remove(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    // ===== Lookup =====

    /// Best displayable URL for `url` right now; never waits on the network.
    ///
    /// Memory blob first, then the durable data URL. On a miss a download
    /// starts in the background and the original URL is returned.
    pub fn cached(self: &Arc<Self>, url: &str) -> String {
        if let Some(blob) = self.blob_for(url) {
            return blob;
        }
        if let Some(data) = self.durable_data_url(url) {
            return data;
        }
        self.spawn_preload(url);
        url.to_string()
    }

    pub fn blob_for(&self, url: &str) -> Option<String> {
        mutex_lock(&self.blobs, "stores::blob", "blob_for").get(url).cloned()
    }

    fn durable_data_url(&self, url: &str) -> Option<String> {
        let key = self.kind.key(url);
        match self.store.get(&key) {
            Ok(Some(data)) if decode_data_url(&data).is_some() => Some(data),
            Ok(Some(_)) => {
                warn!(cache = self.kind.name(), key, "Ignoring malformed cached image");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(cache = self.kind.name(), key, error = %e, "Failed to read cached image");
                None
            }
        }
    }

    /// Start a background download unless one is already running for `url`.
    pub fn spawn_preload(self: &Arc<Self>, url: &str) -> Option<JoinHandle<()>> {
        if !mutex_lock(&self.pending, "stores::blob", "spawn_preload").insert(url.to_string()) {
            debug!(cache = self.kind.name(), url, "Preload already in flight");
            return None;
        }
        let pending = PendingPreload {
            cache: Arc::clone(self),
            url: url.to_string(),
        };
        Some(tokio::spawn(async move {
            let PendingPreload { cache, url } = &pending;
            if let Err(e) = cache.preload(url).await {
                warn!(cache = cache.kind.name(), url = %url, error = %e, "Image preload failed");
            }
        }))
    }

    /// The logo mirrored for first paint, if any.
    pub fn fast_logo(&self) -> Option<FastLogo> {
        if self.kind != BlobKind::Logo {
            return None;
        }
        let raw = match self.store.get(FAST_LOGO_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read fast logo");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(fast) => Some(fast),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable fast logo");
                None
            }
        }
    }

    // ===== Cleanup =====

    /// Forget every cached image of this kind in both tiers. Unlike
    /// `release_all`, the cache keeps minting blobs afterwards.
    pub fn clear(&self) -> usize {
        let released = self.revoke_blobs();
        match self.remove_owned(|_| true) {
            Ok(removed) => info!(cache = self.kind.name(), removed, "Image cache cleared"),
            Err(e) => warn!(cache = self.kind.name(), error = %e, "Failed to clear cached images"),
        }
        released
    }

    /// Revoke every blob URL minted so far and stop minting new ones;
    /// durable copies stay.
    pub fn release_all(&self) -> usize {
        let mut blobs = mutex_lock(&self.blobs, "stores::blob", "release_all");
        self.released.store(true, Ordering::SeqCst);
        self.revoke_locked(&mut blobs)
    }

    fn revoke_blobs(&self) -> usize {
        let mut blobs = mutex_lock(&self.blobs, "stores::blob", "clear");
        self.revoke_locked(&mut blobs)
    }

    fn revoke_locked(&self, blobs: &mut HashMap<String, String>) -> usize {
        let blobs: Vec<String> = blobs
            .drain()
            .map(|(_, blob)| blob)
            .collect();
        for blob in &blobs {
            self.registry.revoke(blob);
        }
        debug!(cache = self.kind.name(), released = blobs.len(), "Blob URLs revoked");
        blobs.len()
    }
}
