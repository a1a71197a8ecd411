//! Stale-while-revalidate cache primitive.
//!
//! `SwrCache<T>` answers reads synchronously from memory, falling back to the
//! durable tier, and revalidates in the background:
//!
//! 1. `get` never touches the network. A durable hit seeds the memory tier.
//! 2. `refresh` runs the caller's fetch. A changed payload (compared as JSON)
//!    replaces the entry in both tiers and publishes a change event; an equal
//!    payload writes nothing.
//! 3. A failed fetch keeps whatever was cached and records the error on the
//!    key's view. Nothing is returned as `Err` to the caller.
//!
//! Each refresh takes a sequence number from a cache-wide counter. A response
//! that comes back after a newer refresh, a local `put`, an invalidation or an
//! eviction of the same key is discarded, so a slow stale request can never
//! overwrite a faster fresh one or resurrect a forgotten entry.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::events::{CacheEvent, EventBus};

use super::clock::{Clock, SystemClock};
use super::entry::{CacheEntry, CachePolicy};
use super::lock::mutex_lock;
use super::state::{CacheView, LoadState};
use super::storage::DurableStore;

/// Where a cache keeps its durable copy.
#[derive(Debug, Clone, Copy)]
pub enum DurableLayout {
    /// Memory tier only; nothing survives a restart.
    MemoryOnly,
    /// One durable key per cache key. `owns` recognises this cache's keys so
    /// `clear` does not touch other caches sharing the store.
    PerKey { owns: fn(&str) -> bool },
    /// Every entry serialized together under one durable key.
    Collection { name: &'static str },
}

/// Result of one `refresh` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New payload stored and announced.
    Updated,
    /// Payload equal to the cached one; nothing written.
    Unchanged,
    /// A newer refresh was issued for this key; response dropped.
    Superseded,
    /// Fetch failed; cached value kept, error recorded.
    Failed(String),
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, RefreshOutcome::Updated)
    }
}

/// Maps a cache key to the event announcing its change.
pub type EventMapper = fn(&str) -> CacheEvent;

struct Slot<T> {
    entry: Option<CacheEntry<T>>,
    state: LoadState,
    error: Option<String>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            entry: None,
            state: LoadState::Empty,
            error: None,
        }
    }
}

impl<T> Slot<T> {
    fn seeded(entry: CacheEntry<T>) -> Self {
        Self {
            entry: Some(entry),
            state: LoadState::Stale { refreshing: false },
            ..Self::default()
        }
    }
}

struct Inner<T> {
    slots: HashMap<String, Slot<T>>,
    collection_loaded: bool,
    /// Last sequence number handed out, across all keys.
    seq: u64,
    /// Newest write issued per key. Kept when slots are dropped so responses
    /// started before an invalidation still lose.
    issued: HashMap<String, u64>,
}

impl<T> Inner<T> {
    /// Claim `key` for a new write and return its sequence number.
    fn bump(&mut self, key: &str) -> u64 {
        self.seq += 1;
        self.issued.insert(key.to_string(), self.seq);
        self.seq
    }

    fn is_superseded(&self, key: &str, seq: u64) -> bool {
        self.issued.get(key).is_some_and(|&latest| seq < latest)
    }
}

pub struct SwrCache<T> {
    name: &'static str,
    layout: DurableLayout,
    policy: CachePolicy,
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    notifier: Option<(EventBus, EventMapper)>,
    inner: Mutex<Inner<T>>,
}

impl<T> SwrCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(name: &'static str, layout: DurableLayout, store: Arc<dyn DurableStore>) -> Self {
        Self {
            name,
            layout,
            policy: CachePolicy::unbounded(),
            store,
            clock: Arc::new(SystemClock),
            notifier: None,
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                collection_loaded: false,
                seq: 0,
                issued: HashMap::new(),
            }),
        }
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish `mapper(key)` on `bus` whenever a key's value changes.
    pub fn with_notifier(mut self, bus: EventBus, mapper: EventMapper) -> Self {
        self.notifier = Some((bus, mapper));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn lock(&self, op: &'static str) -> MutexGuard<'_, Inner<T>> {
        mutex_lock(&self.inner, "cache::swr", op)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Best value available right now: memory, then durable, then nothing.
    pub fn get(&self, key: &str) -> CacheView<T> {
        let now = self.clock.now();
        let mut inner = self.lock("get");
        self.seed(&mut inner, key);

        let mut expired = false;
        if let (Some(ttl), Some(slot)) = (self.policy.ttl, inner.slots.get_mut(key)) {
            if slot.entry.as_ref().is_some_and(|e| e.is_expired(ttl, now)) {
                debug!(cache = self.name, key, "Entry expired");
                slot.entry = None;
                slot.state = if slot.state.is_refreshing() {
                    LoadState::Fetching
                } else {
                    LoadState::Empty
                };
                expired = true;
            }
        }
        if expired {
            if let DurableLayout::PerKey { .. } = self.layout {
                self.remove_durable(key);
            }
        }

        match inner.slots.get(key) {
            Some(slot) => CacheView {
                value: slot.entry.as_ref().map(|e| e.value.clone()),
                state: slot.state,
                error: slot.error.clone(),
                fetched_at: slot.entry.as_ref().map(|e| e.fetched_at),
            },
            None => CacheView::empty(),
        }
    }

    /// Keys currently holding a value in the memory tier.
    pub fn cached_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .lock("cached_keys")
            .slots
            .iter()
            .filter(|(_, slot)| slot.entry.is_some())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Populate the memory tier for `key` from the durable tier, once.
    fn seed(&self, inner: &mut Inner<T>, key: &str) {
        match self.layout {
            DurableLayout::MemoryOnly => {}
            DurableLayout::PerKey { .. } => {
                if inner.slots.contains_key(key) {
                    return;
                }
                let slot = match self.read_durable::<CacheEntry<T>>(key) {
                    Some(entry) => {
                        debug!(cache = self.name, key, "Seeded from durable tier");
                        Slot::seeded(entry)
                    }
                    None => Slot::default(),
                };
                inner.slots.insert(key.to_string(), slot);
            }
            DurableLayout::Collection { name } => {
                if inner.collection_loaded {
                    return;
                }
                inner.collection_loaded = true;
                let now = self.clock.now();
                let entries = self
                    .read_durable::<BTreeMap<String, CacheEntry<T>>>(name)
                    .unwrap_or_default();
                for (entry_key, entry) in entries {
                    if self.policy.ttl.is_some_and(|ttl| entry.is_expired(ttl, now)) {
                        continue;
                    }
                    inner.slots.entry(entry_key).or_insert_with(|| Slot::seeded(entry));
                }
                debug!(cache = self.name, entries = inner.slots.len(), "Loaded collection");
            }
        }
    }

    fn read_durable<V: DeserializeOwned>(&self, durable_key: &str) -> Option<V> {
        let raw = match self.store.get(durable_key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(cache = self.name, key = durable_key, error = %e, "Durable read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(cache = self.name, key = durable_key, error = %e, "Ignoring unreadable durable entry");
                None
            }
        }
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Run `fetch` for `key` and reconcile its result with the cache.
    pub async fn refresh<F, E>(&self, key: &str, fetch: F) -> RefreshOutcome
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let seq = self.begin(key);
        let result = fetch.await;
        self.complete(key, seq, result.map_err(|e| e.to_string()))
    }

    /// Mark a refresh of `key` in flight and return its sequence number.
    fn begin(&self, key: &str) -> u64 {
        let mut inner = self.lock("begin");
        self.seed(&mut inner, key);
        let seq = inner.bump(key);
        let slot = inner.slots.entry(key.to_string()).or_default();
        slot.state = if slot.entry.is_some() {
            slot.state.begin_refresh()
        } else {
            LoadState::Fetching
        };
        seq
    }

    fn complete(&self, key: &str, seq: u64, result: Result<T, String>) -> RefreshOutcome {
        let mut inner = self.lock("complete");

        if inner.is_superseded(key, seq) {
            debug!(cache = self.name, key, seq, "Discarding out-of-order response");
            return RefreshOutcome::Superseded;
        }
        let Some(slot) = inner.slots.get_mut(key) else {
            debug!(cache = self.name, key, seq, "Key invalidated during refresh, dropping response");
            return RefreshOutcome::Superseded;
        };

        let value = match result {
            Ok(value) => value,
            Err(error) => {
                warn!(cache = self.name, key, error = %error, has_data = slot.entry.is_some(), "Refresh failed, keeping cached value");
                slot.state = if slot.entry.is_some() {
                    slot.state.fail()
                } else {
                    LoadState::Empty
                };
                slot.error = Some(error.clone());
                return RefreshOutcome::Failed(error);
            }
        };

        slot.error = None;
        slot.state = LoadState::Fresh;
        let now = self.clock.now();

        if let Some(entry) = slot.entry.as_mut() {
            if same_json(&entry.value, &value) {
                entry.fetched_at = now;
                debug!(cache = self.name, key, "Payload unchanged, skipping write");
                return RefreshOutcome::Unchanged;
            }
        }

        slot.entry = Some(CacheEntry::new(key, value, now));
        self.persist(&mut inner, key);
        drop(inner);

        info!(cache = self.name, key, "Cache updated");
        self.announce(key);
        RefreshOutcome::Updated
    }

    /// Store a value produced locally (e.g. an admin override) in both tiers.
    ///
    /// Counts as the newest write for `key`: refreshes issued before it are
    /// discarded when they return. Returns whether anything changed.
    pub fn put(&self, key: &str, value: T) -> bool {
        let mut inner = self.lock("put");
        self.seed(&mut inner, key);
        let now = self.clock.now();
        inner.bump(key);
        let slot = inner.slots.entry(key.to_string()).or_default();
        slot.error = None;
        slot.state = LoadState::Fresh;

        if slot.entry.as_ref().is_some_and(|e| same_json(&e.value, &value)) {
            return false;
        }
        slot.entry = Some(CacheEntry::new(key, value, now));
        self.persist(&mut inner, key);
        drop(inner);

        self.announce(key);
        true
    }

    fn announce(&self, key: &str) {
        if let Some((ref bus, mapper)) = self.notifier {
            bus.publish(mapper(key));
        }
    }

    // =========================================================================
    // Durable writes and eviction
    // =========================================================================

    fn persist(&self, inner: &mut Inner<T>, key: &str) {
        let evicted = self.enforce_bound(inner);

        match self.layout {
            DurableLayout::MemoryOnly => {}
            DurableLayout::PerKey { .. } => {
                for old in &evicted {
                    self.remove_durable(old);
                }
                if let Some(entry) = inner.slots.get(key).and_then(|s| s.entry.as_ref()) {
                    match serde_json::to_string(entry) {
                        Ok(json) => self.write_durable(key, &json),
                        Err(e) => warn!(cache = self.name, key, error = %e, "Failed to serialize entry"),
                    }
                }
            }
            DurableLayout::Collection { name } => {
                let now = self.clock.now();
                let entries: BTreeMap<&str, &CacheEntry<T>> = inner
                    .slots
                    .iter()
                    .filter_map(|(k, slot)| slot.entry.as_ref().map(|e| (k.as_str(), e)))
                    .filter(|(_, e)| !self.policy.ttl.is_some_and(|ttl| e.is_expired(ttl, now)))
                    .collect();
                match serde_json::to_string(&entries) {
                    Ok(json) => self.write_durable(name, &json),
                    Err(e) => warn!(cache = self.name, error = %e, "Failed to serialize collection"),
                }
            }
        }
    }

    /// Drop all but the `max_entries` most recently written entries.
    fn enforce_bound(&self, inner: &mut Inner<T>) -> Vec<String> {
        let Some(max) = self.policy.max_entries else {
            return Vec::new();
        };

        let mut with_data: Vec<(String, chrono::DateTime<chrono::Utc>)> = inner
            .slots
            .iter()
            .filter_map(|(k, slot)| slot.entry.as_ref().map(|e| (k.clone(), e.fetched_at)))
            .collect();
        if with_data.len() <= max {
            return Vec::new();
        }

        // Newest first; key breaks ties so eviction is deterministic
        with_data.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let evicted: Vec<String> = with_data.split_off(max).into_iter().map(|(k, _)| k).collect();

        for key in &evicted {
            inner.slots.remove(key);
            inner.bump(key);
        }
        debug!(cache = self.name, evicted = evicted.len(), "Evicted oldest entries");
        evicted
    }

    fn write_durable(&self, durable_key: &str, json: &str) {
        if let Err(e) = self.store.set(durable_key, json) {
            if e.is_quota() {
                warn!(cache = self.name, key = durable_key, error = %e, "Storage quota exceeded, keeping memory tier only");
            } else {
                warn!(cache = self.name, key = durable_key, error = %e, "Durable write failed");
            }
        }
    }

    fn remove_durable(&self, durable_key: &str) {
        if let Err(e) = self.store.remove(durable_key) {
            warn!(cache = self.name, key = durable_key, error = %e, "Durable remove failed");
        }
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Forget `key` in both tiers. An in-flight refresh for it is dropped.
    pub fn invalidate(&self, key: &str) {
        let mut inner = self.lock("invalidate");
        self.seed(&mut inner, key);
        inner.slots.remove(key);
        inner.bump(key);
        match self.layout {
            DurableLayout::MemoryOnly => {}
            DurableLayout::PerKey { .. } => self.remove_durable(key),
            DurableLayout::Collection { .. } => self.persist(&mut inner, key),
        }
    }

    /// Forget every entry of this cache in both tiers. In-flight refreshes
    /// are dropped.
    pub fn clear(&self) {
        let mut inner = self.lock("clear");
        inner.slots.clear();
        let known: Vec<String> = inner.issued.keys().cloned().collect();
        for key in &known {
            inner.bump(key);
        }
        match self.layout {
            DurableLayout::MemoryOnly => {}
            DurableLayout::PerKey { owns } => match self.store.keys() {
                Ok(keys) => keys.iter().filter(|k| owns(k.as_str())).for_each(|k| self.remove_durable(k)),
                Err(e) => warn!(cache = self.name, error = %e, "Failed to list durable keys"),
            },
            DurableLayout::Collection { name } => {
                self.remove_durable(name);
                inner.collection_loaded = true;
            }
        }
        info!(cache = self.name, "Cache cleared");
    }
}

fn same_json<T: Serialize>(a: &T, b: &T) -> bool {
    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
