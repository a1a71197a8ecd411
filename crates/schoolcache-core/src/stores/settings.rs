//! School identity settings.
//!
//! Settings are always available: built-in defaults, overlaid by the durable
//! snapshot under `schoolSettings`, overlaid by the server once a refresh
//! lands. Local overrides (`update_settings`) never reach the network; the
//! next server refresh wins.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::{ApiError, SchoolApi};
use crate::cache::{CacheView, Clock, DurableLayout, DurableStore, SwrCache};
use crate::cache::swr::RefreshOutcome;
use crate::events::{CacheEvent, EventBus};
use crate::models::{SchoolSettings, SettingsPatch};

pub const SETTINGS_KEY: &str = "schoolSettings";

/// Plain-string copy of the active logo URL for early paint.
pub const CACHED_LOGO_URL_KEY: &str = "cachedLogoUrl";

fn owns_settings(key: &str) -> bool {
    key == SETTINGS_KEY
}

pub struct SettingsStore<A> {
    api: Arc<A>,
    cache: SwrCache<SchoolSettings>,
    store: Arc<dyn DurableStore>,
    bus: EventBus,
}

impl<A: SchoolApi> SettingsStore<A> {
    pub fn new(
        api: Arc<A>,
        store: Arc<dyn DurableStore>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = SwrCache::new(
            "settings",
            DurableLayout::PerKey { owns: owns_settings },
            store.clone(),
        )
        .with_clock(clock)
        .with_notifier(bus.clone(), |_| CacheEvent::SchoolSettingsUpdated);

        Self {
            api,
            cache,
            store,
            bus,
        }
    }

    /// Current settings; never blocks and never empty.
    pub fn settings(&self) -> SchoolSettings {
        self.cache.get(SETTINGS_KEY).value.unwrap_or_default()
    }

    /// Cache state of the settings entry (no defaults filled in).
    pub fn view(&self) -> CacheView<SchoolSettings> {
        self.cache.get(SETTINGS_KEY)
    }

    /// Fetch settings and the active logo, storing them if they changed.
    pub async fn refresh(&self) -> RefreshOutcome {
        let api = &self.api;
        let outcome = self
            .cache
            .refresh(SETTINGS_KEY, async move {
                let mut settings = api.fetch_settings().await?;
                match api.fetch_current_logo().await {
                    Ok(Some(logo)) => {
                        if let Some(url) = logo.url() {
                            settings.logo_url = Some(url.to_string());
                        }
                    }
                    Ok(None) => debug!("No active logo on server"),
                    Err(e) => warn!(error = %e, "Failed to fetch current logo, keeping settings logo"),
                }
                Ok::<_, ApiError>(settings)
            })
            .await;

        if outcome.is_updated() {
            self.sync_logo_url();
        }
        outcome
    }

    /// Merge `patch` locally, persist it and announce the change.
    pub fn update_settings(&self, patch: &SettingsPatch) -> SchoolSettings {
        let mut settings = self.settings();
        patch.apply_to(&mut settings);
        if self.cache.put(SETTINGS_KEY, settings.clone()) {
            self.sync_logo_url();
        }
        settings
    }

    /// Store a record the server just accepted. The server's row does not
    /// carry the active logo, so a missing `logo_url` keeps the current one.
    pub fn replace_settings(&self, mut settings: SchoolSettings) -> SchoolSettings {
        if settings.logo_url.is_none() {
            settings.logo_url = self.settings().logo_url;
        }
        if self.cache.put(SETTINGS_KEY, settings.clone()) {
            self.sync_logo_url();
        }
        settings
    }

    /// Logo URL last announced, readable before settings are parsed.
    pub fn cached_logo_url(&self) -> Option<String> {
        match self.store.get(CACHED_LOGO_URL_KEY) {
            Ok(url) => url.filter(|u| !u.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read cached logo URL");
                None
            }
        }
    }

    pub fn clear(&self) {
        self.cache.clear();
        if let Err(e) = self.store.remove(CACHED_LOGO_URL_KEY) {
            warn!(error = %e, "Failed to remove cached logo URL");
        }
    }

    fn sync_logo_url(&self) {
        let Some(url) = self.settings().logo_url else {
            return;
        };
        if self.cached_logo_url().as_deref() == Some(url.as_str()) {
            return;
        }
        if let Err(e) = self.store.set(CACHED_LOGO_URL_KEY, &url) {
            warn!(error = %e, "Failed to persist logo URL");
        }
        self.bus.publish(CacheEvent::LogoUpdated { url });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{LoadState, MemoryStore, SystemClock};
    use crate::models::LogoInfo;
    use crate::testing::FakeApi;

    fn store_with(api: Arc<FakeApi>, durable: Arc<MemoryStore>, bus: EventBus) -> SettingsStore<FakeApi> {
        SettingsStore::new(api, durable, bus, Arc::new(SystemClock))
    }

    fn named(name: &str) -> SchoolSettings {
        SchoolSettings {
            school_name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_defaults_then_server_value() {
        let api = Arc::new(FakeApi::offline());
        let durable = Arc::new(MemoryStore::new());
        let settings = store_with(api.clone(), durable.clone(), EventBus::new());

        assert_eq!(settings.settings().school_name, "SMA Negeri 1 Jakarta");
        assert_eq!(settings.view().state, LoadState::Empty);

        api.settings.set_ok(named("SMK N TEMBARAK"));
        api.logo.set_ok(None);
        assert!(settings.refresh().await.is_updated());

        assert_eq!(settings.settings().school_name, "SMK N TEMBARAK");
        let raw = durable.get(SETTINGS_KEY).unwrap().unwrap();
        assert!(raw.contains("SMK N TEMBARAK"));
    }

    #[tokio::test]
    async fn test_durable_snapshot_beats_defaults() {
        let api = Arc::new(FakeApi::offline());
        let durable = Arc::new(MemoryStore::new());
        api.settings.set_ok(named("SMK N TEMBARAK"));
        api.logo.set_ok(None);
        store_with(api.clone(), durable.clone(), EventBus::new()).refresh().await;

        // New process, backend down
        let api = Arc::new(FakeApi::offline());
        let settings = store_with(api, durable, EventBus::new());
        assert_eq!(settings.settings().school_name, "SMK N TEMBARAK");

        settings.refresh().await;
        let view = settings.view();
        assert_eq!(view.value.unwrap().school_name, "SMK N TEMBARAK");
        assert!(view.error.is_some());
    }

    #[tokio::test]
    async fn test_logo_merged_and_announced() {
        let api = Arc::new(FakeApi::offline());
        let durable = Arc::new(MemoryStore::new());
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let settings = store_with(api.clone(), durable.clone(), bus);

        api.settings.set_ok(named("SMK N TEMBARAK"));
        api.logo.set_ok(Some(LogoInfo {
            id: Some(4),
            file_path: Some("/uploads/logos/logo-4.png".into()),
            is_active: true,
        }));
        settings.refresh().await;

        assert_eq!(settings.settings().logo_url.as_deref(), Some("/uploads/logos/logo-4.png"));
        assert_eq!(settings.cached_logo_url().as_deref(), Some("/uploads/logos/logo-4.png"));

        assert_eq!(rx.try_recv().unwrap().event, CacheEvent::SchoolSettingsUpdated);
        assert_eq!(
            rx.try_recv().unwrap().event,
            CacheEvent::LogoUpdated { url: "/uploads/logos/logo-4.png".into() }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_logo_failure_keeps_settings_refresh() {
        let api = Arc::new(FakeApi::offline());
        api.settings.set_ok(named("SMK N TEMBARAK"));
        let settings = store_with(api, Arc::new(MemoryStore::new()), EventBus::new());

        assert!(settings.refresh().await.is_updated());
        assert_eq!(settings.settings().school_name, "SMK N TEMBARAK");
        assert_eq!(settings.settings().logo_url, None);
    }

    #[tokio::test]
    async fn test_update_settings_is_local_until_next_refresh() {
        let api = Arc::new(FakeApi::offline());
        let durable = Arc::new(MemoryStore::new());
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let settings = store_with(api.clone(), durable.clone(), bus);

        let patch = SettingsPatch {
            motto: Some("Kerja Keras".into()),
            ..Default::default()
        };
        let updated = settings.update_settings(&patch);
        assert_eq!(updated.motto, "Kerja Keras");
        assert_eq!(settings.settings().motto, "Kerja Keras");
        assert!(durable.get(SETTINGS_KEY).unwrap().unwrap().contains("Kerja Keras"));
        assert_eq!(rx.try_recv().unwrap().event, CacheEvent::SchoolSettingsUpdated);
        assert_eq!(api.settings.calls(), 0);

        // Same patch again changes nothing
        settings.update_settings(&patch);
        assert!(rx.try_recv().is_err());

        api.settings.set_ok(named("SMK N TEMBARAK"));
        api.logo.set_ok(None);
        settings.refresh().await;
        assert_eq!(settings.settings().motto, SchoolSettings::default().motto);
    }

    #[tokio::test]
    async fn test_replace_settings_keeps_known_logo() {
        let api = Arc::new(FakeApi::offline());
        let durable = Arc::new(MemoryStore::new());
        let settings = store_with(api, durable.clone(), EventBus::new());
        settings.update_settings(&SettingsPatch {
            logo_url: Some("/uploads/l.png".into()),
            ..Default::default()
        });

        let stored = settings.replace_settings(named("SMK N TEMBARAK"));
        assert_eq!(stored.logo_url.as_deref(), Some("/uploads/l.png"));
        assert_eq!(settings.settings().school_name, "SMK N TEMBARAK");
        assert!(durable.get(SETTINGS_KEY).unwrap().unwrap().contains("SMK N TEMBARAK"));
    }

    #[tokio::test]
    async fn test_clear_forgets_snapshot() {
        let api = Arc::new(FakeApi::offline());
        let durable = Arc::new(MemoryStore::new());
        let settings = store_with(api, durable.clone(), EventBus::new());
        settings.update_settings(&SettingsPatch {
            logo_url: Some("/uploads/l.png".into()),
            ..Default::default()
        });
        assert!(durable.get(CACHED_LOGO_URL_KEY).unwrap().is_some());

        settings.clear();
        assert!(durable.is_empty());
        assert_eq!(settings.settings(), SchoolSettings::default());
    }
}
