//! Component colour palette exposed as CSS custom properties.
//!
//! The palette has no durable tier: it is refetched on start and polled
//! every few seconds so admin colour edits show up without a reload.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::api::SchoolApi;
use crate::cache::{CacheView, Clock, DurableLayout, DurableStore, RefreshOutcome, SwrCache};
use crate::events::{CacheEvent, EventBus};
use crate::models::{css_variable_name, ThemeSettings};

use super::poll::PollHandle;

pub const THEME_KEY: &str = "themeSettings";

/// CSS property a colour type is applied to.
fn css_property(color_type: &str) -> Option<&'static str> {
    match color_type {
        "background" => Some("background-color"),
        "text" => Some("color"),
        "border" => Some("border-color"),
        _ => None,
    }
}

pub struct ThemeStore<A> {
    api: Arc<A>,
    cache: SwrCache<ThemeSettings>,
}

impl<A: SchoolApi> ThemeStore<A> {
    pub fn new(api: Arc<A>, store: Arc<dyn DurableStore>, bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        let cache = SwrCache::new("theme", DurableLayout::MemoryOnly, store)
            .with_clock(clock)
            .with_notifier(bus, |_| CacheEvent::ThemeUpdated);
        Self { api, cache }
    }

    pub fn view(&self) -> CacheView<ThemeSettings> {
        self.cache.get(THEME_KEY)
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        self.cache.refresh(THEME_KEY, self.api.fetch_theme_settings()).await
    }

    /// Active colours keyed by CSS variable name.
    pub fn css_variables(&self) -> BTreeMap<String, String> {
        let Some(settings) = self.view().value else {
            return BTreeMap::new();
        };
        settings
            .values()
            .flatten()
            .filter(|s| s.is_active && !s.color_value.trim().is_empty())
            .map(|s| (s.css_variable_name(), s.color_value.clone()))
            .collect()
    }

    pub fn color(&self, component: &str, element: &str, color_type: &str, default: &str) -> String {
        self.css_variables()
            .remove(&css_variable_name(component, element, color_type))
            .unwrap_or_else(|| default.to_string())
    }

    /// `var(--color-..., default)` for use in style attributes.
    pub fn css_variable(&self, component: &str, element: &str, color_type: &str, default: &str) -> String {
        format!("var({}, {})", css_variable_name(component, element, color_type), default)
    }

    /// Inline style for one element from `(color_type, default)` pairs.
    pub fn theme_style(
        &self,
        component: &str,
        element: &str,
        pairs: &[(&str, &str)],
    ) -> BTreeMap<String, String> {
        let variables = self.css_variables();
        let mut style = BTreeMap::new();
        for (color_type, default) in pairs {
            let Some(property) = css_property(color_type) else {
                debug!(color_type, "No CSS property for colour type");
                continue;
            };
            let value = variables
                .get(&css_variable_name(component, element, color_type))
                .cloned()
                .unwrap_or_else(|| default.to_string());
            style.insert(property.to_string(), value);
        }
        style
    }

    /// `:root { ... }` block declaring every active colour.
    pub fn stylesheet(&self) -> String {
        let mut css = String::from(":root {\n");
        for (name, value) in self.css_variables() {
            css.push_str(&format!("  {}: {};\n", name, value));
        }
        css.push_str("}\n");
        css
    }

    pub fn spawn_polling(self: &Arc<Self>, period: Duration) -> PollHandle {
        let store = Arc::clone(self);
        PollHandle::spawn_interval("theme", period, move || {
            let store = store.clone();
            async move {
                store.refresh().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{LoadState, MemoryStore, SystemClock};
    use crate::models::group_by_component;
    use crate::testing::{theme_setting, FakeApi};

    fn palette() -> ThemeSettings {
        group_by_component(vec![
            theme_setting("navbar", "main", "background", "#1e3a8a", true),
            theme_setting("navbar", "main", "text", "#ffffff", true),
            theme_setting("navbar", "main", "border", "#000000", false),
            theme_setting("footer", "main", "background", "#111827", true),
        ])
    }

    fn theme(api: Arc<FakeApi>, store: Arc<MemoryStore>) -> Arc<ThemeStore<FakeApi>> {
        Arc::new(ThemeStore::new(api, store, EventBus::new(), Arc::new(SystemClock)))
    }

    #[tokio::test]
    async fn test_active_entries_become_variables() {
        let api = Arc::new(FakeApi::offline());
        let store = Arc::new(MemoryStore::new());
        let theme = theme(api.clone(), store.clone());
        api.theme.set_ok(palette());
        theme.refresh().await;

        let vars = theme.css_variables();
        assert_eq!(vars.len(), 3);
        assert_eq!(vars["--color-navbar-main-background"], "#1e3a8a");
        assert!(!vars.contains_key("--color-navbar-main-border"));
        // Memory only
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_lookups_fall_back_to_defaults() {
        let api = Arc::new(FakeApi::offline());
        let theme = theme(api.clone(), Arc::new(MemoryStore::new()));

        assert_eq!(theme.color("navbar", "main", "background", "#fff"), "#fff");
        assert_eq!(theme.view().state, LoadState::Empty);

        api.theme.set_ok(palette());
        theme.refresh().await;
        assert_eq!(theme.color("navbar", "main", "background", "#fff"), "#1e3a8a");
        assert_eq!(theme.color("navbar", "main", "border", "#ccc"), "#ccc");
        assert_eq!(
            theme.css_variable("hero", "title", "text", "#000"),
            "var(--color-hero-title-text, #000)"
        );
    }

    #[tokio::test]
    async fn test_theme_style_maps_properties() {
        let api = Arc::new(FakeApi::offline());
        let theme = theme(api.clone(), Arc::new(MemoryStore::new()));
        api.theme.set_ok(palette());
        theme.refresh().await;

        let style = theme.theme_style(
            "navbar",
            "main",
            &[("background", "#fff"), ("text", "#000"), ("border", "#ddd"), ("shadow", "#999")],
        );
        assert_eq!(style.len(), 3);
        assert_eq!(style["background-color"], "#1e3a8a");
        assert_eq!(style["color"], "#ffffff");
        assert_eq!(style["border-color"], "#ddd");
    }

    #[tokio::test]
    async fn test_stylesheet() {
        let api = Arc::new(FakeApi::offline());
        let theme = theme(api.clone(), Arc::new(MemoryStore::new()));
        assert_eq!(theme.stylesheet(), ":root {\n}\n");

        api.theme.set_ok(palette());
        theme.refresh().await;
        let css = theme.stylesheet();
        assert!(css.starts_with(":root {\n  --color-footer-main-background: #111827;\n"));
        assert!(css.ends_with("}\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_picks_up_changes() {
        let api = Arc::new(FakeApi::offline());
        let theme = theme(api.clone(), Arc::new(MemoryStore::new()));
        api.theme.set_ok(palette());
        let _poll = theme.spawn_polling(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(theme.color("footer", "main", "background", ""), "#111827");

        api.theme.set_ok(group_by_component(vec![theme_setting(
            "footer", "main", "background", "#7c2d12", true,
        )]));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(theme.color("footer", "main", "background", ""), "#7c2d12");
        assert_eq!(api.theme.calls(), 2);
    }
}
