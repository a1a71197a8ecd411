//! Scripted backend for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{AdminApi, ApiError, FetchedBytes, SchoolApi};
use crate::cache::lock::mutex_lock;
use crate::models::{
    ContactMessage, GalleryImage, GalleryImageUpdate, GalleryQuery, LogoInfo, NewsItem, NewsPage,
    NewsQuery, Pagination, SchoolSettings, SettingsPatch, ThemeSetting, ThemeSettings,
};

/// One endpoint: a sticky response, an optional delay and a call counter.
pub(crate) struct Endpoint<T> {
    response: Mutex<Result<T, String>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl<T: Clone> Endpoint<T> {
    pub fn new(response: Result<T, String>) -> Self {
        Self {
            response: Mutex::new(response),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_ok(&self, value: T) {
        *mutex_lock(&self.response, "testing", "set_ok") = Ok(value);
    }

    pub fn set_err(&self, message: &str) {
        *mutex_lock(&self.response, "testing", "set_err") = Err(message.to_string());
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *mutex_lock(&self.delay, "testing", "set_delay") = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Response and delay are read when the request is issued.
    fn issue(&self) -> (Result<T, String>, Option<Duration>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = mutex_lock(&self.response, "testing", "issue").clone();
        let delay = *mutex_lock(&self.delay, "testing", "issue");
        (response, delay)
    }

    pub async fn call(&self) -> Result<T, ApiError> {
        let (response, delay) = self.issue();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response.map_err(ApiError::ServerError)
    }
}

pub(crate) struct FakeApi {
    pub settings: Endpoint<SchoolSettings>,
    pub logo: Endpoint<Option<LogoInfo>>,
    pub gallery: Endpoint<Vec<GalleryImage>>,
    pub carousel: Endpoint<Vec<GalleryImage>>,
    pub news: Endpoint<NewsPage>,
    pub news_items: Mutex<HashMap<i64, NewsItem>>,
    pub news_item_calls: AtomicUsize,
    pub views: Endpoint<()>,
    pub theme: Endpoint<ThemeSettings>,
    pub contacts: Mutex<Vec<ContactMessage>>,
    pub bytes: Endpoint<FetchedBytes>,
    pub gallery_queries: Mutex<Vec<GalleryQuery>>,
    /// Record returned by the settings write.
    pub saved_settings: Endpoint<SchoolSettings>,
    pub uploaded_logo: Endpoint<LogoInfo>,
    /// Shared answer of every other admin write.
    pub admin_write: Endpoint<()>,
    /// Admin writes accepted so far, e.g. `"delete news 3"`.
    pub admin_log: Mutex<Vec<String>>,
    pub token: Mutex<Option<String>>,
}

fn down<T>() -> Result<T, String> {
    Err("connection refused".to_string())
}

impl FakeApi {
    /// Every endpoint fails until scripted.
    pub fn offline() -> Self {
        Self {
            settings: Endpoint::new(down()),
            logo: Endpoint::new(down()),
            gallery: Endpoint::new(down()),
            carousel: Endpoint::new(down()),
            news: Endpoint::new(down()),
            news_items: Mutex::new(HashMap::new()),
            news_item_calls: AtomicUsize::new(0),
            views: Endpoint::new(down()),
            theme: Endpoint::new(down()),
            contacts: Mutex::new(Vec::new()),
            bytes: Endpoint::new(down()),
            gallery_queries: Mutex::new(Vec::new()),
            saved_settings: Endpoint::new(down()),
            uploaded_logo: Endpoint::new(down()),
            admin_write: Endpoint::new(down()),
            admin_log: Mutex::new(Vec::new()),
            token: Mutex::new(None),
        }
    }

    pub fn add_news_item(&self, item: NewsItem) {
        mutex_lock(&self.news_items, "testing", "add_news_item").insert(item.id, item);
    }

    pub fn admin_log(&self) -> Vec<String> {
        mutex_lock(&self.admin_log, "testing", "admin_log").clone()
    }

    /// Answer of a write; logged only when accepted.
    async fn write<T: Clone>(&self, endpoint: &Endpoint<T>, what: String) -> Result<T, ApiError> {
        let value = endpoint.call().await?;
        mutex_lock(&self.admin_log, "testing", "write").push(what);
        Ok(value)
    }
}

pub(crate) fn image(id: i64, url: &str) -> GalleryImage {
    GalleryImage {
        id,
        title: format!("Foto {}", id),
        description: None,
        image_url: Some(url.to_string()),
        category: Some("Prestasi".to_string()),
        is_featured: false,
        is_carousel: false,
        created_at: None,
    }
}

pub(crate) fn news_item(id: i64, title: &str) -> NewsItem {
    NewsItem {
        id,
        title: title.to_string(),
        content: format!("Isi berita {}", id),
        excerpt: None,
        image_url: Some(format!("news-{}.jpg", id)),
        category: Some("Akademik".to_string()),
        author: Some("Humas".to_string()),
        is_featured: false,
        views: 0,
        published_at: Some("2024-08-17".to_string()),
    }
}

pub(crate) fn news_page(items: Vec<NewsItem>) -> NewsPage {
    let total = items.len() as u64;
    NewsPage {
        items,
        pagination: Pagination {
            page: 1,
            pages: 1,
            total,
        },
    }
}

pub(crate) fn theme_setting(component: &str, element: &str, color_type: &str, value: &str, active: bool) -> ThemeSetting {
    ThemeSetting {
        component_name: component.to_string(),
        element_name: element.to_string(),
        color_type: color_type.to_string(),
        color_value: value.to_string(),
        is_active: active,
    }
}

impl SchoolApi for FakeApi {
    async fn fetch_settings(&self) -> Result<SchoolSettings, ApiError> {
        self.settings.call().await
    }

    async fn fetch_current_logo(&self) -> Result<Option<LogoInfo>, ApiError> {
        self.logo.call().await
    }

    async fn fetch_gallery(&self, query: &GalleryQuery) -> Result<Vec<GalleryImage>, ApiError> {
        mutex_lock(&self.gallery_queries, "testing", "fetch_gallery").push(query.clone());
        self.gallery.call().await
    }

    async fn fetch_carousel(&self) -> Result<Vec<GalleryImage>, ApiError> {
        self.carousel.call().await
    }

    async fn fetch_news(&self, _query: &NewsQuery) -> Result<NewsPage, ApiError> {
        self.news.call().await
    }

    async fn fetch_news_item(&self, id: i64) -> Result<NewsItem, ApiError> {
        self.news_item_calls.fetch_add(1, Ordering::SeqCst);
        let found = mutex_lock(&self.news_items, "testing", "fetch_news_item").get(&id).cloned();
        found.ok_or_else(|| ApiError::NotFound(format!("news {}", id)))
    }

    async fn record_news_view(&self, _id: i64) -> Result<(), ApiError> {
        self.views.call().await
    }

    async fn fetch_theme_settings(&self) -> Result<ThemeSettings, ApiError> {
        self.theme.call().await
    }

    async fn submit_contact(&self, message: &ContactMessage) -> Result<(), ApiError> {
        mutex_lock(&self.contacts, "testing", "submit_contact").push(message.clone());
        Ok(())
    }

    async fn fetch_bytes(&self, _url: &str, _timeout: Duration) -> Result<FetchedBytes, ApiError> {
        self.bytes.call().await
    }
}

impl AdminApi for FakeApi {
    fn authorized(self: &Arc<Self>, token: String) -> Arc<Self> {
        *mutex_lock(&self.token, "testing", "authorized") = Some(token);
        Arc::clone(self)
    }

    async fn update_settings(&self, _patch: &SettingsPatch) -> Result<SchoolSettings, ApiError> {
        self.write(&self.saved_settings, "update settings".into()).await
    }

    async fn update_about_settings(
        &self,
        about: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        self.write(&self.admin_write, "update about".into()).await?;
        Ok(about.clone())
    }

    async fn upload_logo(&self, file_name: &str, _bytes: Vec<u8>, _mime: &str) -> Result<LogoInfo, ApiError> {
        self.write(&self.uploaded_logo, format!("upload logo {}", file_name)).await
    }

    async fn activate_logo(&self, id: i64) -> Result<(), ApiError> {
        self.write(&self.admin_write, format!("activate logo {}", id)).await
    }

    async fn remove_logo(&self, id: i64) -> Result<(), ApiError> {
        self.write(&self.admin_write, format!("delete logo {}", id)).await
    }

    async fn update_gallery_image(&self, id: i64, _update: &GalleryImageUpdate) -> Result<(), ApiError> {
        self.write(&self.admin_write, format!("update gallery {}", id)).await
    }

    async fn remove_gallery_image(&self, id: i64) -> Result<(), ApiError> {
        self.write(&self.admin_write, format!("delete gallery {}", id)).await
    }

    async fn remove_news(&self, id: i64) -> Result<(), ApiError> {
        self.write(&self.admin_write, format!("delete news {}", id)).await
    }

    async fn update_theme_setting(&self, setting: &ThemeSetting) -> Result<(), ApiError> {
        self.write(&self.admin_write, format!("update theme {}", setting.css_variable_name())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_fake_fails_every_endpoint() {
        let api = FakeApi::offline();
        assert!(api.fetch_settings().await.is_err());
        assert!(api.fetch_current_logo().await.is_err());
        assert!(api.fetch_gallery(&GalleryQuery::default()).await.is_err());
        assert!(api.fetch_carousel().await.is_err());
        assert!(api.fetch_news(&NewsQuery::default()).await.is_err());
        assert!(api.record_news_view(1).await.is_err());
        assert!(api.fetch_theme_settings().await.is_err());
        assert!(api.fetch_bytes("logo.png", Duration::from_secs(1)).await.is_err());
        assert!(api.remove_news(1).await.is_err());
        assert!(api.admin_log().is_empty());
    }
}
