//! In-process backend for the scenario tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;

use schoolcache_core::api::{ApiError, FetchedBytes, SchoolApi};
use schoolcache_core::cache::{Clock, SystemClock};
use schoolcache_core::models::{
    ContactMessage, GalleryImage, GalleryQuery, LogoInfo, NewsItem, NewsPage, NewsQuery,
    Pagination, SchoolSettings, ThemeSettings,
};
use schoolcache_core::CacheOptions;

pub const ORIGIN: &str = "http://localhost:8000";

/// Backend whose answers are set by the test; unset endpoints are "down".
#[derive(Default)]
pub struct ScriptedBackend {
    pub settings: Mutex<Option<SchoolSettings>>,
    pub logo: Mutex<Option<LogoInfo>>,
    pub gallery: Mutex<Option<Vec<GalleryImage>>>,
    pub carousel: Mutex<Option<Vec<GalleryImage>>>,
    pub news: Mutex<Option<NewsPage>>,
    pub articles: Mutex<HashMap<i64, NewsItem>>,
    pub bytes: Mutex<Option<FetchedBytes>>,
    pub gallery_calls: AtomicUsize,
    /// When set, gallery fetches wait for a permit.
    pub gallery_gate: Mutex<Option<Arc<Semaphore>>>,
}

fn down<T>() -> Result<T, ApiError> {
    Err(ApiError::ServerError("backend unavailable".into()))
}

fn answer<T: Clone>(slot: &Mutex<Option<T>>) -> Result<T, ApiError> {
    match slot.lock().unwrap().clone() {
        Some(value) => Ok(value),
        None => down(),
    }
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gate_gallery(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gallery_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

impl SchoolApi for ScriptedBackend {
    async fn fetch_settings(&self) -> Result<SchoolSettings, ApiError> {
        answer(&self.settings)
    }

    async fn fetch_current_logo(&self) -> Result<Option<LogoInfo>, ApiError> {
        Ok(self.logo.lock().unwrap().clone())
    }

    async fn fetch_gallery(&self, _query: &GalleryQuery) -> Result<Vec<GalleryImage>, ApiError> {
        self.gallery_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gallery_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.map_err(|e| ApiError::ServerError(e.to_string()))?;
        }
        answer(&self.gallery)
    }

    async fn fetch_carousel(&self) -> Result<Vec<GalleryImage>, ApiError> {
        answer(&self.carousel)
    }

    async fn fetch_news(&self, _query: &NewsQuery) -> Result<NewsPage, ApiError> {
        answer(&self.news)
    }

    async fn fetch_news_item(&self, id: i64) -> Result<NewsItem, ApiError> {
        self.articles
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("news {}", id)))
    }

    async fn record_news_view(&self, _id: i64) -> Result<(), ApiError> {
        Ok(())
    }

    async fn fetch_theme_settings(&self) -> Result<ThemeSettings, ApiError> {
        Ok(ThemeSettings::new())
    }

    async fn submit_contact(&self, _message: &ContactMessage) -> Result<(), ApiError> {
        Ok(())
    }

    async fn fetch_bytes(&self, _url: &str, _timeout: Duration) -> Result<FetchedBytes, ApiError> {
        answer(&self.bytes)
    }
}

pub fn options(clock: Arc<dyn Clock>) -> CacheOptions {
    CacheOptions {
        backend_origin: ORIGIN.to_string(),
        theme_poll: Duration::from_secs(5),
        gallery_poll: Duration::from_secs(60),
        logo_timeout: Duration::from_secs(5),
        clock,
    }
}

pub fn system_options() -> CacheOptions {
    options(Arc::new(SystemClock))
}

pub fn photo(id: i64, category: &str) -> GalleryImage {
    GalleryImage {
        id,
        title: format!("Foto {}", id),
        description: None,
        image_url: Some(format!("/uploads/images/gallery/{}.jpg", id)),
        category: Some(category.to_string()),
        is_featured: false,
        is_carousel: false,
        created_at: None,
    }
}

pub fn article(id: i64) -> NewsItem {
    NewsItem {
        id,
        title: format!("Berita {}", id),
        content: format!("Isi berita {}", id),
        excerpt: None,
        image_url: None,
        category: Some("Akademik".to_string()),
        author: None,
        is_featured: false,
        views: 0,
        published_at: None,
    }
}

pub fn page_of(items: Vec<NewsItem>) -> NewsPage {
    let total = items.len() as u64;
    NewsPage {
        items,
        pagination: Pagination { page: 1, pages: 1, total },
    }
}
