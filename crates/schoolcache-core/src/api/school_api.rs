//! The backend seam the cache stores are written against.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{
    ContactMessage, GalleryImage, GalleryImageUpdate, GalleryQuery, LogoInfo, NewsItem, NewsPage,
    NewsQuery, SchoolSettings, SettingsPatch, ThemeSetting, ThemeSettings,
};

use super::ApiError;

/// Raw bytes of a downloaded asset.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedBytes {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl FetchedBytes {
    /// MIME type for data URLs, defaulting to PNG like most uploaded logos.
    pub fn mime(&self) -> &str {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or("image/png")
    }
}

/// Public read endpoints consumed by the cache layer.
///
/// `ApiClient` is the production implementation; tests drive the stores with
/// a scripted backend.
pub trait SchoolApi: Send + Sync + 'static {
    fn fetch_settings(&self) -> impl Future<Output = Result<SchoolSettings, ApiError>> + Send;

    fn fetch_current_logo(
        &self,
    ) -> impl Future<Output = Result<Option<LogoInfo>, ApiError>> + Send;

    fn fetch_gallery(
        &self,
        query: &GalleryQuery,
    ) -> impl Future<Output = Result<Vec<GalleryImage>, ApiError>> + Send;

    fn fetch_carousel(&self) -> impl Future<Output = Result<Vec<GalleryImage>, ApiError>> + Send;

    fn fetch_news(&self, query: &NewsQuery) -> impl Future<Output = Result<NewsPage, ApiError>> + Send;

    fn fetch_news_item(&self, id: i64) -> impl Future<Output = Result<NewsItem, ApiError>> + Send;

    fn record_news_view(&self, id: i64) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn fetch_theme_settings(&self) -> impl Future<Output = Result<ThemeSettings, ApiError>> + Send;

    fn submit_contact(
        &self,
        message: &ContactMessage,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Download an asset (logo, news image) with a per-request timeout.
    fn fetch_bytes(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<FetchedBytes, ApiError>> + Send;
}

/// Token-authenticated writes used by `AdminSession`.
pub trait AdminApi: SchoolApi {
    /// A handle on the same backend that sends `token` with every request.
    fn authorized(self: &Arc<Self>, token: String) -> Arc<Self>;

    /// Save settings and return the record the server stored.
    fn update_settings(
        &self,
        patch: &SettingsPatch,
    ) -> impl Future<Output = Result<SchoolSettings, ApiError>> + Send;

    fn update_about_settings(
        &self,
        about: &serde_json::Value,
    ) -> impl Future<Output = Result<serde_json::Value, ApiError>> + Send;

    fn upload_logo(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> impl Future<Output = Result<LogoInfo, ApiError>> + Send;

    fn activate_logo(&self, id: i64) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn remove_logo(&self, id: i64) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn update_gallery_image(
        &self,
        id: i64,
        update: &GalleryImageUpdate,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn remove_gallery_image(&self, id: i64) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn remove_news(&self, id: i64) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn update_theme_setting(
        &self,
        setting: &ThemeSetting,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
