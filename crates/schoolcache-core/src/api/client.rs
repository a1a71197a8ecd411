//! API client for the school website REST backend.
//!
//! This module provides the `ApiClient` struct for the public read endpoints
//! the cache layer consumes and the token-authenticated admin writes.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, multipart, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::theme::group_by_component;
use crate::models::{
    ContactMessage, GalleryImage, GalleryImageUpdate, GalleryQuery, LogoInfo, NewsItem, NewsPage,
    NewsQuery, SchoolSettings, SettingsPatch, ThemeSetting, ThemeSettings,
};

use super::envelope::{Envelope, PagedEnvelope};
use super::school_api::{AdminApi, FetchedBytes, SchoolApi};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Background refreshes are never awaited by a reader, so a generous limit is fine.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// `/theme-settings` answers either grouped by component or as a flat list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ThemeSettingsPayload {
    Grouped(ThemeSettings),
    Flat(Vec<ThemeSetting>),
}

impl ThemeSettingsPayload {
    fn into_grouped(self) -> ThemeSettings {
        match self {
            ThemeSettingsPayload::Grouped(grouped) => grouped,
            ThemeSettingsPayload::Flat(flat) => group_by_component(flat),
        }
    }
}

/// API client for the school website.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client for `base_url` (e.g. `http://localhost:8000/api`)
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Create a new ApiClient with the given admin token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, self.url(path))
            .header(header::ACCEPT, "application/json");
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn require_token(&self) -> Result<(), ApiError> {
        if self.token.is_some() {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        debug!(path, "GET");
        let envelope: Envelope<T> = Self::send_json(self.request(Method::GET, path).query(query)).await?;
        envelope.into_data()
    }

    async fn send_data<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Option<T>, ApiError> {
        debug!(path, method = %method, "write");
        let envelope: Envelope<T> = Self::send_json(self.request(method, path).json(body)).await?;
        envelope.into_optional()
    }

    async fn send_empty(&self, method: Method, path: &str) -> Result<(), ApiError> {
        debug!(path, method = %method, "write");
        let envelope: Envelope<serde_json::Value> = Self::send_json(self.request(method, path)).await?;
        envelope.into_optional().map(|_| ())
    }

    // ===== Public Read Endpoints =====

    /// Fetch the school identity settings
    pub async fn get_settings(&self) -> Result<SchoolSettings, ApiError> {
        self.get_data("settings", &[]).await
    }

    /// Fetch the active logo; `None` when the school has not uploaded one
    pub async fn get_current_logo(&self) -> Result<Option<LogoInfo>, ApiError> {
        let response = self.request(Method::GET, "logo/current").send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        let envelope: Envelope<LogoInfo> =
            serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        envelope.into_optional()
    }

    /// Fetch gallery images matching a category / featured filter
    pub async fn get_gallery(&self, query: &GalleryQuery) -> Result<Vec<GalleryImage>, ApiError> {
        let mut params = Vec::new();
        if let Some(category) = query.category_filter() {
            params.push(("category", category.to_string()));
        }
        if query.featured {
            params.push(("featured", "true".to_string()));
        }
        self.get_data("gallery", &params).await
    }

    /// Fetch the homepage carousel images
    pub async fn get_carousel(&self) -> Result<Vec<GalleryImage>, ApiError> {
        self.get_data("gallery/carousel", &[]).await
    }

    /// Fetch one page of the news list
    pub async fn get_news(&self, query: &NewsQuery) -> Result<NewsPage, ApiError> {
        let params = query.params();
        let envelope: PagedEnvelope<NewsItem> =
            Self::send_json(self.request(Method::GET, "news").query(&params)).await?;
        let (items, pagination) = envelope.into_page()?;
        Ok(NewsPage { items, pagination })
    }

    /// Fetch a single news article
    pub async fn get_news_item(&self, id: i64) -> Result<NewsItem, ApiError> {
        self.get_data(&format!("news/{}", id), &[]).await
    }

    /// Increment the view counter of a news article
    pub async fn post_news_view(&self, id: i64) -> Result<(), ApiError> {
        self.send_empty(Method::POST, &format!("news/{}/views", id)).await
    }

    /// Fetch the colour palette grouped by component
    pub async fn get_theme_settings(&self) -> Result<ThemeSettings, ApiError> {
        let payload: ThemeSettingsPayload = self.get_data("theme-settings", &[]).await?;
        Ok(payload.into_grouped())
    }

    /// Submit the public contact form
    pub async fn post_contact(&self, message: &ContactMessage) -> Result<(), ApiError> {
        message.validate().map_err(ApiError::InvalidRequest)?;
        self.send_data::<serde_json::Value, _>(Method::POST, "contacts", message)
            .await
            .map(|_| ())
    }

    /// Download raw bytes from an absolute URL or a path under the API.
    pub async fn get_bytes(&self, url: &str, timeout: Duration) -> Result<FetchedBytes, ApiError> {
        let target = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.url(url)
        };

        let response = self
            .client
            .get(&target)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ApiError::Timeout(timeout) } else { e.into() })?;
        let response = Self::check_response(response).await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| if e.is_timeout() { ApiError::Timeout(timeout) } else { e.into() })?;

        Ok(FetchedBytes {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    // ===== Admin Endpoints =====

    /// Persist settings on the server and return the stored record
    pub async fn put_settings(&self, patch: &SettingsPatch) -> Result<SchoolSettings, ApiError> {
        self.require_token()?;
        self.send_data(Method::PUT, "settings", patch)
            .await?
            .ok_or_else(|| ApiError::InvalidResponse("settings update returned no data".into()))
    }

    /// Replace the free-form "about" page settings
    pub async fn put_about_settings(
        &self,
        about: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        self.require_token()?;
        Ok(self
            .send_data(Method::PUT, "admin/about-settings", about)
            .await?
            .unwrap_or(serde_json::Value::Null))
    }

    /// Upload a new logo image; the server marks it active
    pub async fn post_logo(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<LogoInfo, ApiError> {
        self.require_token()?;
        let builder = self.logo_upload_request(file_name, bytes, mime)?;
        let envelope: Envelope<LogoInfo> = Self::send_json(builder).await?;
        envelope.into_data()
    }

    /// `multipart/form-data` body with the image in the `logo` part.
    fn logo_upload_request(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<RequestBuilder, ApiError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = multipart::Form::new().part("logo", part);
        Ok(self.request(Method::POST, "logo/upload").multipart(form))
    }

    /// Make a previously uploaded logo the active one
    pub async fn put_logo_activation(&self, id: i64) -> Result<(), ApiError> {
        self.require_token()?;
        self.send_empty(Method::PUT, &format!("logos/{}/activate", id)).await
    }

    pub async fn delete_logo(&self, id: i64) -> Result<(), ApiError> {
        self.require_token()?;
        self.send_empty(Method::DELETE, &format!("logos/{}", id)).await
    }

    pub async fn put_gallery_image(
        &self,
        id: i64,
        update: &GalleryImageUpdate,
    ) -> Result<(), ApiError> {
        self.require_token()?;
        self.send_data::<serde_json::Value, _>(Method::PUT, &format!("gallery/{}", id), update)
            .await
            .map(|_| ())
    }

    pub async fn delete_gallery_image(&self, id: i64) -> Result<(), ApiError> {
        self.require_token()?;
        self.send_empty(Method::DELETE, &format!("gallery/{}", id)).await
    }

    pub async fn delete_news(&self, id: i64) -> Result<(), ApiError> {
        self.require_token()?;
        self.send_empty(Method::DELETE, &format!("news/{}", id)).await
    }

    /// Save one colour slot of the palette
    pub async fn put_theme_setting(&self, setting: &ThemeSetting) -> Result<(), ApiError> {
        self.require_token()?;
        self.send_data::<serde_json::Value, _>(Method::PUT, "theme-settings", setting)
            .await
            .map(|_| ())
    }
}

impl SchoolApi for ApiClient {
    async fn fetch_settings(&self) -> Result<SchoolSettings, ApiError> {
        self.get_settings().await
    }

    async fn fetch_current_logo(&self) -> Result<Option<LogoInfo>, ApiError> {
        self.get_current_logo().await
    }

    async fn fetch_gallery(&self, query: &GalleryQuery) -> Result<Vec<GalleryImage>, ApiError> {
        self.get_gallery(query).await
    }

    async fn fetch_carousel(&self) -> Result<Vec<GalleryImage>, ApiError> {
        self.get_carousel().await
    }

    async fn fetch_news(&self, query: &NewsQuery) -> Result<NewsPage, ApiError> {
        self.get_news(query).await
    }

    async fn fetch_news_item(&self, id: i64) -> Result<NewsItem, ApiError> {
        self.get_news_item(id).await
    }

    async fn record_news_view(&self, id: i64) -> Result<(), ApiError> {
        self.post_news_view(id).await
    }

    async fn fetch_theme_settings(&self) -> Result<ThemeSettings, ApiError> {
        self.get_theme_settings().await
    }

    async fn submit_contact(&self, message: &ContactMessage) -> Result<(), ApiError> {
        self.post_contact(message).await.inspect_err(|e| {
            warn!(error = %e, "Contact submission failed");
        })
    }

    async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<FetchedBytes, ApiError> {
        self.get_bytes(url, timeout).await
    }
}

impl AdminApi for ApiClient {
    fn authorized(self: &Arc<Self>, token: String) -> Arc<Self> {
        Arc::new(self.with_token(token))
    }

    async fn update_settings(&self, patch: &SettingsPatch) -> Result<SchoolSettings, ApiError> {
        self.put_settings(patch).await
    }

    async fn update_about_settings(
        &self,
        about: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        self.put_about_settings(about).await
    }

    async fn upload_logo(&self, file_name: &str, bytes: Vec<u8>, mime: &str) -> Result<LogoInfo, ApiError> {
        self.post_logo(file_name, bytes, mime).await
    }

    async fn activate_logo(&self, id: i64) -> Result<(), ApiError> {
        self.put_logo_activation(id).await
    }

    async fn remove_logo(&self, id: i64) -> Result<(), ApiError> {
        self.delete_logo(id).await
    }

    async fn update_gallery_image(&self, id: i64, update: &GalleryImageUpdate) -> Result<(), ApiError> {
        self.put_gallery_image(id, update).await
    }

    async fn remove_gallery_image(&self, id: i64) -> Result<(), ApiError> {
        self.delete_gallery_image(id).await
    }

    async fn remove_news(&self, id: i64) -> Result<(), ApiError> {
        self.delete_news(id).await
    }

    async fn update_theme_setting(&self, setting: &ThemeSetting) -> Result<(), ApiError> {
        self.put_theme_setting(setting).await
    }
}
