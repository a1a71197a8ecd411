//! Authenticated admin writes that keep the local cache in step.
//!
//! Every write goes to the server first. Only after it succeeds is the
//! affected cache updated, refreshed, or a refresh requested over the event
//! bus, so a rejected write never leaves local state ahead of the server.

use std::sync::Arc;

use tracing::info;

use crate::api::{AdminApi, ApiError};
use crate::context::SchoolCache;
use crate::models::{GalleryImageUpdate, LogoInfo, SchoolSettings, SettingsPatch, ThemeSetting};

pub struct AdminSession<'a, A> {
    client: Arc<A>,
    cache: &'a SchoolCache<A>,
}

impl<'a, A: AdminApi> AdminSession<'a, A> {
    pub(crate) fn new(client: Arc<A>, cache: &'a SchoolCache<A>) -> Self {
        Self { client, cache }
    }

    /// Save settings on the server and cache the record it returns.
    pub async fn update_settings(&self, patch: &SettingsPatch) -> Result<SchoolSettings, ApiError> {
        let saved = self.client.update_settings(patch).await?;
        let settings = self.cache.settings().replace_settings(saved);
        info!(school = %settings.school_name, "Settings saved");
        Ok(settings)
    }

    pub async fn update_about_settings(
        &self,
        about: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        self.client.update_about_settings(about).await
    }

    // ===== Logo =====

    /// Upload and activate a new logo, then pick it up in settings.
    pub async fn upload_logo(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<LogoInfo, ApiError> {
        let logo = self.client.upload_logo(file_name, bytes, mime).await?;
        info!(file_name, id = ?logo.id, "Logo uploaded");
        self.cache.settings().refresh().await;
        Ok(logo)
    }

    pub async fn activate_logo(&self, id: i64) -> Result<(), ApiError> {
        self.client.activate_logo(id).await?;
        info!(id, "Logo activated");
        self.cache.settings().refresh().await;
        Ok(())
    }

    pub async fn delete_logo(&self, id: i64) -> Result<(), ApiError> {
        self.client.remove_logo(id).await?;
        self.cache.settings().refresh().await;
        Ok(())
    }

    // ===== Gallery =====

    pub async fn update_gallery_image(
        &self,
        id: i64,
        update: &GalleryImageUpdate,
    ) -> Result<(), ApiError> {
        self.client.update_gallery_image(id, update).await?;
        self.after_gallery_change().await;
        Ok(())
    }

    pub async fn delete_gallery_image(&self, id: i64) -> Result<(), ApiError> {
        self.client.remove_gallery_image(id).await?;
        info!(id, "Gallery image deleted");
        self.after_gallery_change().await;
        Ok(())
    }

    /// Listings are refreshed here; carousel listeners refetch on the request.
    async fn after_gallery_change(&self) {
        self.cache.gallery().request_carousel_refresh();
        self.cache.gallery().refresh_all().await;
    }

    // ===== News and theme =====

    pub async fn delete_news(&self, id: i64) -> Result<(), ApiError> {
        self.client.remove_news(id).await?;
        info!(id, "News article deleted");
        self.cache.news().forget_article(id);
        Ok(())
    }

    pub async fn update_theme_setting(&self, setting: &ThemeSetting) -> Result<(), ApiError> {
        self.client.update_theme_setting(setting).await?;
        self.cache.theme().refresh().await;
        Ok(())
    }
}
