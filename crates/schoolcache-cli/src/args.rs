//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use schoolcache_core::models::{
    GalleryImageUpdate, GalleryQuery, NewsQuery, SettingsPatch, ThemeSetting, DEFAULT_NEWS_LIMIT,
};

#[derive(Parser, Debug)]
#[command(
    name = "schoolcache",
    version,
    about = "Warm and inspect the school website cache",
    long_about = None
)]
pub struct Cli {
    /// Write logs to this file instead of stderr
    #[arg(long, global = true, env = "SCHOOLCACHE_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// API base URL, e.g. http://localhost:8000/api
    #[arg(long, global = true, env = "SCHOOLCACHE_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Refresh everything the home page shows
    Warm,
    /// Print school settings
    Settings,
    /// Print a page of news
    News(NewsArgs),
    /// Print one article and count a view
    NewsDetail { id: i64 },
    /// Print gallery images
    Gallery(GalleryArgs),
    /// Print the colour palette as a stylesheet
    Theme,
    /// List cached keys and their age
    CacheInfo,
    /// Delete every cached value
    ClearCache,
    /// Store an admin token in the OS keychain
    SetToken { user: String },
    /// Remove the stored admin token
    ClearToken,
    /// Authenticated writes to the backend
    Admin(AdminArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct NewsArgs {
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,
    #[arg(long, default_value_t = DEFAULT_NEWS_LIMIT, value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: u32,
    #[arg(long, default_value = "")]
    pub search: String,
    #[arg(long)]
    pub featured: bool,
    /// Read the category feed instead of a list page
    #[arg(long)]
    pub category: Option<String>,
}

impl NewsArgs {
    pub fn query(&self) -> NewsQuery {
        NewsQuery {
            page: self.page,
            limit: self.limit,
            search: self.search.clone(),
            featured: self.featured,
            category: self.category.clone(),
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct GalleryArgs {
    #[arg(long, default_value = "all")]
    pub category: String,
    #[arg(long)]
    pub featured: bool,
}

impl GalleryArgs {
    pub fn query(&self) -> GalleryQuery {
        GalleryQuery::new(self.category.clone(), self.featured)
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct AdminArgs {
    #[command(subcommand)]
    pub action: AdminCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum AdminCommand {
    /// Change school settings
    SetSetting(SettingArgs),
    /// Upload an image file as the active logo
    UploadLogo { path: PathBuf },
    ActivateLogo { id: i64 },
    DeleteLogo { id: i64 },
    /// Edit a gallery image's metadata
    UpdateGallery(GalleryUpdateArgs),
    DeleteGallery { id: i64 },
    DeleteNews { id: i64 },
    /// Set one theme colour, e.g. `set-color navbar bg background #1e3a8a`
    SetColor {
        component: String,
        element: String,
        color_type: String,
        value: String,
    },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct SettingArgs {
    #[arg(long)]
    pub school_name: Option<String>,
    #[arg(long)]
    pub short_name: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub website: Option<String>,
    #[arg(long)]
    pub motto: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub news_background_color: Option<String>,
    /// Repeat for each feature; replaces the whole list
    #[arg(long = "key-feature")]
    pub key_features: Vec<String>,
}

impl SettingArgs {
    pub fn patch(&self) -> SettingsPatch {
        SettingsPatch {
            school_name: self.school_name.clone(),
            short_name: self.short_name.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            website: self.website.clone(),
            motto: self.motto.clone(),
            description: self.description.clone(),
            logo_url: None,
            news_background_color: self.news_background_color.clone(),
            key_features: (!self.key_features.is_empty()).then(|| self.key_features.clone()),
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct GalleryUpdateArgs {
    pub id: i64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub featured: Option<bool>,
    #[arg(long)]
    pub carousel: Option<bool>,
}

impl GalleryUpdateArgs {
    pub fn update(&self) -> GalleryImageUpdate {
        GalleryImageUpdate {
            title: self.title.clone(),
            category: self.category.clone(),
            is_featured: self.featured,
            is_carousel: self.carousel,
        }
    }
}

pub fn theme_setting(component: &str, element: &str, color_type: &str, value: &str) -> ThemeSetting {
    ThemeSetting {
        component_name: component.to_string(),
        element_name: element.to_string(),
        color_type: color_type.to_string(),
        color_value: value.to_string(),
        is_active: true,
    }
}

/// Content type for an uploaded logo, from its extension.
pub fn logo_mime(path: &std::path::Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
