//! Data models for the school website API.
//!
//! - `SchoolSettings`, `SettingsPatch`: school identity shown on every page
//! - `GalleryImage`, `GalleryQuery`, `GalleryImageUpdate`: gallery and carousel images
//! - `NewsItem`, `NewsPage`, `NewsQuery`, `Pagination`: news list and detail
//! - `ThemeSetting`, `ThemeSettings`: component colour palette
//! - `LogoInfo`: the active logo
//! - `ContactMessage`: public contact form submission

pub mod contact;
pub mod gallery;
pub mod logo;
pub mod news;
pub mod settings;
pub mod theme;

pub use contact::ContactMessage;
pub use gallery::{GalleryImage, GalleryImageUpdate, GalleryQuery};
pub use logo::LogoInfo;
pub use news::{NewsItem, NewsPage, NewsQuery, Pagination, DEFAULT_NEWS_LIMIT};
pub use settings::{SchoolSettings, SettingsPatch};
pub use theme::{css_variable_name, group_by_component, ThemeSetting, ThemeSettings};
