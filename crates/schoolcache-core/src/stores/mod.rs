//! Typed bindings over the stale-while-revalidate cache.
//!
//! Each store owns the caches for one part of the website and exposes
//! synchronous reads plus async refreshes:
//!
//! - `SettingsStore`: school identity, with a local override path
//! - `GalleryStore`: filtered gallery listings and the homepage carousel
//! - `NewsStore`: news list pages, category feeds and article detail
//! - `BlobCache`: downloaded logo / news images kept as blob and data URLs
//! - `ThemeStore`: component colour palette as CSS custom properties
//! - `DocumentHead`: page title and favicon derived from settings events

pub mod blob;
pub mod gallery;
pub mod head;
pub mod news;
mod news_fallback;
pub mod poll;
pub mod settings;
pub mod theme;

pub use blob::{BlobCache, BlobRegistry, MemoryBlobRegistry};
pub use gallery::GalleryStore;
pub use head::{DocumentHead, HeadMetadata};
pub use news::{NewsListView, NewsStore};
pub use poll::PollHandle;
pub use settings::SettingsStore;
pub use theme::ThemeStore;
