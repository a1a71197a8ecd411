//! Helpers shared by the stores.

pub mod keys;
pub mod media;

pub use keys::{logo_key, news_image_key};
pub use media::{gallery_image_url, news_image_url, ImageKind};
