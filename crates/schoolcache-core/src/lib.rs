//! Core library for schoolcache.
//!
//! A client for the school website REST API that keeps every view instantly
//! populated from a layered cache (memory tier, durable tier, network) and
//! reconciles it with background refreshes.
//!
//! - [`api`]: REST client and the [`api::SchoolApi`] seam the stores depend on
//! - [`cache`]: the generic stale-while-revalidate primitive and durable stores
//! - [`stores`]: typed bindings for settings, gallery, news, logos and theme
//! - [`events`]: typed publish/subscribe bus for change notifications
//! - [`context`]: the application-level [`SchoolCache`] that owns all of it

pub mod admin;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod events;
pub mod models;
pub mod stores;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{AdminApi, ApiClient, ApiError, SchoolApi};
pub use cache::{CacheView, DurableStore, FileStore, LoadState, MemoryStore, SwrCache};
pub use config::Config;
pub use context::{CacheOptions, SchoolCache};
pub use events::{CacheEvent, EventBus};
