//! REST API client module for the school website backend.
//!
//! This module provides the `ApiClient` for the public endpoints (settings,
//! logo, gallery, news, theme, contact) and the admin writes, plus the
//! `SchoolApi` trait the cache stores depend on so they can be driven by a
//! scripted backend in tests.
//!
//! Every response is wrapped in a `{ success, data, message? }` envelope;
//! list endpoints add `page`, `pages` and `total`.

pub mod client;
pub mod envelope;
pub mod error;
pub mod school_api;

pub use client::ApiClient;
pub use envelope::{Envelope, PagedEnvelope};
pub use error::ApiError;
pub use school_api::{AdminApi, FetchedBytes, SchoolApi};
