//! Page title and favicon, derived from settings.
//!
//! The settings store stays free of presentation concerns; `DocumentHead`
//! listens for settings and logo events and republishes the derived
//! metadata on a watch channel.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::api::SchoolApi;
use crate::events::{CacheEvent, EventBus};
use crate::models::SchoolSettings;

use super::poll::PollHandle;
use super::settings::SettingsStore;

pub const DEFAULT_FAVICON: &str = "/favicon.ico";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadMetadata {
    pub title: String,
    pub favicon: String,
}

impl HeadMetadata {
    pub fn from_settings(settings: &SchoolSettings, origin: &str) -> Self {
        let favicon = settings
            .logo_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| absolute_url(url, origin))
            .unwrap_or_else(|| DEFAULT_FAVICON.to_string());

        Self {
            title: settings.page_title(),
            favicon,
        }
    }
}

fn absolute_url(url: &str, origin: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:") {
        return url.to_string();
    }
    let origin = origin.trim_end_matches('/');
    if url.starts_with('/') {
        format!("{}{}", origin, url)
    } else {
        format!("{}/{}", origin, url)
    }
}

pub struct DocumentHead {
    rx: watch::Receiver<HeadMetadata>,
    _listener: PollHandle,
}

impl DocumentHead {
    /// Start following `settings`; the initial value is computed immediately.
    pub fn spawn<A: SchoolApi>(
        settings: Arc<SettingsStore<A>>,
        bus: &EventBus,
        origin: impl Into<String>,
    ) -> Self {
        let origin = origin.into();
        let (tx, rx) = watch::channel(HeadMetadata::from_settings(&settings.settings(), &origin));
        let mut events = bus.subscribe();

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(published) => match published.event {
                        CacheEvent::SchoolSettingsUpdated | CacheEvent::LogoUpdated { .. } => {}
                        _ => continue,
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Document head lagged behind cache events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }

                let head = HeadMetadata::from_settings(&settings.settings(), &origin);
                tx.send_if_modified(|current| {
                    if *current == head {
                        return false;
                    }
                    debug!(title = %head.title, favicon = %head.favicon, "Document head updated");
                    *current = head;
                    true
                });
            }
        });

        Self {
            rx,
            _listener: PollHandle::from_task("document_head", task),
        }
    }

    pub fn current(&self) -> HeadMetadata {
        self.rx.borrow().clone()
    }

    /// Receiver that wakes whenever title or favicon change.
    pub fn subscribe(&self) -> watch::Receiver<HeadMetadata> {
        self.rx.clone()
    }
}
