use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime of a cached news article.
pub const NEWS_DETAIL_TTL: Duration = Duration::from_secs(5 * 60);

/// Most news articles kept in the durable tier.
pub const NEWS_DETAIL_MAX_ENTRIES: usize = 50;

/// A stored value together with when and under which key it was fetched.
///
/// Entries are never edited in place; a refresh replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
    pub key: String,
}

impl<T> CacheEntry<T> {
    pub fn new(key: impl Into<String>, value: T, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            fetched_at,
            key: key.into(),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }

    /// Expired once strictly older than `ttl`.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => self.age(now) > ttl,
            Err(_) => false,
        }
    }

    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        let minutes = self.age(now).num_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Expiry and size bound of one logical cache. The default is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Option<Duration>,
    pub max_entries: Option<usize>,
}

impl CachePolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn news_detail() -> Self {
        Self {
            ttl: Some(NEWS_DETAIL_TTL),
            max_entries: Some(NEWS_DETAIL_MAX_ENTRIES),
        }
    }
}
