//! What a reader of the cache sees.

use chrono::{DateTime, Utc};

/// Lifecycle of one cache entry.
///
/// `Empty → Fetching → Fresh`, and once data exists
/// `Fresh → Stale { refreshing: true } → Fresh`. A value loaded from the
/// durable tier starts as `Stale { refreshing: false }` until revalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Empty,
    Fetching,
    Fresh,
    Stale { refreshing: bool },
}

impl LoadState {
    pub fn is_refreshing(&self) -> bool {
        matches!(self, LoadState::Fetching | LoadState::Stale { refreshing: true })
    }

    /// State after a refresh is issued.
    pub(crate) fn begin_refresh(self) -> Self {
        match self {
            LoadState::Empty | LoadState::Fetching => LoadState::Fetching,
            LoadState::Fresh | LoadState::Stale { .. } => LoadState::Stale { refreshing: true },
        }
    }

    /// State after the newest refresh failed.
    pub(crate) fn fail(self) -> Self {
        match self {
            LoadState::Empty | LoadState::Fetching => LoadState::Empty,
            LoadState::Fresh | LoadState::Stale { .. } => LoadState::Stale { refreshing: false },
        }
    }
}

/// Snapshot of one cache key.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheView<T> {
    pub value: Option<T>,
    pub state: LoadState,
    /// Error of the most recent failed refresh; cleared by the next success.
    pub error: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> CacheView<T> {
    pub fn empty() -> Self {
        Self {
            value: None,
            state: LoadState::Empty,
            error: None,
            fetched_at: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.is_refreshing()
    }

    /// True when the value has not been revalidated against the server yet.
    pub fn is_from_cache(&self) -> bool {
        self.value.is_some() && self.state != LoadState::Fresh
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheView<U> {
        CacheView {
            value: self.value.map(f),
            state: self.state,
            error: self.error,
            fetched_at: self.fetched_at,
        }
    }
}

impl<T> Default for CacheView<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let state = LoadState::Empty.begin_refresh();
        assert_eq!(state, LoadState::Fetching);
        assert!(state.is_refreshing());
        assert_eq!(state.fail(), LoadState::Empty);

        let state = LoadState::Fresh.begin_refresh();
        assert_eq!(state, LoadState::Stale { refreshing: true });
        assert_eq!(state.fail(), LoadState::Stale { refreshing: false });
        assert!(!state.fail().is_refreshing());
    }

    #[test]
    fn test_view_flags_are_independent() {
        let view = CacheView {
            value: Some(1),
            state: LoadState::Stale { refreshing: true },
            error: None,
            fetched_at: None,
        };
        assert!(view.has_data());
        assert!(view.is_refreshing());
        assert!(view.is_from_cache());

        let view: CacheView<i32> = CacheView {
            state: LoadState::Fetching,
            ..CacheView::empty()
        };
        assert!(!view.has_data());
        assert!(view.is_refreshing());
        assert!(!view.is_from_cache());
    }

    #[test]
    fn test_map_keeps_metadata() {
        let view = CacheView {
            value: Some(2),
            state: LoadState::Fresh,
            error: Some("x".into()),
            fetched_at: None,
        };
        let mapped = view.map(|v| v * 10);
        assert_eq!(mapped.value, Some(20));
        assert_eq!(mapped.error.as_deref(), Some("x"));
        assert!(!mapped.is_from_cache());
    }
}
