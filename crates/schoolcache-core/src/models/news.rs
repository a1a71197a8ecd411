use serde::{Deserialize, Serialize};

/// Default page size of the public news list.
pub const DEFAULT_NEWS_LIMIT: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewsItem {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default, alias = "imageUrl", alias = "image")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, alias = "isFeatured")]
    pub is_featured: bool,
    #[serde(default)]
    pub views: i64,
    #[serde(default, alias = "publishedAt", alias = "created_at")]
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Pagination {
    pub page: u32,
    pub pages: u32,
    pub total: u64,
}

/// One page of the news list together with its pagination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewsPage {
    pub items: Vec<NewsItem>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NewsQuery {
    pub page: u32,
    pub limit: u32,
    pub search: String,
    pub featured: bool,
    pub category: Option<String>,
}

impl Default for NewsQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_NEWS_LIMIT,
            search: String::new(),
            featured: false,
            category: None,
        }
    }
}

impl NewsQuery {
    pub fn page(page: u32) -> Self {
        Self {
            page: page.max(1),
            ..Default::default()
        }
    }

    pub fn for_category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Default::default()
        }
    }

    /// Durable key of a list page: `news_<page>_<limit>_<search>_<featured>`.
    pub fn cache_key(&self) -> String {
        format!(
            "news_{}_{}_{}_{}",
            self.page, self.limit, self.search, self.featured
        )
    }

    /// Query string parameters for `GET /news`.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if !self.search.is_empty() {
            params.push(("search", self.search.clone()));
        }
        if self.featured {
            params.push(("featured", "true".to_string()));
        }
        if let Some(ref category) = self.category {
            params.push(("category", category.clone()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_shape() {
        let query = NewsQuery {
            page: 2,
            limit: 9,
            search: "lomba".into(),
            featured: true,
            category: None,
        };
        assert_eq!(query.cache_key(), "news_2_9_lomba_true");
        assert_eq!(NewsQuery::default().cache_key(), "news_1_6__false");
    }

    #[test]
    fn test_params_skip_empty_filters() {
        let params = NewsQuery::page(0).params();
        assert_eq!(params, vec![("page", "1".to_string()), ("limit", "6".to_string())]);

        let params = NewsQuery::for_category("Akademik").params();
        assert!(params.contains(&("category", "Akademik".to_string())));
    }

    #[test]
    fn test_parse_news_item_aliases() {
        let json = r#"{"id": 7, "title": "PPDB", "image": "berita.jpg", "created_at": "2024-07-01"}"#;
        let item: NewsItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.image_url.as_deref(), Some("berita.jpg"));
        assert_eq!(item.published_at.as_deref(), Some("2024-07-01"));
        assert_eq!(item.views, 0);
    }
}
