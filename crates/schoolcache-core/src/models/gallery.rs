use serde::{Deserialize, Serialize};

/// A gallery or carousel image as returned by the backend.
///
/// `image_url` holds whatever path shape the server stored; consumers get the
/// resolved form through the gallery store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct GalleryImage {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "imageUrl", alias = "image")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "isFeatured")]
    pub is_featured: bool,
    #[serde(default, alias = "isCarousel")]
    pub is_carousel: bool,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
}

/// Filter for a gallery listing. `"all"` means no category filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GalleryQuery {
    pub category: String,
    pub featured: bool,
}

impl GalleryQuery {
    pub fn new(category: impl Into<String>, featured: bool) -> Self {
        Self {
            category: category.into(),
            featured,
        }
    }

    pub fn featured() -> Self {
        Self::new("all", true)
    }

    /// Category to send to the server, `None` for the catch-all.
    pub fn category_filter(&self) -> Option<&str> {
        match self.category.as_str() {
            "" | "all" => None,
            other => Some(other),
        }
    }

    pub fn cache_key(&self) -> String {
        format!("gallery_{}_{}", self.category, self.featured)
    }
}

impl Default for GalleryQuery {
    fn default() -> Self {
        Self::new("all", false)
    }
}

/// Partial update of a gallery image from the admin area.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GalleryImageUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_carousel: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_deterministic() {
        let a = GalleryQuery::new("Prestasi", false);
        let b = GalleryQuery::new("Prestasi", false);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "gallery_Prestasi_false");
        assert_ne!(a.cache_key(), GalleryQuery::new("Prestasi", true).cache_key());
    }

    #[test]
    fn test_category_filter() {
        assert_eq!(GalleryQuery::featured().category_filter(), None);
        assert_eq!(GalleryQuery::new("", false).category_filter(), None);
        assert_eq!(GalleryQuery::new("Kegiatan", false).category_filter(), Some("Kegiatan"));
    }

    #[test]
    fn test_parse_camel_case_payload() {
        let json = r#"{"id": 3, "title": "Upacara", "imageUrl": "/uploads/images/gallery/a.jpg", "isFeatured": true}"#;
        let image: GalleryImage = serde_json::from_str(json).unwrap();
        assert_eq!(image.image_url.as_deref(), Some("/uploads/images/gallery/a.jpg"));
        assert!(image.is_featured);
        assert!(!image.is_carousel);
    }
}
