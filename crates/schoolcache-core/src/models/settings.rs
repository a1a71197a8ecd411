//! School-wide identity settings.

use serde::{Deserialize, Serialize};

/// School identity fields rendered in the header, footer and contact page.
///
/// Missing fields in a server response or durable snapshot fall back to the
/// built-in defaults, so a partial payload overlays rather than erases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(default, rename_all = "camelCase")]
pub struct SchoolSettings {
    pub school_name: String,
    pub short_name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub motto: String,
    pub description: String,
    pub logo_url: Option<String>,
    pub news_background_color: String,
    pub key_features: Vec<String>,
}

impl Default for SchoolSettings {
    fn default() -> Self {
        Self {
            school_name: "SMA Negeri 1 Jakarta".to_string(),
            short_name: "SMAN 1 Jakarta".to_string(),
            address: "Jl. Budi Utomo No.7, Jakarta Pusat".to_string(),
            phone: "(021) 3865001".to_string(),
            email: "info@sman1jakarta.sch.id".to_string(),
            website: "https://sman1jakarta.sch.id".to_string(),
            motto: "Unggul dalam Prestasi, Santun dalam Pekerti".to_string(),
            description: "Sekolah menengah atas negeri di Jakarta Pusat.".to_string(),
            logo_url: None,
            news_background_color: "#1e40af".to_string(),
            key_features: vec![
                "Akreditasi A".to_string(),
                "Ekstrakurikuler Beragam".to_string(),
                "Fasilitas Lengkap".to_string(),
            ],
        }
    }
}

impl SchoolSettings {
    /// Page title used for the browser tab / document head.
    pub fn page_title(&self) -> String {
        if self.motto.is_empty() {
            self.school_name.clone()
        } else {
            format!("{} - {}", self.school_name, self.motto)
        }
    }
}

/// Partial update applied on top of the current settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news_background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_features: Option<Vec<String>>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge every present field into `settings`.
    pub fn apply_to(&self, settings: &mut SchoolSettings) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        set(&mut settings.school_name, &self.school_name);
        set(&mut settings.short_name, &self.short_name);
        set(&mut settings.address, &self.address);
        set(&mut settings.phone, &self.phone);
        set(&mut settings.email, &self.email);
        set(&mut settings.website, &self.website);
        set(&mut settings.motto, &self.motto);
        set(&mut settings.description, &self.description);
        set(&mut settings.news_background_color, &self.news_background_color);
        set(&mut settings.key_features, &self.key_features);
        if let Some(ref url) = self.logo_url {
            settings.logo_url = Some(url.clone());
        }
    }
}
