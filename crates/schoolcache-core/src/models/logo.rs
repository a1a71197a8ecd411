use serde::{Deserialize, Serialize};

/// The logo currently marked active on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LogoInfo {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, alias = "url", alias = "logoUrl", alias = "logo_url")]
    pub file_path: Option<String>,
    #[serde(default, alias = "isActive")]
    pub is_active: bool,
}

impl LogoInfo {
    pub fn url(&self) -> Option<&str> {
        self.file_path.as_deref().filter(|p| !p.trim().is_empty())
    }
}
