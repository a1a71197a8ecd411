//! Component colour palette.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One colour slot, e.g. `navbar / background / primary = #1e3a8a`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ThemeSetting {
    pub component_name: String,
    pub element_name: String,
    pub color_type: String,
    pub color_value: String,
    #[serde(default = "default_active", deserialize_with = "flexible_bool")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Accepts `true`/`false`, `0`/`1` and `"0"`/`"1"`; SQL backends send ints.
fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => b,
        Raw::Int(i) => i != 0,
        Raw::Text(s) => matches!(s.as_str(), "1" | "true" | "TRUE" | "True"),
    })
}

impl ThemeSetting {
    /// CSS custom property name: `--color-{component}-{element}-{colorType}`.
    pub fn css_variable_name(&self) -> String {
        css_variable_name(&self.component_name, &self.element_name, &self.color_type)
    }
}

pub fn css_variable_name(component: &str, element: &str, color_type: &str) -> String {
    format!("--color-{}-{}-{}", component, element, color_type)
}

/// Settings grouped by component name.
pub type ThemeSettings = BTreeMap<String, Vec<ThemeSetting>>;

/// Group a flat list by component name, preserving server order inside a group.
pub fn group_by_component(settings: Vec<ThemeSetting>) -> ThemeSettings {
    let mut grouped = ThemeSettings::new();
    for setting in settings {
        grouped
            .entry(setting.component_name.clone())
            .or_default()
            .push(setting);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setting(component: &str, element: &str, active: bool) -> ThemeSetting {
        ThemeSetting {
            component_name: component.into(),
            element_name: element.into(),
            color_type: "background".into(),
            color_value: "#fff".into(),
            is_active: active,
        }
    }

    #[test]
    fn test_css_variable_name() {
        assert_eq!(
            setting("navbar", "link", true).css_variable_name(),
            "--color-navbar-link-background"
        );
    }

    #[test]
    fn test_group_by_component() {
        let grouped = group_by_component(vec![
            setting("navbar", "link", true),
            setting("footer", "text", true),
            setting("navbar", "brand", false),
        ]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["navbar"].len(), 2);
        assert_eq!(grouped["navbar"][1].element_name, "brand");
    }

    #[test]
    fn test_is_active_accepts_integers() {
        let json = r##"{"component_name":"hero","element_name":"title","color_type":"text","color_value":"#000","is_active":0}"##;
        let parsed: ThemeSetting = serde_json::from_str(json).unwrap();
        assert!(!parsed.is_active);

        let json = r##"{"component_name":"hero","element_name":"title","color_type":"text","color_value":"#000"}"##;
        let parsed: ThemeSetting = serde_json::from_str(json).unwrap();
        assert!(parsed.is_active);
    }
}
