// Installable-app descriptor served as /manifest.json.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIcon {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Standalone,
    Fullscreen,
    #[serde(rename = "minimal-ui")]
    MinimalUi,
    Browser,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppManifest {
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub start_url: String,
    pub display: DisplayMode,
    pub background_color: String,
    pub theme_color: String,
    pub icons: Vec<ManifestIcon>,
}

impl Default for AppManifest {
    fn default() -> Self {
        let icon = |size: u32| ManifestIcon {
            src: format!("/icons/icon-{size}x{size}.png"),
            sizes: format!("{size}x{size}"),
            mime_type: "image/png".to_string(),
        };
        Self {
            name: "AddRemarks".to_string(),
            short_name: "AddRemarks".to_string(),
            description: "Upload CSV or Excel files and add remarks".to_string(),
            start_url: "/".to_string(),
            display: DisplayMode::Standalone,
            background_color: "#ffffff".to_string(),
            theme_color: "#12182b".to_string(),
            icons: vec![icon(192), icon(512)],
        }
    }
}

impl AppManifest {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
