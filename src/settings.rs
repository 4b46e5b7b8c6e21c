use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TabStripSettings {
    pub min_tab_width: f64,
    pub max_tab_width: f64,
    /// Space kept for the new-tab and window action buttons.
    pub reserved_chrome: f64,
    /// Used when the host cannot measure the strip.
    pub fallback_tab_width: f64,
}

impl Default for TabStripSettings {
    fn default() -> Self {
        Self {
            min_tab_width: 100.0,
            max_tab_width: 240.0,
            reserved_chrome: 120.0,
            fallback_tab_width: 240.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShortcutSettings {
    pub next_tab: String,
    pub prev_tab: String,
    pub close_tab: String,
    pub new_tab: String,
    pub reopen_closed_tab: String,
}

impl Default for ShortcutSettings {
    fn default() -> Self {
        Self {
            next_tab: "CmdOrCtrl+Tab".to_string(),
            prev_tab: "CmdOrCtrl+Shift+Tab".to_string(),
            close_tab: "CmdOrCtrl+W".to_string(),
            new_tab: "CmdOrCtrl+T".to_string(),
            reopen_closed_tab: "CmdOrCtrl+Shift+T".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub tab_strip: TabStripSettings,
    /// How long to wait for the host to report its mounting points.
    pub ready_timeout_ms: u64,
    pub frame_sandbox: String,
    /// `{host}` is replaced with the url-encoded host of the tab address.
    pub favicon_service: String,
    /// When set, builtin views are fetched from this base instead of the embedded templates.
    pub content_base_url: Option<String>,
    pub max_closed_tabs: usize,
    pub shortcuts: ShortcutSettings,
    pub group_store_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tab_strip: TabStripSettings::default(),
            ready_timeout_ms: 2000,
            frame_sandbox: "allow-scripts allow-same-origin allow-forms".to_string(),
            favicon_service: "https://www.google.com/s2/favicons?domain={host}&sz=32".to_string(),
            content_base_url: None,
            max_closed_tabs: 25,
            shortcuts: ShortcutSettings::default(),
            group_store_path: None,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    log::warn!("[Settings] Failed to parse settings: {}, returning defaults", e);
                    Self::default()
                }),
                Err(e) => {
                    log::warn!("[Settings] Failed to read file: {}, returning defaults", e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, &json)
    }
}

/// Write to a sibling tmp file, then rename over the target so a crash never leaves half a file.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(tmp_path, path)?;
    Ok(())
}
