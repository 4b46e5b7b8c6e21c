// Shared state structs to avoid circular dependencies.
// These are used by the store, the panel registry and the renderer, and can be tested independently.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Address sentinel for a tab that points nowhere yet.
pub const BLANK_ADDRESS: &str = "about:blank";
pub const DEFAULT_TITLE: &str = "New Tab";

/// Opaque tab identity. Generated ids are never reused within a store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TabId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Built-in views served from internal templates instead of a user address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinView {
    History,
    Settings,
    TabGroups,
}

impl BuiltinView {
    pub const ALL: [BuiltinView; 3] = [Self::History, Self::Settings, Self::TabGroups];

    /// Well-known id; opening the same view twice activates this tab.
    pub fn tab_id(self) -> TabId {
        TabId::new(match self {
            Self::History => "tab-history",
            Self::Settings => "tab-settings",
            Self::TabGroups => "tab-groups",
        })
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::History => "History",
            Self::Settings => "Settings",
            Self::TabGroups => "Tab Groups",
        }
    }

    /// Logical address stored on the tab.
    pub fn address(self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Settings => "settings",
            Self::TabGroups => "tabgroups",
        }
    }

    /// Template path relative to the content source root.
    pub fn source_path(self) -> &'static str {
        match self {
            Self::History => "history.html",
            Self::Settings => "settings.html",
            Self::TabGroups => "tabgroups.html",
        }
    }

    /// Host function to call once the template's scripts have run.
    pub fn init_hook(self) -> Option<&'static str> {
        match self {
            Self::TabGroups => Some("initializeTabGroups"),
            Self::History | Self::Settings => None,
        }
    }
}

impl fmt::Display for BuiltinView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.address())
    }
}

impl FromStr for BuiltinView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "history" => Ok(Self::History),
            "settings" => Ok(Self::Settings),
            "tabgroups" | "tab-groups" | "groups" => Ok(Self::TabGroups),
            other => Err(format!("unknown builtin view: {}", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentKind {
    /// Ordinary browsing context; content comes from the host.
    Generic,
    /// Sandboxed inline frame pointed at the tab address.
    EmbeddedFrame,
    Builtin { view: BuiltinView },
}

impl ContentKind {
    pub fn builtin_view(&self) -> Option<BuiltinView> {
        match self {
            Self::Builtin { view } => Some(*view),
            Self::Generic | Self::EmbeddedFrame => None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    pub title: String,
    pub address: String,
    pub icon: Option<String>,
    pub is_active: bool,
    pub is_special: bool,
    pub closable: bool,
    pub content_kind: ContentKind,
}

impl Tab {
    pub fn is_blank(&self) -> bool {
        is_blank_address(&self.address)
    }
}

pub fn is_blank_address(address: &str) -> bool {
    let trimmed = address.trim();
    trimmed.is_empty() || trimmed == BLANK_ADDRESS
}

/// Creation options for a tab. Absent values fall back to the blank address and `New Tab`.
#[derive(Clone, Debug)]
pub struct TabSpec {
    pub id: Option<TabId>,
    pub address: Option<String>,
    pub title: Option<String>,
    /// Title comes from an existing tab and is stored escaped already.
    pub title_escaped: bool,
    pub icon: Option<String>,
    pub closable: bool,
    pub content_kind: ContentKind,
}

impl Default for TabSpec {
    fn default() -> Self {
        Self {
            id: None,
            address: None,
            title: None,
            title_escaped: false,
            icon: None,
            closable: true,
            content_kind: ContentKind::Generic,
        }
    }
}

impl TabSpec {
    pub fn generic(address: Option<&str>, title: Option<&str>) -> Self {
        Self {
            address: address.map(str::to_string),
            title: title.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn frame(address: &str, title: Option<&str>) -> Self {
        Self {
            address: Some(address.to_string()),
            title: title.map(str::to_string),
            content_kind: ContentKind::EmbeddedFrame,
            ..Self::default()
        }
    }

    pub fn builtin(view: BuiltinView) -> Self {
        Self {
            id: Some(view.tab_id()),
            address: Some(view.address().to_string()),
            title: Some(view.title().to_string()),
            content_kind: ContentKind::Builtin { view },
            ..Self::default()
        }
    }
}

/// Immutable copy of a tab, detached from later edits to the live tab.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSnapshot {
    pub title: String,
    pub address: String,
    pub icon: Option<String>,
    pub closable: bool,
    pub content_kind: ContentKind,
}

impl From<&Tab> for TabSnapshot {
    fn from(tab: &Tab) -> Self {
        Self {
            title: tab.title.clone(),
            address: tab.address.clone(),
            icon: tab.icon.clone(),
            closable: tab.closable,
            content_kind: tab.content_kind.clone(),
        }
    }
}

impl TabSnapshot {
    /// Spec for a fresh live tab. Builtin views keep their well-known id.
    pub fn to_spec(&self) -> TabSpec {
        if let Some(view) = self.content_kind.builtin_view() {
            return TabSpec::builtin(view);
        }
        TabSpec {
            id: None,
            address: Some(self.address.clone()),
            title: Some(self.title.clone()),
            title_escaped: true,
            icon: self.icon.clone(),
            closable: self.closable,
            content_kind: self.content_kind.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedTab {
    pub snapshot: TabSnapshot,
    pub index: usize,
    pub closed_at: DateTime<Utc>,
}

impl ClosedTab {
    pub fn new(tab: &Tab, index: usize) -> Self {
        Self {
            snapshot: TabSnapshot::from(tab),
            index,
            closed_at: Utc::now(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabGroup {
    pub id: GroupId,
    pub name: String,
    pub tabs: Vec<TabSnapshot>,
    pub count: usize,
    pub created_at: DateTime<Utc>,
}

/// Host locations the manager binds to once the surface is mounted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountPoints {
    pub tab_strip: String,
    pub content: String,
}

impl Default for MountPoints {
    fn default() -> Self {
        Self {
            tab_strip: "#tab-bar".to_string(),
            content: "#private-browser-content".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("history", BuiltinView::History)]
    #[case("Settings", BuiltinView::Settings)]
    #[case("tabgroups", BuiltinView::TabGroups)]
    #[case("tab-groups", BuiltinView::TabGroups)]
    fn test_builtin_view_parsing(#[case] input: &str, #[case] expected: BuiltinView) {
        assert_eq!(input.parse::<BuiltinView>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_builtin_view() {
        assert!("bookmarks".parse::<BuiltinView>().is_err());
    }

    #[test]
    fn test_builtin_ids_are_fixed() {
        assert_eq!(BuiltinView::Settings.tab_id().as_str(), "tab-settings");
        assert_eq!(BuiltinView::History.tab_id().as_str(), "tab-history");
        assert_eq!(BuiltinView::TabGroups.tab_id().as_str(), "tab-groups");
    }

    #[rstest]
    #[case("", true)]
    #[case("  ", true)]
    #[case("about:blank", true)]
    #[case("https://a", false)]
    fn test_blank_address(#[case] address: &str, #[case] blank: bool) {
        assert_eq!(is_blank_address(address), blank);
    }

    #[test]
    fn test_builtin_snapshot_keeps_well_known_id() {
        let snapshot = TabSnapshot {
            title: "Settings".into(),
            address: "settings".into(),
            icon: None,
            closable: true,
            content_kind: ContentKind::Builtin { view: BuiltinView::Settings },
        };
        assert_eq!(snapshot.to_spec().id, Some(BuiltinView::Settings.tab_id()));
    }

    #[test]
    fn test_content_kind_serializes_tagged() {
        let json = serde_json::to_value(ContentKind::Builtin { view: BuiltinView::History }).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "builtin", "view": "history" }));
    }
}
