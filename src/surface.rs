// Host rendering surface: the two mounting points (tab strip, content container)
// the manager draws into. Real hosts (the desktop webview) and the in-memory
// recorder used by tests and the headless driver both implement `HostSurface`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::modules::tab_strip::TabStrip;
use crate::state::TabId;

/// Container id derived from the owning tab, one per tab.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelId(String);

impl PanelId {
    pub fn for_tab(tab_id: &TabId) -> Self {
        Self(format!("panel-{}", tab_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a panel shows once loaded.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelContent {
    /// Builtin view markup. Embedded scripts run after insertion, then the init hook if any.
    #[serde(rename_all = "camelCase")]
    Markup {
        html: String,
        run_scripts: bool,
        init_hook: Option<String>,
    },
    Frame {
        src: String,
        title: String,
        sandbox: String,
    },
    /// Third-party document fetched for an address, shown only through `srcdoc`.
    Document {
        address: String,
        html: String,
        sandbox: String,
    },
    Placeholder {
        title: String,
        address: String,
    },
    Error {
        address: String,
        reason: String,
    },
}

impl PanelContent {
    /// Markup for hosts that take raw HTML. Titles are stored escaped already.
    pub fn to_html(&self) -> String {
        match self {
            Self::Markup { html, .. } => html.clone(),
            Self::Frame { src, title, sandbox } => format!(
                r#"<iframe src="{}" class="w-full h-full border-0" title="{}" sandbox="{}"></iframe>"#,
                v_htmlescape::escape(src),
                title,
                v_htmlescape::escape(sandbox)
            ),
            Self::Document { address, html, sandbox } => format!(
                r#"<iframe srcdoc="{}" class="w-full h-full border-0" title="{}" sandbox="{}"></iframe>"#,
                v_htmlescape::escape(html),
                v_htmlescape::escape(address),
                v_htmlescape::escape(sandbox)
            ),
            Self::Placeholder { title, address } => format!(
                r#"<div class="flex items-center justify-center h-full text-zinc-400"><div class="text-center"><div class="text-6xl mb-4">🌐</div><div class="text-lg">{}</div><div class="text-sm mt-2">{}</div></div></div>"#,
                title,
                v_htmlescape::escape(address)
            ),
            Self::Error { address, reason } => format!(
                r#"<div class="flex items-center justify-center h-full text-red-400"><div class="text-center"><div class="text-6xl mb-4">⚠️</div><div class="text-lg">Failed to load content</div><div class="text-sm mt-2">{}</div><div class="text-xs mt-1">{}</div></div></div>"#,
                v_htmlescape::escape(address),
                v_htmlescape::escape(reason)
            ),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Everything the manager needs from the host. Calls arrive in mutation order.
pub trait HostSurface: Send {
    /// Measured width of the tab strip container, if the host can measure it.
    fn available_strip_width(&self) -> Option<f64>;

    fn render_strip(&mut self, strip: &TabStrip);

    /// Create a hidden, empty container.
    fn mount_panel(&mut self, panel: &PanelId);

    fn fill_panel(&mut self, panel: &PanelId, content: &PanelContent);

    fn set_panel_visible(&mut self, panel: &PanelId, visible: bool);

    fn unmount_panel(&mut self, panel: &PanelId);
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryPanel {
    pub content: Option<PanelContent>,
    pub visible: bool,
    pub fills: usize,
}

impl MemoryPanel {
    pub fn html(&self) -> Option<String> {
        self.content.as_ref().map(PanelContent::to_html)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    width: Option<f64>,
    strip: Option<TabStrip>,
    strip_renders: usize,
    panels: HashMap<PanelId, MemoryPanel>,
}

/// Recording surface. Clones share the same state, so a probe kept by the
/// caller observes what the manager drew.
#[derive(Clone, Debug, Default)]
pub struct MemorySurface {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySurface {
    pub fn new(width: Option<f64>) -> Self {
        let surface = Self::default();
        surface.state.lock().width = width;
        surface
    }

    pub fn set_width(&self, width: Option<f64>) {
        self.state.lock().width = width;
    }

    pub fn strip(&self) -> Option<TabStrip> {
        self.state.lock().strip.clone()
    }

    pub fn strip_renders(&self) -> usize {
        self.state.lock().strip_renders
    }

    pub fn panel(&self, panel: &PanelId) -> Option<MemoryPanel> {
        self.state.lock().panels.get(panel).cloned()
    }

    pub fn panel_count(&self) -> usize {
        self.state.lock().panels.len()
    }

    pub fn visible_panels(&self) -> Vec<PanelId> {
        let state = self.state.lock();
        let mut visible: Vec<PanelId> = state
            .panels
            .iter()
            .filter(|(_, p)| p.visible)
            .map(|(id, _)| id.clone())
            .collect();
        visible.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        visible
    }
}

impl HostSurface for MemorySurface {
    fn available_strip_width(&self) -> Option<f64> {
        self.state.lock().width
    }

    fn render_strip(&mut self, strip: &TabStrip) {
        let mut state = self.state.lock();
        state.strip = Some(strip.clone());
        state.strip_renders += 1;
    }

    fn mount_panel(&mut self, panel: &PanelId) {
        self.state.lock().panels.entry(panel.clone()).or_default();
    }

    fn fill_panel(&mut self, panel: &PanelId, content: &PanelContent) {
        match self.state.lock().panels.get_mut(panel) {
            Some(p) => {
                p.content = Some(content.clone());
                p.fills += 1;
            }
            None => log::debug!("[Surface] fill for unmounted panel {}", panel),
        }
    }

    fn set_panel_visible(&mut self, panel: &PanelId, visible: bool) {
        if let Some(p) = self.state.lock().panels.get_mut(panel) {
            p.visible = visible;
        }
    }

    fn unmount_panel(&mut self, panel: &PanelId) {
        self.state.lock().panels.remove(panel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_id_derives_from_tab() {
        assert_eq!(PanelId::for_tab(&TabId::new("tab-3")).as_str(), "panel-tab-3");
    }

    #[test]
    fn test_error_markup_contains_escaped_address() {
        let content = PanelContent::Error {
            address: "https://bad/?a=<b>".into(),
            reason: "Not Found".into(),
        };
        let html = content.to_html();
        assert!(html.contains("&lt;b&gt;"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("Failed to load content"));
        assert!(content.is_error());
    }

    #[test]
    fn test_frame_markup_is_sandboxed() {
        let content = PanelContent::Frame {
            src: "https://a".into(),
            title: "A".into(),
            sandbox: "allow-scripts".into(),
        };
        let html = content.to_html();
        assert!(html.starts_with("<iframe"));
        assert!(html.contains(r#"sandbox="allow-scripts""#));
    }

    #[test]
    fn test_document_markup_never_inlines_the_page() {
        let content = PanelContent::Document {
            address: "https://a".into(),
            html: r#"<img src=x onerror="alert(1)">"#.into(),
            sandbox: "allow-scripts".into(),
        };
        let html = content.to_html();
        assert!(html.starts_with("<iframe srcdoc="));
        assert!(!html.contains("<img"));
        assert!(!html.contains(r#"onerror="alert"#));
        assert!(html.contains("&lt;img"));
        assert!(html.contains(r#"sandbox="allow-scripts""#));
    }

    #[test]
    fn test_memory_surface_clones_share_state() {
        let surface = MemorySurface::new(Some(800.0));
        let mut host = surface.clone();
        let panel = PanelId::for_tab(&TabId::new("tab-1"));

        host.mount_panel(&panel);
        host.fill_panel(&panel, &PanelContent::Placeholder { title: "New Tab".into(), address: "about:blank".into() });
        host.set_panel_visible(&panel, true);

        let recorded = surface.panel(&panel).unwrap();
        assert!(recorded.visible);
        assert_eq!(recorded.fills, 1);
        assert_eq!(surface.visible_panels(), vec![panel.clone()]);

        host.unmount_panel(&panel);
        assert_eq!(surface.panel_count(), 0);
    }

    #[test]
    fn test_fill_after_unmount_is_ignored() {
        let surface = MemorySurface::new(None);
        let mut host = surface.clone();
        let panel = PanelId::for_tab(&TabId::new("tab-9"));
        host.fill_panel(&panel, &PanelContent::Error { address: "x".into(), reason: "y".into() });
        assert!(surface.panel(&panel).is_none());
    }
}
