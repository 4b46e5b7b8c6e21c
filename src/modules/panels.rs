// Panel registry - one lazily loaded content container per tab.
// Load state is three-valued so a second activation during a fetch never starts another one.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{LoadError, ShellError};
use crate::modules::content::ContentSource;
use crate::state::{ContentKind, Tab, TabId};
use crate::surface::{HostSurface, PanelContent, PanelId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadState {
    Unloaded,
    Loading,
    /// Terminal for this panel instance, including failed loads.
    Loaded,
}

#[derive(Clone, Debug)]
pub struct ContentPanel {
    pub id: PanelId,
    pub state: LoadState,
    pub visible: bool,
    serial: u64,
}

/// An outstanding fetch. Completing it against a released or replaced panel is a no-op.
#[derive(Clone, Debug)]
pub struct LoadTicket {
    pub tab_id: TabId,
    pub panel_id: PanelId,
    pub source: ContentSource,
    serial: u64,
}

enum LoadPlan {
    Immediate(PanelContent),
    Fetch(ContentSource),
}

/// Frame sandbox minus `allow-same-origin`. A `srcdoc` frame would otherwise
/// share the shell's origin and reach its IPC bridge.
fn document_sandbox(frame_sandbox: &str) -> String {
    frame_sandbox
        .split_whitespace()
        .filter(|token| !token.eq_ignore_ascii_case("allow-same-origin"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct PanelRegistry {
    panels: HashMap<TabId, ContentPanel>,
    next_serial: u64,
    frame_sandbox: String,
}

impl PanelRegistry {
    pub fn new(frame_sandbox: impl Into<String>) -> Self {
        Self {
            panels: HashMap::new(),
            next_serial: 1,
            frame_sandbox: frame_sandbox.into(),
        }
    }

    pub fn set_frame_sandbox(&mut self, frame_sandbox: impl Into<String>) {
        self.frame_sandbox = frame_sandbox.into();
    }

    /// Idempotent. Returns true when a container was created.
    pub fn ensure_panel(&mut self, tab_id: &TabId, surface: &mut dyn HostSurface) -> bool {
        if self.panels.contains_key(tab_id) {
            return false;
        }
        let id = PanelId::for_tab(tab_id);
        surface.mount_panel(&id);
        self.panels.insert(
            tab_id.clone(),
            ContentPanel {
                id,
                state: LoadState::Unloaded,
                visible: false,
                serial: 0,
            },
        );
        true
    }

    pub fn release_panel(&mut self, tab_id: &TabId, surface: &mut dyn HostSurface) -> bool {
        match self.panels.remove(tab_id) {
            Some(panel) => {
                surface.unmount_panel(&panel.id);
                log::debug!("[Panels] Released {}", panel.id);
                true
            }
            None => false,
        }
    }

    /// Starts loading the tab's panel unless it is loading or loaded already.
    /// Static content is filled immediately; fetches come back as a ticket for the caller to run.
    pub fn load(&mut self, tab: &Tab, surface: &mut dyn HostSurface) -> Option<LoadTicket> {
        self.ensure_panel(&tab.id, surface);

        let plan = self.plan(tab);
        let serial = self.next_serial;
        let panel = self.panels.get_mut(&tab.id)?;
        if panel.state != LoadState::Unloaded {
            return None;
        }

        match plan {
            LoadPlan::Immediate(content) => {
                surface.fill_panel(&panel.id, &content);
                panel.state = LoadState::Loaded;
                log::info!("[Panels] Loaded content for tab: {}", tab.id);
                None
            }
            LoadPlan::Fetch(source) => {
                self.next_serial += 1;
                panel.state = LoadState::Loading;
                panel.serial = serial;
                Some(LoadTicket {
                    tab_id: tab.id.clone(),
                    panel_id: panel.id.clone(),
                    source,
                    serial,
                })
            }
        }
    }

    fn plan(&self, tab: &Tab) -> LoadPlan {
        match &tab.content_kind {
            ContentKind::Builtin { view } => LoadPlan::Fetch(ContentSource::View(*view)),
            ContentKind::EmbeddedFrame => LoadPlan::Immediate(PanelContent::Frame {
                src: tab.address.clone(),
                title: tab.title.clone(),
                sandbox: self.frame_sandbox.clone(),
            }),
            ContentKind::Generic if tab.is_blank() => LoadPlan::Immediate(PanelContent::Placeholder {
                title: tab.title.clone(),
                address: tab.address.clone(),
            }),
            ContentKind::Generic => LoadPlan::Fetch(ContentSource::Address(tab.address.clone())),
        }
    }

    /// Settles a fetch. Failures render an error placeholder and still count as loaded.
    /// Returns false when the result was discarded.
    pub fn complete(
        &mut self,
        ticket: LoadTicket,
        result: Result<String, LoadError>,
        surface: &mut dyn HostSurface,
    ) -> bool {
        let Some(panel) = self.panels.get_mut(&ticket.tab_id) else {
            log::debug!("[Panels] Discarding load for released panel {}", ticket.panel_id);
            return false;
        };
        if panel.serial != ticket.serial || panel.state != LoadState::Loading {
            log::debug!("[Panels] Discarding stale load for {}", ticket.panel_id);
            return false;
        }

        let content = match result {
            Ok(html) => match ticket.source {
                ContentSource::View(view) => PanelContent::Markup {
                    html,
                    run_scripts: true,
                    init_hook: view.init_hook().map(str::to_string),
                },
                ContentSource::Address(address) => PanelContent::Document {
                    address,
                    html,
                    sandbox: document_sandbox(&self.frame_sandbox),
                },
            },
            Err(e) => {
                let reason = e.to_string();
                let failure = ShellError::ContentLoad {
                    address: ticket.source.address().to_string(),
                    source: e,
                };
                log::warn!("[Panels] Tab {}: {}", ticket.tab_id, failure);
                PanelContent::Error {
                    address: ticket.source.address().to_string(),
                    reason,
                }
            }
        };

        surface.fill_panel(&panel.id, &content);
        panel.state = LoadState::Loaded;
        log::info!("[Panels] Loaded content for tab: {}", ticket.tab_id);
        true
    }

    /// Shows the active tab's panel and hides the rest. Hidden panels stay mounted.
    pub fn show_only(&mut self, active: &TabId, surface: &mut dyn HostSurface) {
        for (tab_id, panel) in self.panels.iter_mut() {
            let visible = tab_id == active;
            if panel.visible != visible {
                surface.set_panel_visible(&panel.id, visible);
                panel.visible = visible;
            }
        }
    }

    pub fn state(&self, tab_id: &TabId) -> Option<LoadState> {
        self.panels.get(tab_id).map(|p| p.state)
    }

    pub fn panel(&self, tab_id: &TabId) -> Option<&ContentPanel> {
        self.panels.get(tab_id)
    }

    pub fn contains(&self, tab_id: &TabId) -> bool {
        self.panels.contains_key(tab_id)
    }

    pub fn visible_count(&self) -> usize {
        self.panels.values().filter(|p| p.visible).count()
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }
}
