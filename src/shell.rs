// Tab shell - sequences tab store mutations with panel upkeep and strip renders.
// Every mutation ends with the active panel shown (and loaded if needed) and a
// fresh strip projection. Fetches are queued as tickets for the caller to run.

use crate::error::{LoadError, Result, ShellError};
use crate::modules::closed_tabs::ClosedTabs;
use crate::modules::panels::{LoadState, LoadTicket, PanelRegistry};
use crate::modules::tab_strip::{self, TabStrip};
use crate::modules::tabs::TabStore;
use crate::settings::{Settings, TabStripSettings};
use crate::state::{BuiltinView, Tab, TabId, TabSpec};
use crate::surface::HostSurface;

pub struct TabShell {
    store: TabStore,
    panels: PanelRegistry,
    closed: ClosedTabs,
    surface: Box<dyn HostSurface>,
    metrics: TabStripSettings,
    pending: Vec<LoadTicket>,
}

impl TabShell {
    pub fn new(settings: &Settings, surface: Box<dyn HostSurface>) -> Self {
        Self {
            store: TabStore::new(settings.favicon_service.clone()),
            panels: PanelRegistry::new(settings.frame_sandbox.clone()),
            closed: ClosedTabs::new(settings.max_closed_tabs),
            surface,
            metrics: settings.tab_strip.clone(),
            pending: Vec::new(),
        }
    }

    /// Creates the default tab when the store is empty. Returns whether one was created.
    pub fn ensure_default_tab(&mut self) -> bool {
        if !self.store.is_empty() {
            self.render();
            return false;
        }
        self.create_tab(None, None);
        true
    }

    pub fn create_tab(&mut self, address: Option<&str>, title: Option<&str>) -> TabId {
        self.open(TabSpec::generic(address, title))
    }

    /// Creates (or, for a known fixed id, re-activates) a tab and makes it current.
    pub fn open(&mut self, spec: TabSpec) -> TabId {
        let (id, _) = self.store.create(spec);
        self.panels.ensure_panel(&id, self.surface.as_mut());
        self.refresh();
        id
    }

    pub fn open_builtin(&mut self, view: BuiltinView) -> TabId {
        self.open(TabSpec::builtin(view))
    }

    /// Removes the tab and its panel in one step, archiving the tab for reopening.
    pub fn close(&mut self, id: &TabId) -> Result<()> {
        let outcome = self.store.close(id)?;
        self.panels.release_panel(id, self.surface.as_mut());
        self.closed.archive(&outcome.tab, outcome.index);
        self.refresh();
        Ok(())
    }

    /// Closes the active tab unless it is pinned. Returns the closed id.
    pub fn close_active(&mut self) -> Result<Option<TabId>> {
        let Some(active) = self.store.active() else {
            return Ok(None);
        };
        if !active.closable {
            log::info!("[Tabs] Active tab {} is not closable", active.id);
            return Ok(None);
        }
        let id = active.id.clone();
        self.close(&id)?;
        Ok(Some(id))
    }

    pub fn activate(&mut self, id: &TabId) -> Result<()> {
        self.store.activate(id)?;
        self.refresh();
        Ok(())
    }

    pub fn activate_next(&mut self) -> Option<TabId> {
        let id = self.store.activate_next();
        self.refresh();
        id
    }

    pub fn activate_prev(&mut self) -> Option<TabId> {
        let id = self.store.activate_prev();
        self.refresh();
        id
    }

    pub fn update_title(&mut self, id: &TabId, title: &str) -> Result<()> {
        self.store.update_title(id, title)?;
        self.render();
        Ok(())
    }

    /// Re-targets the tab. A loaded panel keeps its content; loads happen once per panel.
    pub fn update_address(&mut self, id: &TabId, address: &str) -> Result<()> {
        self.store.update_address(id, address)?;
        self.render();
        Ok(())
    }

    pub fn reorder(&mut self, new_order: &[TabId]) -> bool {
        let changed = self.store.reorder(new_order);
        if changed {
            self.render();
        }
        changed
    }

    /// Restores the most recently closed tab at its former position.
    pub fn reopen_closed(&mut self) -> Option<TabId> {
        let entry = self.closed.pop()?;
        let (id, created) = self.store.create(entry.snapshot.to_spec());
        if created {
            if let Err(e) = self.store.move_to(&id, entry.index) {
                log::warn!("[ClosedTabs] Could not restore position of {}: {}", id, e);
            }
        }
        self.panels.ensure_panel(&id, self.surface.as_mut());
        self.refresh();
        Some(id)
    }

    /// Swaps every live tab for fresh ones built from `specs`. Old panels are released.
    pub fn replace_tabs(&mut self, specs: Vec<TabSpec>) -> Vec<TabId> {
        let (removed, created) = self.store.replace_all(specs);
        for tab in &removed {
            self.panels.release_panel(&tab.id, self.surface.as_mut());
        }
        for id in &created {
            self.panels.ensure_panel(id, self.surface.as_mut());
        }
        self.refresh();
        created
    }

    /// Applies a finished fetch. False when the panel is gone or the ticket is stale.
    pub fn finish_load(&mut self, ticket: LoadTicket, result: std::result::Result<String, LoadError>) -> bool {
        self.panels.complete(ticket, result, self.surface.as_mut())
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.store.set_favicon_service(settings.favicon_service.clone());
        self.panels.set_frame_sandbox(settings.frame_sandbox.clone());
        self.closed.set_capacity(settings.max_closed_tabs);
        self.metrics = settings.tab_strip.clone();
    }

    /// Fetches queued since the last call.
    pub fn take_pending(&mut self) -> Vec<LoadTicket> {
        std::mem::take(&mut self.pending)
    }

    fn refresh(&mut self) {
        if let Some(active) = self.store.active().cloned() {
            if let Some(ticket) = self.panels.load(&active, self.surface.as_mut()) {
                self.pending.push(ticket);
            }
            self.panels.show_only(&active.id, self.surface.as_mut());
        }
        self.render();
    }

    pub fn render(&mut self) -> TabStrip {
        let strip = tab_strip::project(
            self.store.tabs(),
            self.surface.available_strip_width(),
            &self.metrics,
        );
        self.surface.render_strip(&strip);
        strip
    }

    pub fn tabs(&self) -> Vec<Tab> {
        self.store.snapshot()
    }

    pub fn tab(&self, id: &TabId) -> Result<&Tab> {
        self.store
            .get(id)
            .ok_or_else(|| ShellError::UnknownTabId(id.clone()))
    }

    pub fn active(&self) -> Option<&Tab> {
        self.store.active()
    }

    pub fn load_state(&self, id: &TabId) -> Option<LoadState> {
        self.panels.state(id)
    }

    pub fn has_panel(&self, id: &TabId) -> bool {
        self.panels.contains(id)
    }

    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }

    pub fn closed_count(&self) -> usize {
        self.closed.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
