// Lifecycle coordinator - binds the tab shell to a host surface once the host
// reports its mounting points, then serves the command surface.
//
// Phases: Searching -> Ready, or Searching -> Failed (permanent). Commands are
// rejected with NotInitialized outside Ready. Content fetches run as tokio tasks
// and are applied under the shell lock when they settle.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{Result, ShellError};
use crate::modules::content::ContentLoader;
use crate::modules::groups::GroupStore;
use crate::modules::panels::{LoadState, LoadTicket};
use crate::modules::shortcuts::{KeyStroke, Keymap, ShellCommand};
use crate::modules::tab_strip::TabStrip;
use crate::settings::Settings;
use crate::shell::TabShell;
use crate::state::{BuiltinView, GroupId, MountPoints, Tab, TabGroup, TabId, TabSnapshot, TabSpec};
use crate::surface::HostSurface;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Searching,
    Ready,
    Failed,
}

/// Host side of the readiness handshake.
#[derive(Debug)]
pub struct ReadySignal(oneshot::Sender<MountPoints>);

impl ReadySignal {
    /// Reports the mounting points. False if the coordinator stopped waiting.
    pub fn ready(self, mounts: MountPoints) -> bool {
        self.0.send(mounts).is_ok()
    }
}

/// Coordinator side of the readiness handshake, consumed by `initialize`.
#[derive(Debug)]
pub struct HostReady(oneshot::Receiver<MountPoints>);

pub fn readiness() -> (ReadySignal, HostReady) {
    let (tx, rx) = oneshot::channel();
    (ReadySignal(tx), HostReady(rx))
}

struct Lifecycle {
    phase: Phase,
    mounts: Option<MountPoints>,
    runtime: Option<Handle>,
}

struct Inner {
    lifecycle: Mutex<Lifecycle>,
    shell: Mutex<TabShell>,
    loader: Arc<dyn ContentLoader>,
    settings: ArcSwap<Settings>,
    keymap: ArcSwap<Keymap>,
    groups: Mutex<GroupStore>,
    inflight: Mutex<Vec<JoinHandle<()>>>,
}

/// Cheap to clone; clones share the same tabs and panels.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    pub fn new(settings: Settings, loader: Arc<dyn ContentLoader>, surface: Box<dyn HostSurface>) -> Self {
        let groups = match settings.group_store_path.as_deref() {
            Some(path) => GroupStore::load(path),
            None => GroupStore::in_memory(),
        };
        Self {
            inner: Arc::new(Inner {
                lifecycle: Mutex::new(Lifecycle {
                    phase: Phase::Searching,
                    mounts: None,
                    runtime: None,
                }),
                shell: Mutex::new(TabShell::new(&settings, surface)),
                loader,
                keymap: ArcSwap::from_pointee(Keymap::from_settings(&settings.shortcuts)),
                settings: ArcSwap::from_pointee(settings),
                groups: Mutex::new(groups),
                inflight: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Waits for the host to report its mounting points, bounded by `ready_timeout_ms`.
    /// On success the default tab is created if the store is empty and the strip is drawn.
    pub async fn initialize(&self, host: HostReady) -> Result<()> {
        if self.phase() == Phase::Failed {
            log::error!("[Lifecycle] Initialization already failed; staying inert");
            return Err(ShellError::NotInitialized);
        }

        let waited = Duration::from_millis(self.inner.settings.load().ready_timeout_ms);
        log::info!("[Lifecycle] Waiting up to {}ms for host mounting points", waited.as_millis());

        let mounts = match tokio::time::timeout(waited, host.0).await {
            Ok(Ok(mounts)) => mounts,
            Ok(Err(_)) | Err(_) => {
                let err = ShellError::MountingSurfaceMissing { waited };
                let mut lifecycle = self.inner.lifecycle.lock();
                if lifecycle.phase == Phase::Searching {
                    lifecycle.phase = Phase::Failed;
                    log::error!("[Lifecycle] {}", err);
                } else {
                    log::error!("[Lifecycle] {}; keeping the current host", err);
                }
                return Err(err);
            }
        };

        let runtime = Handle::current();
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            lifecycle.phase = Phase::Ready;
            lifecycle.mounts = Some(mounts.clone());
            lifecycle.runtime = Some(runtime.clone());
        }

        let tickets = {
            let mut shell = self.inner.shell.lock();
            shell.ensure_default_tab();
            shell.take_pending()
        };
        self.spawn_loads(&runtime, tickets);

        log::info!(
            "[Lifecycle] Ready (tab strip: {}, content: {})",
            mounts.tab_strip,
            mounts.content
        );
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.inner.lifecycle.lock().phase
    }

    pub fn mount_points(&self) -> Option<MountPoints> {
        self.inner.lifecycle.lock().mounts.clone()
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.inner.settings.load_full()
    }

    /// Runs a shell mutation if Ready, then starts any fetches it queued.
    fn run<T>(&self, command: &str, op: impl FnOnce(&mut TabShell) -> Result<T>) -> Result<T> {
        let runtime = {
            let lifecycle = self.inner.lifecycle.lock();
            match (&lifecycle.phase, &lifecycle.runtime) {
                (Phase::Ready, Some(runtime)) => runtime.clone(),
                _ => {
                    let err = ShellError::NotInitialized;
                    report(command, &err);
                    return Err(err);
                }
            }
        };

        let (result, tickets) = {
            let mut shell = self.inner.shell.lock();
            let result = op(&mut *shell);
            (result, shell.take_pending())
        };
        self.spawn_loads(&runtime, tickets);

        if let Err(e) = &result {
            report(command, e);
        }
        result
    }

    fn spawn_loads(&self, runtime: &Handle, tickets: Vec<LoadTicket>) {
        if tickets.is_empty() {
            return;
        }
        let mut inflight = self.inner.inflight.lock();
        inflight.retain(|handle| !handle.is_finished());

        for ticket in tickets {
            let inner = Arc::clone(&self.inner);
            log::debug!("[Panels] Fetching {} for {}", ticket.source.address(), ticket.tab_id);
            inflight.push(runtime.spawn(async move {
                let result = inner.loader.fetch(&ticket.source).await;
                inner.shell.lock().finish_load(ticket, result);
            }));
        }
    }

    /// Waits for every in-flight content fetch to be applied or discarded.
    pub async fn settle(&self) {
        loop {
            let handles = std::mem::take(&mut *self.inner.inflight.lock());
            if handles.is_empty() {
                break;
            }
            for outcome in join_all(handles).await {
                if let Err(e) = outcome {
                    log::warn!("[Panels] Load task ended abnormally: {}", e);
                }
            }
        }
    }

    pub fn create_tab(&self, address: Option<&str>, title: Option<&str>) -> Result<TabId> {
        self.run("create_tab", |shell| Ok(shell.create_tab(address, title)))
    }

    pub fn open_tab(&self, spec: TabSpec) -> Result<TabId> {
        self.run("open_tab", |shell| Ok(shell.open(spec)))
    }

    pub fn close_tab(&self, id: &TabId) -> Result<()> {
        self.run("close_tab", |shell| shell.close(id))
    }

    pub fn close_active_tab(&self) -> Result<Option<TabId>> {
        self.run("close_active_tab", |shell| shell.close_active())
    }

    pub fn activate_tab(&self, id: &TabId) -> Result<()> {
        self.run("activate_tab", |shell| shell.activate(id))
    }

    pub fn next_tab(&self) -> Result<Option<TabId>> {
        self.run("next_tab", |shell| Ok(shell.activate_next()))
    }

    pub fn prev_tab(&self) -> Result<Option<TabId>> {
        self.run("prev_tab", |shell| Ok(shell.activate_prev()))
    }

    /// Idempotent by the view's fixed id: a second request re-activates the first tab.
    pub fn open_builtin_view(&self, view: BuiltinView) -> Result<TabId> {
        self.run("open_builtin_view", |shell| Ok(shell.open_builtin(view)))
    }

    pub fn update_tab_title(&self, id: &TabId, title: &str) -> Result<()> {
        self.run("update_tab_title", |shell| shell.update_title(id, title))
    }

    pub fn update_tab_address(&self, id: &TabId, address: &str) -> Result<()> {
        self.run("update_tab_address", |shell| shell.update_address(id, address))
    }

    pub fn reorder_tabs(&self, new_order: &[TabId]) -> Result<bool> {
        self.run("reorder_tabs", |shell| Ok(shell.reorder(new_order)))
    }

    pub fn reopen_closed_tab(&self) -> Result<Option<TabId>> {
        self.run("reopen_closed_tab", |shell| Ok(shell.reopen_closed()))
    }

    /// Dispatches a key event through the keymap. Returns the command it triggered.
    pub fn handle_key(&self, stroke: &KeyStroke) -> Result<Option<ShellCommand>> {
        let Some(command) = self.inner.keymap.load().lookup(stroke) else {
            return Ok(None);
        };
        self.run_command(command)?;
        Ok(Some(command))
    }

    pub fn run_command(&self, command: ShellCommand) -> Result<()> {
        match command {
            ShellCommand::NextTab => self.next_tab().map(drop),
            ShellCommand::PrevTab => self.prev_tab().map(drop),
            ShellCommand::CloseActiveTab => self.close_active_tab().map(drop),
            ShellCommand::NewTab => self.create_tab(None, None).map(drop),
            ShellCommand::ReopenClosedTab => self.reopen_closed_tab().map(drop),
        }
    }

    /// Snapshots the live tabs into a new named group.
    pub fn create_tab_group(&self, name: &str) -> Result<GroupId> {
        let tabs = self.run("create_tab_group", |shell| Ok(shell.tabs()))?;
        self.inner
            .groups
            .lock()
            .create(name, &tabs)
            .inspect_err(|e| report("create_tab_group", e))
    }

    /// Replaces the live tabs with fresh ones built from the group's snapshots.
    pub fn open_tab_group(&self, id: GroupId) -> Result<Vec<TabId>> {
        let specs = {
            let groups = self.inner.groups.lock();
            match groups.get(id) {
                Some(group) => group.tabs.iter().map(TabSnapshot::to_spec).collect::<Vec<_>>(),
                None => {
                    let err = ShellError::UnknownGroup(id);
                    report("open_tab_group", &err);
                    return Err(err);
                }
            }
        };
        log::info!("[Groups] Opening group {} ({} tabs)", id, specs.len());
        self.run("open_tab_group", |shell| Ok(shell.replace_tabs(specs)))
    }

    pub fn groups(&self) -> Vec<TabGroup> {
        self.inner.groups.lock().groups().to_vec()
    }

    pub fn filter_group_tabs(&self, query: &str) -> Vec<TabSnapshot> {
        self.inner.groups.lock().filter_tabs(query)
    }

    /// Swaps settings at runtime. Strip metrics and shortcuts take effect immediately.
    pub fn apply_settings(&self, settings: Settings) {
        self.inner.keymap.store(Arc::new(Keymap::from_settings(&settings.shortcuts)));
        {
            let mut shell = self.inner.shell.lock();
            shell.apply_settings(&settings);
            if self.phase() == Phase::Ready {
                shell.render();
            }
        }
        self.inner.settings.store(Arc::new(settings));
        log::info!("[Lifecycle] Settings applied");
    }

    /// Re-projects the strip, e.g. after the host resized it.
    pub fn render_strip(&self) -> Result<TabStrip> {
        self.run("render_strip", |shell| Ok(shell.render()))
    }

    /// Ordered copy of the live tabs.
    pub fn tabs(&self) -> Vec<Tab> {
        self.inner.shell.lock().tabs()
    }

    pub fn active_tab(&self) -> Option<Tab> {
        self.inner.shell.lock().active().cloned()
    }

    pub fn load_state(&self, id: &TabId) -> Option<LoadState> {
        self.inner.shell.lock().load_state(id)
    }

    pub fn has_panel(&self, id: &TabId) -> bool {
        self.inner.shell.lock().has_panel(id)
    }
}

fn report(command: &str, err: &ShellError) {
    match err {
        ShellError::NotInitialized | ShellError::MountingSurfaceMissing { .. } => {
            log::error!("[Lifecycle] {} rejected: {}", command, err)
        }
        ShellError::UnknownTabId(id) => log::warn!("[Tabs] {}: unknown tab id {}", command, id),
        _ => log::warn!("[Lifecycle] {} failed: {}", command, err),
    }
}
