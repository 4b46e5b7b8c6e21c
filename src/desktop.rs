// Desktop host: a Tauri plugin exposing the command surface to the webview and
// an event-emitting HostSurface the frontend renders from.
//
// The frontend calls `surface_ready` once `#tab-bar` and the content container
// exist, and listens for `tab-strip`, `panel-content`, `panel-visibility` and
// `panel-removed`.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tauri::plugin::{Builder, TauriPlugin};
use tauri::{AppHandle, Emitter, Manager, Runtime, State};

use crate::modules::content::DefaultLoader;
use crate::modules::groups::GROUPS_FILE;
use crate::modules::lifecycle::{readiness, Coordinator, ReadySignal};
use crate::modules::shortcuts::{KeyStroke, ShellCommand};
use crate::modules::tab_strip::TabStrip;
use crate::settings::Settings;
use crate::state::{BuiltinView, GroupId, MountPoints, Tab, TabGroup, TabId};
use crate::surface::{HostSurface, PanelContent, PanelId};

pub const SETTINGS_FILE: &str = "tab_settings.json";

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PanelContentEvent {
    panel: PanelId,
    content: PanelContent,
    html: String,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PanelVisibilityEvent {
    panel: PanelId,
    visible: bool,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PanelRemovedEvent {
    panel: PanelId,
}

/// Forwards every surface call to the webview as an event.
pub struct EventSurface<R: Runtime> {
    app: AppHandle<R>,
    strip_width: Arc<Mutex<Option<f64>>>,
}

impl<R: Runtime> EventSurface<R> {
    pub fn new(app: AppHandle<R>, strip_width: Arc<Mutex<Option<f64>>>) -> Self {
        Self { app, strip_width }
    }

    fn emit<S: Serialize + Clone>(&self, event: &str, payload: S) {
        if let Err(e) = self.app.emit(event, payload) {
            log::warn!("[Surface] Failed to emit {}: {}", event, e);
        }
    }
}

impl<R: Runtime> HostSurface for EventSurface<R> {
    fn available_strip_width(&self) -> Option<f64> {
        *self.strip_width.lock()
    }

    fn render_strip(&mut self, strip: &TabStrip) {
        self.emit("tab-strip", strip.clone());
    }

    fn mount_panel(&mut self, panel: &PanelId) {
        // Containers are created hidden on the first visibility event.
        self.emit(
            "panel-visibility",
            PanelVisibilityEvent {
                panel: panel.clone(),
                visible: false,
            },
        );
    }

    fn fill_panel(&mut self, panel: &PanelId, content: &PanelContent) {
        self.emit(
            "panel-content",
            PanelContentEvent {
                panel: panel.clone(),
                content: content.clone(),
                html: content.to_html(),
            },
        );
    }

    fn set_panel_visible(&mut self, panel: &PanelId, visible: bool) {
        self.emit(
            "panel-visibility",
            PanelVisibilityEvent {
                panel: panel.clone(),
                visible,
            },
        );
    }

    fn unmount_panel(&mut self, panel: &PanelId) {
        self.emit("panel-removed", PanelRemovedEvent { panel: panel.clone() });
    }
}

pub struct DesktopState {
    coordinator: Coordinator,
    ready: Mutex<Option<ReadySignal>>,
    strip_width: Arc<Mutex<Option<f64>>>,
}

impl DesktopState {
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }
}

type CommandResult<T> = Result<T, String>;

fn to_command<T>(result: crate::error::Result<T>) -> CommandResult<T> {
    result.map_err(|e| e.to_string())
}

#[tauri::command]
fn surface_ready(state: State<'_, DesktopState>, mounts: MountPoints, strip_width: Option<f64>) -> bool {
    *state.strip_width.lock() = strip_width;
    match state.ready.lock().take() {
        Some(signal) => signal.ready(mounts),
        None => {
            log::warn!("[Lifecycle] Host reported ready more than once");
            false
        }
    }
}

#[tauri::command]
fn set_strip_width(state: State<'_, DesktopState>, width: Option<f64>) -> CommandResult<TabStrip> {
    *state.strip_width.lock() = width;
    to_command(state.coordinator.render_strip())
}

#[tauri::command]
fn create_tab(state: State<'_, DesktopState>, address: Option<String>, title: Option<String>) -> CommandResult<TabId> {
    to_command(state.coordinator.create_tab(address.as_deref(), title.as_deref()))
}

#[tauri::command]
fn close_tab(state: State<'_, DesktopState>, id: TabId) -> CommandResult<()> {
    to_command(state.coordinator.close_tab(&id))
}

#[tauri::command]
fn close_active_tab(state: State<'_, DesktopState>) -> CommandResult<Option<TabId>> {
    to_command(state.coordinator.close_active_tab())
}

#[tauri::command]
fn activate_tab(state: State<'_, DesktopState>, id: TabId) -> CommandResult<()> {
    to_command(state.coordinator.activate_tab(&id))
}

#[tauri::command]
fn open_builtin_view(state: State<'_, DesktopState>, kind: String) -> CommandResult<TabId> {
    let view: BuiltinView = kind.parse()?;
    to_command(state.coordinator.open_builtin_view(view))
}

#[tauri::command]
fn update_tab_title(state: State<'_, DesktopState>, id: TabId, title: String) -> CommandResult<()> {
    to_command(state.coordinator.update_tab_title(&id, &title))
}

#[tauri::command]
fn update_tab_address(state: State<'_, DesktopState>, id: TabId, address: String) -> CommandResult<()> {
    to_command(state.coordinator.update_tab_address(&id, &address))
}

#[tauri::command]
fn reorder_tabs(state: State<'_, DesktopState>, order: Vec<TabId>) -> CommandResult<bool> {
    to_command(state.coordinator.reorder_tabs(&order))
}

#[tauri::command]
fn reopen_closed_tab(state: State<'_, DesktopState>) -> CommandResult<Option<TabId>> {
    to_command(state.coordinator.reopen_closed_tab())
}

#[tauri::command]
fn handle_key(state: State<'_, DesktopState>, stroke: KeyStroke) -> CommandResult<Option<ShellCommand>> {
    to_command(state.coordinator.handle_key(&stroke))
}

#[tauri::command]
fn create_tab_group(state: State<'_, DesktopState>, name: String) -> CommandResult<GroupId> {
    to_command(state.coordinator.create_tab_group(&name))
}

#[tauri::command]
fn open_tab_group(state: State<'_, DesktopState>, id: GroupId) -> CommandResult<Vec<TabId>> {
    to_command(state.coordinator.open_tab_group(id))
}

#[tauri::command]
fn list_tab_groups(state: State<'_, DesktopState>) -> Vec<TabGroup> {
    state.coordinator.groups()
}

#[tauri::command]
fn list_tabs(state: State<'_, DesktopState>) -> Vec<Tab> {
    state.coordinator.tabs()
}

/// Logging for the desktop host, installed the same way in debug and release.
pub fn log_plugin<R: Runtime>() -> TauriPlugin<R> {
    tauri_plugin_log::Builder::default()
        .level(log::LevelFilter::Info)
        .build()
}

/// Installs logging and the `tabs` plugin on the host app.
pub fn register<R: Runtime>(builder: tauri::Builder<R>) -> tauri::Builder<R> {
    builder.plugin(log_plugin()).plugin(init())
}

/// The `tabs` plugin. Settings come from the app config dir; groups persist in the app data dir.
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("tabs")
        .invoke_handler(tauri::generate_handler![
            surface_ready,
            set_strip_width,
            create_tab,
            close_tab,
            close_active_tab,
            activate_tab,
            open_builtin_view,
            update_tab_title,
            update_tab_address,
            reorder_tabs,
            reopen_closed_tab,
            handle_key,
            create_tab_group,
            open_tab_group,
            list_tab_groups,
            list_tabs,
        ])
        .setup(|app, _api| {
            let mut settings = Settings::load(&app.path().app_config_dir()?.join(SETTINGS_FILE));
            if settings.group_store_path.is_none() {
                settings.group_store_path = Some(app.path().app_data_dir()?.join(GROUPS_FILE));
            }

            let strip_width = Arc::new(Mutex::new(None));
            let surface = EventSurface::new(app.clone(), Arc::clone(&strip_width));
            let loader = DefaultLoader::from_settings(&settings);
            let coordinator = Coordinator::new(settings, loader, Box::new(surface));

            let (signal, host) = readiness();
            let waiting = coordinator.clone();
            tauri::async_runtime::spawn(async move {
                // Failure is logged by the coordinator, which stays inert.
                let _ = waiting.initialize(host).await;
            });

            app.manage(DesktopState {
                coordinator,
                ready: Mutex::new(Some(signal)),
                strip_width,
            });
            log::info!("[Lifecycle] Tabs plugin registered");
            Ok(())
        })
        .build()
}
