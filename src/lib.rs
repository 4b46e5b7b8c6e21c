// BiFrost Shell Library Entry Point
// Exposes all modules so the headless driver and desktop hosts can use them
// and so they can be tested independently.

pub mod error;
pub mod settings;
pub mod shell;
pub mod surface;

// Shared state
pub mod state;

// Pure logic modules (no Tauri imports)
pub mod modules;

// Tauri plugin host
#[cfg(feature = "desktop")]
pub mod desktop;

pub use error::{LoadError, Result, ShellError};
pub use modules::content::{ContentLoader, ContentSource, DefaultLoader};
pub use modules::lifecycle::{readiness, Coordinator, HostReady, Phase, ReadySignal};
pub use settings::Settings;
pub use state::{BuiltinView, MountPoints, Tab, TabId, TabSpec};
pub use surface::{HostSurface, MemorySurface};
