use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use crate::state::{GroupId, TabId};

pub type Result<T> = std::result::Result<T, ShellError>;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("tab manager is not initialized")]
    NotInitialized,

    #[error("unknown tab id: {0}")]
    UnknownTabId(TabId),

    #[error("host mounting points not found within {}ms", waited.as_millis())]
    MountingSurfaceMissing { waited: Duration },

    #[error("failed to load {address}: {source}")]
    ContentLoad {
        address: String,
        #[source]
        source: LoadError,
    },

    #[error("unknown tab group: {0}")]
    UnknownGroup(GroupId),

    #[error("tab group name must not be empty")]
    InvalidGroupName,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Why a content fetch was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("{}", .0.canonical_reason().unwrap_or("Unknown Status"))]
    Status(StatusCode),

    #[error("asset not found: {0}")]
    MissingAsset(String),

    #[error("unsupported content source: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Transport(String),
}
