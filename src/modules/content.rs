// Content loader - request/response only, no state.
// Builtin view templates ship inside the binary; literal addresses go over HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use rust_embed::RustEmbed;
use url::Url;

use crate::error::LoadError;
use crate::settings::Settings;
use crate::state::BuiltinView;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentSource {
    View(BuiltinView),
    Address(String),
}

impl ContentSource {
    /// Address shown to the user when the fetch fails.
    pub fn address(&self) -> &str {
        match self {
            Self::View(view) => view.address(),
            Self::Address(address) => address,
        }
    }
}

#[async_trait]
pub trait ContentLoader: Send + Sync {
    async fn fetch(&self, source: &ContentSource) -> Result<String, LoadError>;
}

#[derive(RustEmbed)]
#[folder = "assets/views/"]
struct ViewAssets;

/// Serves builtin view templates compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedLoader;

#[async_trait]
impl ContentLoader for EmbeddedLoader {
    async fn fetch(&self, source: &ContentSource) -> Result<String, LoadError> {
        match source {
            ContentSource::View(view) => {
                let path = view.source_path();
                let file = ViewAssets::get(path).ok_or_else(|| LoadError::MissingAsset(path.to_string()))?;
                String::from_utf8(file.data.into_owned()).map_err(|e| LoadError::Transport(e.to_string()))
            }
            ContentSource::Address(address) => Err(LoadError::Unsupported(address.clone())),
        }
    }
}

pub struct HttpLoader {
    client: reqwest::Client,
    base: Option<Url>,
}

impl HttpLoader {
    pub fn new(base: Option<&str>) -> Self {
        let base = base.and_then(|b| match Url::parse(b) {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!("[Content] Ignoring invalid content base {}: {}", b, e);
                None
            }
        });
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }

    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }

    fn resolve(&self, source: &ContentSource) -> Result<Url, LoadError> {
        match source {
            ContentSource::View(view) => {
                let base = self
                    .base
                    .as_ref()
                    .ok_or_else(|| LoadError::Unsupported(view.address().to_string()))?;
                base.join(view.source_path())
                    .map_err(|e| LoadError::Transport(e.to_string()))
            }
            ContentSource::Address(address) => {
                Url::parse(address).map_err(|e| LoadError::Transport(format!("{}: {}", address, e)))
            }
        }
    }
}

#[async_trait]
impl ContentLoader for HttpLoader {
    async fn fetch(&self, source: &ContentSource) -> Result<String, LoadError> {
        let url = self.resolve(source)?;
        log::debug!("[Content] GET {}", url);

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| LoadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let code = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return Err(LoadError::Status(code));
        }

        response.text().await.map_err(|e| LoadError::Transport(e.to_string()))
    }
}

/// Views from the embedded templates (or the configured base), addresses over HTTP.
pub struct DefaultLoader {
    embedded: EmbeddedLoader,
    http: HttpLoader,
}

impl DefaultLoader {
    pub fn new(content_base_url: Option<&str>) -> Self {
        Self {
            embedded: EmbeddedLoader,
            http: HttpLoader::new(content_base_url),
        }
    }

    pub fn from_settings(settings: &Settings) -> Arc<dyn ContentLoader> {
        Arc::new(Self::new(settings.content_base_url.as_deref()))
    }
}

#[async_trait]
impl ContentLoader for DefaultLoader {
    async fn fetch(&self, source: &ContentSource) -> Result<String, LoadError> {
        match source {
            ContentSource::View(_) if !self.http.has_base() => self.embedded.fetch(source).await,
            _ => self.http.fetch(source).await,
        }
    }
}
