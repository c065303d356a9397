//! Theme asset providers.
//!
//! A provider looks a show up on one third-party service and describes the
//! files it can supply as [`Resource`]s. Nothing is downloaded during
//! discovery; each resource carries a deferred fetch that the orchestrator
//! runs through the resource's scheduler.

mod anime_lists;
mod animethemes;
mod plex;

pub use anime_lists::{AnimeIdMap, ANIME_LISTS_URL};
pub use animethemes::{AnimeThemesProvider, ANIMETHEMES_API_URL};
pub use plex::{PlexThemeProvider, PLEX_THEMES_URL};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt, TryStreamExt};
use reqwest::Client;
use thiserror::Error;

use crate::config::ProvidersConfig;
use crate::limiter::{AdmissionScheduler, LimiterError, Schedulers};
use crate::source::Show;

/// Errors raised while discovering resources.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error(transparent)]
    Limiter(#[from] LimiterError),
}

/// Errors raised while fetching a single resource.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Limiter(#[from] LimiterError),
}

/// Body of a fetched resource.
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

type FetchFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<ByteStream, FetchError>> + Send>;

/// One file a provider can supply.
pub struct Resource {
    /// Target file name, sanitized before use.
    pub filename: String,
    /// Optional subdirectory of the show root.
    pub directory: Option<String>,
    /// Scheduler the fetch runs through.
    pub scheduler: AdmissionScheduler,
    fetch: FetchFn,
}

impl Resource {
    pub fn new<F, Fut>(filename: impl Into<String>, scheduler: AdmissionScheduler, fetch: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<ByteStream, FetchError>> + Send + 'static,
    {
        Self {
            filename: filename.into(),
            directory: None,
            scheduler,
            fetch: Box::new(move || fetch().boxed()),
        }
    }

    pub fn in_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Opens the byte stream. Consumes the resource.
    pub async fn open(self) -> Result<ByteStream, FetchError> {
        (self.fetch)().await
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("filename", &self.filename)
            .field("directory", &self.directory)
            .field("scheduler", &self.scheduler.service())
            .finish_non_exhaustive()
    }
}

/// A source of theme assets for shows.
#[async_trait]
pub trait AssetProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether a complete result means the show never needs this work again.
    fn persistable(&self) -> bool;

    /// Lists the resources available for `show`. Empty means "not applicable".
    async fn discover(&self, show: &Show) -> Result<Vec<Resource>, ProviderError>;
}

/// GETs `url` and returns the body as a stream.
pub async fn http_stream(client: Client, url: String) -> Result<ByteStream, FetchError> {
    let response = client.get(&url).send().await?;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(FetchError::Status {
            url,
            status: status.as_u16(),
        });
    }

    Ok(response.bytes_stream().map_err(FetchError::from).boxed())
}

/// Shared HTTP client for all providers.
pub fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("showtunes/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Builds the enabled providers in fallback order: plex first, then animethemes.
pub fn create_providers(
    config: &ProvidersConfig,
    schedulers: &Schedulers,
) -> Result<Vec<Arc<dyn AssetProvider>>, ProviderError> {
    let client = http_client(Duration::from_secs(config.timeout_secs))?;
    let mut providers: Vec<Arc<dyn AssetProvider>> = Vec::new();

    if config.plex.enabled {
        providers.push(Arc::new(PlexThemeProvider::new(
            client.clone(),
            &config.plex.base_url,
            schedulers.get("plex")?,
        )));
    }

    if config.animethemes.enabled {
        let id_map = AnimeIdMap::new(
            client.clone(),
            &config.animethemes.anime_lists_url,
            schedulers.get("anime_lists")?,
            Duration::from_secs(config.animethemes.cache_ttl_secs),
        );
        providers.push(Arc::new(AnimeThemesProvider::new(
            client,
            &config.animethemes.base_url,
            &config.animethemes.directory,
            id_map,
            schedulers.get("animethemes")?,
            schedulers.get("animethemes_media")?,
        )));
    }

    Ok(providers)
}
