//! Plex TV theme songs.
//!
//! Plex hosts theme audio for most shows keyed by TheTVDB id. The files are
//! stable once published, so a successful download is final.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::{http_stream, AssetProvider, ProviderError, Resource};
use crate::limiter::AdmissionScheduler;
use crate::source::Show;

/// Default theme host.
pub const PLEX_THEMES_URL: &str = "https://tvthemes.plexapp.com";

const THEME_FILENAME: &str = "theme.mp3";

pub struct PlexThemeProvider {
    client: Client,
    base_url: String,
    scheduler: AdmissionScheduler,
}

impl PlexThemeProvider {
    pub fn new(client: Client, base_url: &str, scheduler: AdmissionScheduler) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            scheduler,
        }
    }

    fn theme_url(&self, tvdb_id: u64) -> String {
        format!("{}/{}.mp3", self.base_url, tvdb_id)
    }
}

/// Whether a HEAD response means the theme exists.
fn theme_exists(status: StatusCode, url: &str) -> Result<bool, ProviderError> {
    if status == StatusCode::NOT_FOUND {
        return Ok(false);
    }
    if status.is_client_error() || status.is_server_error() {
        return Err(ProviderError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(true)
}

#[async_trait]
impl AssetProvider for PlexThemeProvider {
    fn name(&self) -> &str {
        "plex"
    }

    fn persistable(&self) -> bool {
        true
    }

    async fn discover(&self, show: &Show) -> Result<Vec<Resource>, ProviderError> {
        let Some(tvdb_id) = show.tvdb() else {
            debug!("Plex: '{}' has no TVDB id", show.title);
            return Ok(Vec::new());
        };

        let url = self.theme_url(tvdb_id);
        let response = self
            .scheduler
            .submit(|| self.client.head(&url).send())
            .await??;

        if !theme_exists(response.status(), &url)? {
            debug!("Plex: no theme for '{}' ({})", show.title, tvdb_id);
            return Ok(Vec::new());
        }

        let client = self.client.clone();
        Ok(vec![Resource::new(
            THEME_FILENAME,
            self.scheduler.clone(),
            move || http_stream(client, url),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::Quota;
    use std::path::PathBuf;

    fn provider() -> PlexThemeProvider {
        let scheduler = AdmissionScheduler::new("plex", Quota::concurrency(1)).unwrap();
        PlexThemeProvider::new(Client::new(), "https://themes.example/", scheduler)
    }

    #[test]
    fn test_theme_url() {
        assert_eq!(provider().theme_url(81189), "https://themes.example/81189.mp3");
    }

    #[test]
    fn test_theme_exists_status_mapping() {
        let url = "https://themes.example/1.mp3";
        assert!(theme_exists(StatusCode::OK, url).unwrap());
        assert!(!theme_exists(StatusCode::NOT_FOUND, url).unwrap());
        assert!(matches!(
            theme_exists(StatusCode::SERVICE_UNAVAILABLE, url),
            Err(ProviderError::Status { status: 503, .. })
        ));
        assert!(matches!(
            theme_exists(StatusCode::FORBIDDEN, url),
            Err(ProviderError::Status { status: 403, .. })
        ));
    }

    #[tokio::test]
    async fn test_show_without_tvdb_is_not_applicable() {
        let show = Show {
            id: 9,
            title: "Local Recording".to_string(),
            path: PathBuf::from("/tv/Local Recording"),
            tvdb_id: None,
        };
        let resources = provider().discover(&show).await.unwrap();
        assert!(resources.is_empty());
    }
}
