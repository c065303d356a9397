//! Sonarr API client and webhook payload.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Show, ShowSource, SourceError};
use crate::config::SonarrConfig;

/// Sonarr v3 API client.
pub struct SonarrClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SonarrClient {
    pub fn new(config: &SonarrConfig) -> Result<Self, SourceError> {
        if config.api_key.is_empty() {
            return Err(SourceError::NotConfigured(
                "Sonarr API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ShowSource for SonarrClient {
    async fn list_shows(&self) -> Result<Vec<Show>, SourceError> {
        let url = format!("{}/api/v3/series", self.base_url);
        debug!("Sonarr list series: {}", url);

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json::<Vec<Show>>()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse series list: {}", e)))
    }
}

/// Sonarr webhook event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SonarrEventType {
    Download,
    Grab,
    Rename,
    Test,
    #[serde(other)]
    Other,
}

/// Body of a Sonarr webhook call. Only the fields used here are decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SonarrWebhook {
    pub event_type: SonarrEventType,
    #[serde(default)]
    pub series: Option<Show>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_download_event() {
        let json = r#"{
            "eventType": "Download",
            "series": {"id": 1, "title": "Mob Psycho 100", "path": "/tv/Mob Psycho 100", "tvdbId": 307562, "type": "anime"},
            "episodes": [{"id": 10, "episodeNumber": 1, "seasonNumber": 1}],
            "isUpgrade": false
        }"#;
        let event: SonarrWebhook = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, SonarrEventType::Download);
        assert_eq!(event.series.unwrap().tvdb(), Some(307562));
    }

    #[test]
    fn test_parse_unknown_event() {
        let json = r#"{"eventType": "HealthRestored"}"#;
        let event: SonarrWebhook = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, SonarrEventType::Other);
        assert!(event.series.is_none());
    }

    #[test]
    fn test_client_requires_api_key() {
        let config = SonarrConfig {
            url: "http://localhost:8989".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        };
        assert!(matches!(
            SonarrClient::new(&config),
            Err(SourceError::NotConfigured(_))
        ));
    }
}
