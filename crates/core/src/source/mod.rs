//! Show enumeration.
//!
//! A [`ShowSource`] lists every show the library manager knows about; the
//! sweeper feeds that list to the orchestrator. [`SonarrClient`] is the only
//! production implementation.

mod sonarr;

pub use sonarr::{SonarrClient, SonarrEventType, SonarrWebhook};

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A show as reported by the library manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Show {
    /// Library manager's own series id.
    pub id: u64,
    pub title: String,
    /// Show root directory.
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb_id: Option<u64>,
}

impl Show {
    /// TheTVDB id, ignoring the `0` placeholder used for unmatched series.
    pub fn tvdb(&self) -> Option<u64> {
        self.tvdb_id.filter(|id| *id != 0)
    }

    /// Key used for dedup and in-flight tracking.
    pub fn entity_key(&self) -> String {
        match self.tvdb() {
            Some(id) => id.to_string(),
            None => format!("series-{}", self.id),
        }
    }
}

/// Errors from a show source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Show source returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to parse show list: {0}")]
    Parse(String),

    #[error("Show source not configured: {0}")]
    NotConfigured(String),
}

/// Lists every show in the library.
#[async_trait]
pub trait ShowSource: Send + Sync {
    async fn list_shows(&self) -> Result<Vec<Show>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show(id: u64, tvdb_id: Option<u64>) -> Show {
        Show {
            id,
            title: "Cowboy Bebop".to_string(),
            path: PathBuf::from("/tv/Cowboy Bebop"),
            tvdb_id,
        }
    }

    #[test]
    fn test_entity_key_prefers_tvdb() {
        assert_eq!(show(7, Some(76885)).entity_key(), "76885");
        assert_eq!(show(7, None).entity_key(), "series-7");
        assert_eq!(show(7, Some(0)).entity_key(), "series-7");
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{"id": 3, "title": "Frieren", "path": "/tv/Frieren", "tvdbId": 424536, "monitored": true}"#;
        let show: Show = serde_json::from_str(json).unwrap();
        assert_eq!(show.tvdb(), Some(424536));
        assert_eq!(show.path, PathBuf::from("/tv/Frieren"));

        let json = r#"{"id": 4, "title": "Unknown", "path": "/tv/Unknown"}"#;
        let show: Show = serde_json::from_str(json).unwrap();
        assert!(show.tvdb_id.is_none());
    }
}
