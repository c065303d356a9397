use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::limiter::Quota;
use crate::orchestrator::OrchestratorConfig;
use crate::providers::{ANIMETHEMES_API_URL, ANIME_LISTS_URL, PLEX_THEMES_URL};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sonarr: Option<SonarrConfig>,
    /// Per-service quotas, keyed by service name.
    #[serde(default = "default_quotas")]
    pub quotas: BTreeMap<String, Quota>,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            sonarr: None,
            quotas: default_quotas(),
            orchestrator: OrchestratorConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl Config {
    /// Adds the built-in quota for every known service the file left out.
    pub fn with_default_quotas(mut self) -> Self {
        for (service, quota) in default_quotas() {
            self.quotas.entry(service).or_insert(quota);
        }
        self
    }
}

/// Quotas for the services the built-in providers call.
pub fn default_quotas() -> BTreeMap<String, Quota> {
    let mut quotas = BTreeMap::new();
    quotas.insert(
        "plex".to_string(),
        Quota::concurrency(4).with_rate(10, 1_000),
    );
    // animethemes.moe allows 90 requests per minute.
    quotas.insert(
        "animethemes".to_string(),
        Quota::concurrency(2).with_rate(60, 60_000),
    );
    quotas.insert("animethemes_media".to_string(), Quota::concurrency(2));
    quotas.insert("anime_lists".to_string(), Quota::concurrency(1));
    quotas
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    3000
}

/// Dedup store location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
    /// Seconds between background flushes.
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            flush_interval_secs: default_flush_interval(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_flush_interval() -> u64 {
    15 * 60
}

/// Sonarr connection, used for full sweeps
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SonarrConfig {
    /// Base URL, e.g. http://localhost:8989
    pub url: String,
    pub api_key: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

/// Provider settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvidersConfig {
    /// HTTP timeout for provider requests in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub plex: PlexConfig,
    #[serde(default)]
    pub animethemes: AnimeThemesConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            plex: PlexConfig::default(),
            animethemes: AnimeThemesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlexConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_plex_url")]
    pub base_url: String,
}

impl Default for PlexConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: default_plex_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnimeThemesConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_animethemes_url")]
    pub base_url: String,
    /// TVDB to MyAnimeList cross-reference list
    #[serde(default = "default_anime_lists_url")]
    pub anime_lists_url: String,
    /// How long the cross-reference list is cached, in seconds (default: 24h)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Show subdirectory for theme videos
    #[serde(default = "default_video_dir")]
    pub directory: String,
}

impl Default for AnimeThemesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: default_animethemes_url(),
            anime_lists_url: default_anime_lists_url(),
            cache_ttl_secs: default_cache_ttl(),
            directory: default_video_dir(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_plex_url() -> String {
    PLEX_THEMES_URL.to_string()
}

fn default_animethemes_url() -> String {
    ANIMETHEMES_API_URL.to_string()
}

fn default_anime_lists_url() -> String {
    ANIME_LISTS_URL.to_string()
}

fn default_cache_ttl() -> u64 {
    24 * 60 * 60
}

fn default_video_dir() -> String {
    "backdrops".to_string()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sonarr: Option<SanitizedSonarrConfig>,
    pub quotas: BTreeMap<String, Quota>,
    pub orchestrator: OrchestratorConfig,
    pub providers: ProvidersConfig,
}

/// Sanitized Sonarr config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSonarrConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            storage: config.storage.clone(),
            sonarr: config.sonarr.as_ref().map(|s| SanitizedSonarrConfig {
                url: s.url.clone(),
                api_key_configured: !s.api_key.is_empty(),
                timeout_secs: s.timeout_secs,
            }),
            quotas: config.quotas.clone(),
            orchestrator: config.orchestrator.clone(),
            providers: config.providers.clone(),
        }
    }
}
