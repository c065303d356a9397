//! Anime opening and ending videos from animethemes.moe.
//!
//! Themes are looked up by MyAnimeList id, so shows go through the
//! [`AnimeIdMap`] first. New themes appear while a season airs, which is why
//! results from this provider never mark a show as done.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::anime_lists::AnimeIdMap;
use super::{http_stream, AssetProvider, ProviderError, Resource};
use crate::limiter::AdmissionScheduler;
use crate::source::Show;

/// Default API endpoint.
pub const ANIMETHEMES_API_URL: &str = "https://api.animethemes.moe";

const INCLUDES: &str = "animethemes.animethemeentries.videos,animethemes.song";

#[derive(Debug, Deserialize)]
struct AnimeResponse {
    #[serde(default)]
    anime: Vec<Anime>,
}

#[derive(Debug, Deserialize)]
struct Anime {
    #[serde(default)]
    animethemes: Vec<AnimeTheme>,
}

#[derive(Debug, Deserialize)]
struct AnimeTheme {
    slug: String,
    #[serde(default)]
    song: Option<Song>,
    #[serde(default)]
    animethemeentries: Vec<ThemeEntry>,
}

#[derive(Debug, Deserialize)]
struct Song {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThemeEntry {
    #[serde(default)]
    videos: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    link: String,
    #[serde(default)]
    resolution: Option<u32>,
}

/// A theme video picked for download.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ThemeVideo {
    filename: String,
    url: String,
}

pub struct AnimeThemesProvider {
    client: Client,
    base_url: String,
    directory: String,
    id_map: AnimeIdMap,
    api: AdmissionScheduler,
    media: AdmissionScheduler,
}

impl AnimeThemesProvider {
    pub fn new(
        client: Client,
        base_url: &str,
        directory: &str,
        id_map: AnimeIdMap,
        api: AdmissionScheduler,
        media: AdmissionScheduler,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            directory: directory.to_string(),
            id_map,
            api,
            media,
        }
    }

    async fn lookup(&self, mal_id: u64) -> Result<Vec<ThemeVideo>, ProviderError> {
        let url = format!("{}/anime", self.base_url);
        let external_id = mal_id.to_string();
        debug!("AnimeThemes lookup: mal_id={}", mal_id);

        // The slot covers the body read too.
        let body: AnimeResponse = self
            .api
            .submit(|| async {
                let response = self
                    .client
                    .get(&url)
                    .query(&[
                        ("filter[has]", "resources"),
                        ("filter[site]", "MyAnimeList"),
                        ("filter[external_id]", external_id.as_str()),
                        ("include", INCLUDES),
                    ])
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(ProviderError::Status {
                        url: url.clone(),
                        status: status.as_u16(),
                    });
                }

                response
                    .json::<AnimeResponse>()
                    .await
                    .map_err(|e| ProviderError::Parse(format!("animethemes response: {}", e)))
            })
            .await??;

        Ok(theme_videos(body))
    }
}

/// One video per theme: the highest resolution of the first entry that has any.
fn theme_videos(response: AnimeResponse) -> Vec<ThemeVideo> {
    let mut videos = Vec::new();
    for theme in response.anime.into_iter().flat_map(|a| a.animethemes) {
        let Some(best) = theme
            .animethemeentries
            .into_iter()
            .find(|entry| !entry.videos.is_empty())
            .and_then(|entry| {
                entry
                    .videos
                    .into_iter()
                    .max_by_key(|v| v.resolution.unwrap_or(0))
            })
        else {
            continue;
        };

        let title = theme.song.and_then(|s| s.title).filter(|t| !t.trim().is_empty());
        let filename = match title {
            Some(title) => format!("{} - {}.webm", theme.slug, title),
            None => format!("{}.webm", theme.slug),
        };
        videos.push(ThemeVideo {
            filename,
            url: best.link,
        });
    }
    videos
}

#[async_trait]
impl AssetProvider for AnimeThemesProvider {
    fn name(&self) -> &str {
        "animethemes"
    }

    fn persistable(&self) -> bool {
        false
    }

    async fn discover(&self, show: &Show) -> Result<Vec<Resource>, ProviderError> {
        let Some(tvdb_id) = show.tvdb() else {
            return Ok(Vec::new());
        };

        let mal_ids = self.id_map.mal_ids(tvdb_id).await?;
        if mal_ids.is_empty() {
            debug!("AnimeThemes: '{}' is not a known anime", show.title);
            return Ok(Vec::new());
        }

        let per_season = try_join_all(mal_ids.iter().map(|id| self.lookup(*id))).await?;

        // Seasons can reuse slugs and songs; the first occurrence wins.
        let mut seen = HashSet::new();
        let resources = per_season
            .into_iter()
            .flatten()
            .filter(|video| seen.insert(video.filename.clone()))
            .map(|video| {
                let client = self.client.clone();
                let url = video.url;
                Resource::new(video.filename, self.media.clone(), move || {
                    http_stream(client, url)
                })
                .in_directory(self.directory.clone())
            })
            .collect::<Vec<_>>();

        debug!(
            "AnimeThemes: {} videos for '{}'",
            resources.len(),
            show.title
        );
        Ok(resources)
    }
}
