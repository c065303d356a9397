//! TheTVDB to MyAnimeList id cross-reference.
//!
//! The Fribb anime-lists project publishes one JSON array linking ids across
//! anime databases. The list is large and changes slowly, so it is fetched
//! once and kept for a TTL. A failed download is remembered for a shorter
//! window so lookups during an outage do not each download it again.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::ProviderError;
use crate::limiter::AdmissionScheduler;

/// Default cross-reference list.
pub const ANIME_LISTS_URL: &str =
    "https://raw.githubusercontent.com/Fribb/anime-lists/master/anime-list-full.json";

/// How long a failed download is remembered before the next attempt.
pub const FAILURE_RETRY: Duration = Duration::from_secs(5 * 60);

struct CachedIndex {
    checked_at: Instant,
    /// The index, or why it could not be loaded.
    outcome: Result<HashMap<u64, Vec<u64>>, String>,
}

/// Cached TVDB id to MAL ids lookup.
pub struct AnimeIdMap {
    client: Client,
    url: String,
    scheduler: AdmissionScheduler,
    ttl: Duration,
    failure_ttl: Duration,
    cache: Mutex<Option<CachedIndex>>,
}

impl AnimeIdMap {
    pub fn new(client: Client, url: &str, scheduler: AdmissionScheduler, ttl: Duration) -> Self {
        Self {
            client,
            url: url.to_string(),
            scheduler,
            ttl,
            failure_ttl: FAILURE_RETRY.min(ttl),
            cache: Mutex::new(None),
        }
    }

    /// MAL ids for a TVDB id, one per season entry. Empty if not an anime.
    pub async fn mal_ids(&self, tvdb_id: u64) -> Result<Vec<u64>, ProviderError> {
        // Held across the refresh so concurrent lookups wait for one download.
        let mut cache = self.cache.lock().await;

        let stale = match cache.as_ref() {
            Some(cached) => {
                let ttl = match cached.outcome {
                    Ok(_) => self.ttl,
                    Err(_) => self.failure_ttl,
                };
                cached.checked_at.elapsed() >= ttl
            }
            None => true,
        };
        if stale {
            let outcome = match self.fetch_index().await {
                Ok(by_tvdb) => Ok(by_tvdb),
                // Queue timeouts say nothing about the list itself.
                Err(e @ ProviderError::Limiter(_)) => return Err(e),
                Err(e) => {
                    warn!(
                        "Anime id cross-reference unavailable, retrying in {:?}: {}",
                        self.failure_ttl, e
                    );
                    Err(match e {
                        ProviderError::Unavailable(reason) => reason,
                        other => format!("anime id list: {}", other),
                    })
                }
            };
            *cache = Some(CachedIndex {
                checked_at: Instant::now(),
                outcome,
            });
        }

        match cache.as_ref().map(|cached| &cached.outcome) {
            Some(Ok(by_tvdb)) => Ok(by_tvdb.get(&tvdb_id).cloned().unwrap_or_default()),
            Some(Err(reason)) => Err(ProviderError::Unavailable(reason.clone())),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_index(&self) -> Result<HashMap<u64, Vec<u64>>, ProviderError> {
        debug!("Fetching anime id cross-reference from {}", self.url);

        let entries: Vec<Value> = self
            .scheduler
            .submit(|| async {
                let response = self.client.get(&self.url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ProviderError::Unavailable(format!(
                        "anime id list returned {}",
                        status.as_u16()
                    )));
                }
                response
                    .json::<Vec<Value>>()
                    .await
                    .map_err(|e| ProviderError::Parse(format!("anime id list: {}", e)))
            })
            .await??;

        let index = index_entries(&entries);
        info!(
            "Loaded anime id cross-reference: {} entries, {} TVDB ids",
            entries.len(),
            index.len()
        );
        Ok(index)
    }
}

/// Groups MAL ids by TVDB id. Entries missing either id are skipped.
fn index_entries(entries: &[Value]) -> HashMap<u64, Vec<u64>> {
    let mut index: HashMap<u64, Vec<u64>> = HashMap::new();
    for entry in entries {
        let (Some(tvdb), Some(mal)) = (id_field(entry, "thetvdb_id"), id_field(entry, "mal_id"))
        else {
            continue;
        };
        let mal_ids = index.entry(tvdb).or_default();
        if !mal_ids.contains(&mal) {
            mal_ids.push(mal);
        }
    }
    index
}

/// Ids are mostly numbers but a few entries carry them as strings.
fn id_field(entry: &Value, key: &str) -> Option<u64> {
    match entry.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .filter(|id| *id != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::Quota;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `response` to every connection and counts the requests.
    async fn serve(response: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/anime-list-full.json", addr), hits)
    }

    fn id_map(url: &str) -> AnimeIdMap {
        let scheduler = AdmissionScheduler::new("anime_lists", Quota::concurrency(1)).unwrap();
        AnimeIdMap::new(Client::new(), url, scheduler, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_unavailable_list_is_not_refetched() {
        let (url, hits) = serve(
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let map = id_map(&url);

        for tvdb_id in 1..=5 {
            let result = map.mal_ids(tvdb_id).await;
            assert!(matches!(result, Err(ProviderError::Unavailable(_))));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unparseable_list_is_not_refetched() {
        let (url, hits) = serve(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 9\r\nconnection: close\r\n\r\nnot json!",
        )
        .await;
        let map = id_map(&url);

        for tvdb_id in 1..=5 {
            let result = map.mal_ids(tvdb_id).await;
            assert!(matches!(result, Err(ProviderError::Unavailable(_))));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loaded_list_is_cached() {
        let (url, hits) = serve(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 36\r\nconnection: close\r\n\r\n[{\"mal_id\": 1, \"thetvdb_id\": 76885}]",
        )
        .await;
        let map = id_map(&url);

        assert_eq!(map.mal_ids(76885).await.unwrap(), vec![1]);
        assert!(map.mal_ids(81189).await.unwrap().is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_index_entries() {
        let entries = vec![
            json!({"mal_id": 5114, "thetvdb_id": 85249, "anidb_id": 6107}),
            json!({"mal_id": 11061, "thetvdb_id": 252322}),
            json!({"mal_id": 30276, "thetvdb_id": 252322}),
            json!({"mal_id": 30276, "thetvdb_id": 252322}),
            json!({"mal_id": 1, "thetvdb_id": "76885"}),
            json!({"mal_id": 2}),
            json!({"thetvdb_id": 3}),
            json!({"mal_id": 4, "thetvdb_id": null}),
        ];

        let index = index_entries(&entries);
        assert_eq!(index.len(), 3);
        assert_eq!(index[&85249], vec![5114]);
        assert_eq!(index[&252322], vec![11061, 30276]);
        assert_eq!(index[&76885], vec![1]);
    }
}
