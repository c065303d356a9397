//! Theme orchestrator: ordered provider fallback per show.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tokio::fs;
use tracing::{debug, error, info, warn};

use super::config::OrchestratorConfig;
use super::fetch::{fetch_resource, Fetched};
use super::in_flight::InFlightSet;
use super::types::{BatchReport, FetchTally, OrchestratorError, ShowOutcome};
use crate::metrics;
use crate::persistence::DedupStore;
use crate::providers::{AssetProvider, Resource};
use crate::source::Show;

/// Acquires theme assets for shows.
///
/// Providers are tried in order. The first one that returns any resources
/// owns the show for this run, even if some of its fetches fail; later
/// providers are only consulted when earlier ones have nothing.
pub struct ThemeOrchestrator {
    config: OrchestratorConfig,
    providers: Vec<Arc<dyn AssetProvider>>,
    dedup: DedupStore,
    in_flight: InFlightSet,
}

impl ThemeOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        providers: Vec<Arc<dyn AssetProvider>>,
        dedup: DedupStore,
    ) -> Self {
        Self {
            config,
            providers,
            dedup,
            in_flight: InFlightSet::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn dedup(&self) -> &DedupStore {
        &self.dedup
    }

    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Processes one show.
    ///
    /// Only dedup store failures are errors; provider and fetch failures are
    /// logged and reflected in the outcome.
    pub async fn process_show(&self, show: &Show) -> Result<ShowOutcome, OrchestratorError> {
        let key = show.entity_key();

        let result = match self.in_flight.try_acquire(&key) {
            Some(_guard) => self.run(show, &key).await,
            None => {
                debug!("'{}' ({}) already in flight", show.title, key);
                Ok(ShowOutcome::InFlight)
            }
        };

        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "error",
        };
        metrics::SHOWS_PROCESSED.with_label_values(&[label]).inc();
        result
    }

    /// Processes shows concurrently and reports outcome counts.
    pub async fn process_shows(&self, shows: &[Show]) -> BatchReport {
        let results = join_all(shows.iter().map(|show| self.process_show(show))).await;

        let mut report = BatchReport::default();
        for (show, result) in shows.iter().zip(&results) {
            if let Err(e) = result {
                error!("Failed to process '{}': {}", show.title, e);
            }
            report.record(result);
        }

        info!(
            "Processed {} shows: {} completed, {} satisfied, {} unresolved, {} missing, {} in flight, {} errors",
            report.shows,
            report.completed,
            report.already_satisfied,
            report.unresolved,
            report.missing_root,
            report.in_flight,
            report.errors
        );
        report
    }

    async fn run(&self, show: &Show, key: &str) -> Result<ShowOutcome, OrchestratorError> {
        if !is_dir(&show.path).await {
            debug!(
                "'{}' root {} does not exist",
                show.title,
                show.path.display()
            );
            return Ok(ShowOutcome::MissingRoot);
        }

        if self.dedup.is_satisfied(key).await? {
            debug!("'{}' ({}) already satisfied", show.title, key);
            return Ok(ShowOutcome::AlreadySatisfied);
        }

        for provider in &self.providers {
            let resources = match provider.discover(show).await {
                Ok(resources) => resources,
                Err(e) => {
                    warn!(
                        "Provider {} failed for '{}': {}",
                        provider.name(),
                        show.title,
                        e
                    );
                    metrics::PROVIDER_ERRORS
                        .with_label_values(&[provider.name()])
                        .inc();
                    continue;
                }
            };

            if resources.is_empty() {
                debug!("Provider {} has nothing for '{}'", provider.name(), show.title);
                continue;
            }

            let tally = self
                .fetch_all(provider.name(), &show.path, resources)
                .await;
            if tally.total == 0 {
                continue;
            }

            let marked = tally.failed == 0 && provider.persistable();
            if marked {
                self.dedup.mark_satisfied(key).await?;
            }

            info!(
                "'{}' via {}: {}/{} resources ({} already present, {} failed)",
                show.title,
                provider.name(),
                tally.succeeded,
                tally.total,
                tally.skipped,
                tally.failed
            );
            return Ok(ShowOutcome::Completed {
                provider: provider.name().to_string(),
                tally,
                marked,
            });
        }

        info!("No provider had themes for '{}'", show.title);
        Ok(ShowOutcome::Unresolved)
    }

    async fn fetch_all(&self, provider: &str, root: &Path, resources: Vec<Resource>) -> FetchTally {
        let skip_existing = self.config.skip_existing;
        let fetches = resources.into_iter().map(|resource| async move {
            let filename = resource.filename.clone();
            (filename, fetch_resource(root, resource, skip_existing).await)
        });

        let mut tally = FetchTally::default();
        for (filename, result) in join_all(fetches).await {
            tally.total += 1;
            let label = match result {
                Ok(Fetched::Written { .. }) => {
                    tally.succeeded += 1;
                    "written"
                }
                Ok(Fetched::Skipped) => {
                    tally.succeeded += 1;
                    tally.skipped += 1;
                    "skipped"
                }
                Err(e) => {
                    warn!(
                        "Failed to fetch {} from {} into {}: {}",
                        filename,
                        provider,
                        root.display(),
                        e
                    );
                    tally.failed += 1;
                    "failed"
                }
            };
            metrics::RESOURCES_FETCHED
                .with_label_values(&[provider, label])
                .inc();
        }
        tally
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
