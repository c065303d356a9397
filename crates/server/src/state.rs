use std::sync::Arc;

use showtunes_core::{Config, SanitizedConfig, Schedulers, Sweeper, ThemeOrchestrator};

/// Shared application state
pub struct AppState {
    config: Config,
    schedulers: Schedulers,
    orchestrator: Arc<ThemeOrchestrator>,
    sweeper: Option<Arc<Sweeper>>,
}

impl AppState {
    pub fn new(
        config: Config,
        schedulers: Schedulers,
        orchestrator: Arc<ThemeOrchestrator>,
        sweeper: Option<Arc<Sweeper>>,
    ) -> Self {
        Self {
            config,
            schedulers,
            orchestrator,
            sweeper,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn schedulers(&self) -> &Schedulers {
        &self.schedulers
    }

    pub fn orchestrator(&self) -> &Arc<ThemeOrchestrator> {
        &self.orchestrator
    }

    /// Present only when a show source (Sonarr) is configured.
    pub fn sweeper(&self) -> Option<&Arc<Sweeper>> {
        self.sweeper.as_ref()
    }
}
