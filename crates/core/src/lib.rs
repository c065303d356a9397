pub mod config;
pub mod limiter;
pub mod metrics;
pub mod orchestrator;
pub mod persistence;
pub mod providers;
pub mod source;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use limiter::{
    AdmissionScheduler, AdmissionSlot, LimiterError, Quota, QuotaManager, SchedulerStatus,
    Schedulers,
};
pub use orchestrator::{
    sanitize_filename, BatchReport, FetchTally, InFlightSet, OrchestratorConfig,
    OrchestratorError, ShowOutcome, SweepSummary, Sweeper, ThemeOrchestrator,
};
pub use persistence::{
    DedupStore, FileBacked, FsSnapshotStorage, SnapshotStorage, StoreError,
    DEFAULT_FLUSH_INTERVAL,
};
pub use providers::{
    create_providers, AssetProvider, ByteStream, FetchError, ProviderError, Resource,
};
pub use source::{Show, ShowSource, SonarrClient, SonarrEventType, SonarrWebhook, SourceError};
