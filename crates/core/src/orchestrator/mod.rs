//! Theme orchestration.
//!
//! For each show the orchestrator:
//! - skips it if another run already holds it ([`InFlightSet`])
//! - skips it if its folder is missing or the dedup store marks it done
//! - asks providers in order until one supplies resources
//! - fetches those resources concurrently through their schedulers
//! - marks the show done when a persistable provider fully succeeded
//!
//! The [`Sweeper`] runs this over the whole library, throttled.

mod config;
mod fetch;
mod in_flight;
mod runner;
mod sweeper;
mod types;

pub use config::OrchestratorConfig;
pub use fetch::{destination, fetch_resource, sanitize_filename, Fetched};
pub use in_flight::{InFlightGuard, InFlightSet};
pub use runner::ThemeOrchestrator;
pub use sweeper::Sweeper;
pub use types::{BatchReport, FetchTally, OrchestratorError, ShowOutcome, SweepSummary};
