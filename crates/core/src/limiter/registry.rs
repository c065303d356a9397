//! One scheduler per external service, built from the quota table.

use std::collections::BTreeMap;

use tracing::info;

use super::quota::Quota;
use super::scheduler::{AdmissionScheduler, SchedulerStatus};
use super::LimiterError;

/// Schedulers keyed by service name.
///
/// Built once at startup and handed to the components that call each
/// service, so every caller of a service shares one quota.
#[derive(Clone, Default)]
pub struct Schedulers {
    by_service: BTreeMap<String, AdmissionScheduler>,
}

impl Schedulers {
    /// Builds a scheduler for every entry of the quota table.
    pub fn from_quotas<'a, I>(quotas: I) -> Result<Self, LimiterError>
    where
        I: IntoIterator<Item = (&'a String, &'a Quota)>,
    {
        let mut by_service = BTreeMap::new();
        for (service, quota) in quotas {
            let scheduler = AdmissionScheduler::new(service.clone(), quota.clone())
                .map_err(|e| match e {
                    LimiterError::InvalidQuota(reason) => {
                        LimiterError::InvalidQuota(format!("{}: {}", service, reason))
                    }
                    other => other,
                })?;
            info!(
                "Scheduler for {}: concurrency={}, rate={:?}/{:?}ms, max_delay={}ms",
                service, quota.concurrency, quota.rate, quota.interval_ms, quota.max_delay_ms
            );
            by_service.insert(service.clone(), scheduler);
        }
        Ok(Self { by_service })
    }

    /// Adds or replaces a scheduler.
    pub fn insert(&mut self, scheduler: AdmissionScheduler) {
        self.by_service
            .insert(scheduler.service().to_string(), scheduler);
    }

    /// Returns the scheduler for `service`.
    pub fn get(&self, service: &str) -> Result<AdmissionScheduler, LimiterError> {
        self.by_service
            .get(service)
            .cloned()
            .ok_or_else(|| LimiterError::UnknownService(service.to_string()))
    }

    /// Status of every scheduler, ordered by service name.
    pub fn statuses(&self) -> Vec<SchedulerStatus> {
        self.by_service.values().map(|s| s.status()).collect()
    }
}
