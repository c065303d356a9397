//! Sliding-window quota tracking for a single external service.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

use super::LimiterError;

/// Quota for one external service.
///
/// `interval_ms` and `rate` describe a sliding-window rate limit and must be
/// set together. `concurrency` caps the number of tasks running at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Length of the sliding window in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    /// Admissions allowed per window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<u32>,
    /// Tasks allowed to run at the same time.
    pub concurrency: u32,
    /// Maximum time a task may wait in the queue (0 = unbounded).
    #[serde(default)]
    pub max_delay_ms: u64,
}

impl Quota {
    /// A quota with only a concurrency ceiling.
    pub fn concurrency(limit: u32) -> Self {
        Self {
            interval_ms: None,
            rate: None,
            concurrency: limit,
            max_delay_ms: 0,
        }
    }

    /// Adds a sliding-window rate limit.
    pub fn with_rate(mut self, rate: u32, interval_ms: u64) -> Self {
        self.rate = Some(rate);
        self.interval_ms = Some(interval_ms);
        self
    }

    /// Adds a maximum queue wait.
    pub fn with_max_delay(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Checks the quota invariants.
    pub fn validate(&self) -> Result<(), LimiterError> {
        if self.interval_ms.is_some() != self.rate.is_some() {
            return Err(LimiterError::InvalidQuota(
                "interval_ms and rate must be specified together".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(LimiterError::InvalidQuota(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.interval_ms == Some(0) || self.rate == Some(0) {
            return Err(LimiterError::InvalidQuota(
                "interval_ms and rate must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Maximum queue wait, if bounded.
    pub fn max_delay(&self) -> Option<Duration> {
        (self.max_delay_ms > 0).then(|| Duration::from_millis(self.max_delay_ms))
    }

    fn window(&self) -> Option<(Duration, usize)> {
        match (self.interval_ms, self.rate) {
            (Some(interval), Some(rate)) => Some((Duration::from_millis(interval), rate as usize)),
            _ => None,
        }
    }
}

/// Tracks admissions against a [`Quota`].
///
/// Combines a concurrency semaphore with a sliding-window rate limiter. Both
/// constraints must pass for a task to be admitted.
#[derive(Debug)]
pub struct QuotaManager {
    quota: Quota,
    active: u32,
    /// Admission instants inside the current window, oldest first.
    history: VecDeque<Instant>,
}

impl QuotaManager {
    /// Creates a manager, rejecting invalid quotas.
    pub fn new(quota: Quota) -> Result<Self, LimiterError> {
        quota.validate()?;
        Ok(Self {
            quota,
            active: 0,
            history: VecDeque::new(),
        })
    }

    pub fn quota(&self) -> &Quota {
        &self.quota
    }

    /// Number of admitted tasks that have not been released yet.
    pub fn active_count(&self) -> u32 {
        self.active
    }

    /// Number of admissions still inside the window (as of the last prune).
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Tries to admit one task now.
    pub fn try_admit(&mut self) -> bool {
        self.try_admit_at(Instant::now())
    }

    /// Tries to admit one task at the given instant.
    ///
    /// On success one concurrency slot and, when rate limited, one history
    /// slot are reserved.
    pub fn try_admit_at(&mut self, now: Instant) -> bool {
        if self.active >= self.quota.concurrency {
            return false;
        }

        if let Some((interval, rate)) = self.quota.window() {
            self.prune(now, interval);
            if self.history.len() >= rate {
                return false;
            }
            self.history.push_back(now);
        }

        self.active += 1;
        true
    }

    /// Releases one concurrency slot. History entries only age out.
    pub fn release(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    /// Drops history entries older than the window ending at `now`.
    pub fn prune_at(&mut self, now: Instant) {
        if let Some((interval, _)) = self.quota.window() {
            self.prune(now, interval);
        }
    }

    fn prune(&mut self, now: Instant, interval: Duration) {
        while let Some(oldest) = self.history.front() {
            if now.saturating_duration_since(*oldest) > interval {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_requires_interval_and_rate_together() {
        let quota = Quota {
            interval_ms: Some(1000),
            rate: None,
            concurrency: 1,
            max_delay_ms: 0,
        };
        assert!(matches!(
            QuotaManager::new(quota),
            Err(LimiterError::InvalidQuota(_))
        ));

        let quota = Quota {
            interval_ms: None,
            rate: Some(3),
            concurrency: 1,
            max_delay_ms: 0,
        };
        assert!(matches!(
            QuotaManager::new(quota),
            Err(LimiterError::InvalidQuota(_))
        ));
    }

    #[test]
    fn test_quota_requires_concurrency() {
        assert!(Quota::concurrency(0).validate().is_err());
        assert!(Quota::concurrency(1).validate().is_ok());
    }

    #[test]
    fn test_max_delay_zero_is_unbounded() {
        assert_eq!(Quota::concurrency(1).max_delay(), None);
        assert_eq!(
            Quota::concurrency(1).with_max_delay(250).max_delay(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_concurrency_ceiling() {
        let mut manager = QuotaManager::new(Quota::concurrency(2)).unwrap();
        assert!(manager.try_admit());
        assert!(manager.try_admit());
        assert!(!manager.try_admit());
        assert_eq!(manager.active_count(), 2);

        manager.release();
        assert!(manager.try_admit());
        assert_eq!(manager.active_count(), 2);
    }

    #[test]
    fn test_release_does_not_free_rate_slot() {
        let mut manager = QuotaManager::new(Quota::concurrency(10).with_rate(2, 1000)).unwrap();
        let start = Instant::now();

        assert!(manager.try_admit_at(start));
        assert!(manager.try_admit_at(start));
        manager.release();
        manager.release();

        // Concurrency is free but the window is still full.
        assert!(!manager.try_admit_at(start + Duration::from_millis(500)));
        assert_eq!(manager.active_count(), 0);

        // Entries age out once they are older than the interval.
        assert!(manager.try_admit_at(start + Duration::from_millis(1001)));
    }

    #[test]
    fn test_rejected_admission_records_nothing() {
        let mut manager = QuotaManager::new(Quota::concurrency(1).with_rate(5, 1000)).unwrap();
        let now = Instant::now();
        assert!(manager.try_admit_at(now));
        assert!(!manager.try_admit_at(now));
        assert_eq!(manager.history_len(), 1);
    }

    /// Simulates a clock over many steps and checks both invariants after
    /// every admission attempt.
    #[test]
    fn test_simulated_clock_never_exceeds_limits() {
        let interval = Duration::from_millis(1000);
        let rate = 3;
        let concurrency = 2;
        let mut manager =
            QuotaManager::new(Quota::concurrency(concurrency).with_rate(rate, 1000)).unwrap();

        let start = Instant::now();
        let mut admissions: Vec<Instant> = Vec::new();
        // Deterministic pseudo-random step sizes and release pattern.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;

        let mut now = start;
        for _ in 0..5000 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;

            now += Duration::from_millis(seed % 97);
            if seed % 3 == 0 {
                manager.release();
            }

            if manager.try_admit_at(now) {
                admissions.push(now);
            }

            assert!(manager.active_count() <= concurrency);
            manager.prune_at(now);
            assert!(manager.history_len() <= rate as usize);

            let in_window = admissions
                .iter()
                .filter(|t| now.saturating_duration_since(**t) <= interval)
                .count();
            assert!(in_window <= rate as usize);
        }

        assert!(!admissions.is_empty());
    }
}
