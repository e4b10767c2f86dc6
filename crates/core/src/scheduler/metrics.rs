use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

/// Scheduler counters for monitoring
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    pub total_submitted: AtomicU64,
    pub total_admitted: AtomicU64,
    pub total_succeeded: AtomicU64,
    pub total_failed: AtomicU64,
    pub total_retried: AtomicU64,
    pub total_timeouts: AtomicU64,
    pub signature_failures: AtomicU64,
    pub total_cancelled: AtomicU64,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl SchedulerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submission(&self) {
        self.total_submitted.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Record an admission with the in-flight count after it.
    pub fn record_admission(&self, in_flight: usize) {
        self.total_admitted.fetch_add(1, AtomicOrdering::Relaxed);
        self.in_flight.store(in_flight, AtomicOrdering::Relaxed);
        self.update_peak(in_flight);
    }

    /// Record a released slot with the in-flight count after it.
    pub fn record_release(&self, in_flight: usize) {
        self.in_flight.store(in_flight, AtomicOrdering::Relaxed);
    }

    pub fn record_success(&self) {
        self.total_succeeded.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.total_failed.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.total_retried.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.total_timeouts.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_signature_failure(&self) {
        self.signature_failures.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_cancellation(&self, count: u64) {
        self.total_cancelled.fetch_add(count, AtomicOrdering::Relaxed);
    }

    fn update_peak(&self, current: usize) {
        let mut peak = self.peak_in_flight.load(AtomicOrdering::Relaxed);

        while current > peak {
            match self.peak_in_flight.compare_exchange_weak(
                peak,
                current,
                AtomicOrdering::Relaxed,
                AtomicOrdering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => peak = actual,
            }
        }
    }

    /// Get a snapshot of metrics
    pub fn snapshot(&self) -> SchedulerMetricsSnapshot {
        SchedulerMetricsSnapshot {
            total_submitted: self.total_submitted.load(AtomicOrdering::Relaxed),
            total_admitted: self.total_admitted.load(AtomicOrdering::Relaxed),
            total_succeeded: self.total_succeeded.load(AtomicOrdering::Relaxed),
            total_failed: self.total_failed.load(AtomicOrdering::Relaxed),
            total_retried: self.total_retried.load(AtomicOrdering::Relaxed),
            total_timeouts: self.total_timeouts.load(AtomicOrdering::Relaxed),
            signature_failures: self.signature_failures.load(AtomicOrdering::Relaxed),
            total_cancelled: self.total_cancelled.load(AtomicOrdering::Relaxed),
            in_flight: self.in_flight.load(AtomicOrdering::Relaxed),
            peak_in_flight: self.peak_in_flight.load(AtomicOrdering::Relaxed),
            success_rate: self.calculate_success_rate(),
        }
    }

    fn calculate_success_rate(&self) -> f64 {
        let succeeded = self.total_succeeded.load(AtomicOrdering::Relaxed);
        let failed = self.total_failed.load(AtomicOrdering::Relaxed);
        let total = succeeded + failed;

        if total == 0 {
            return 100.0;
        }

        (succeeded as f64 / total as f64) * 100.0
    }
}

/// Immutable metrics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerMetricsSnapshot {
    pub total_submitted: u64,
    pub total_admitted: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub total_retried: u64,
    pub total_timeouts: u64,
    pub signature_failures: u64,
    pub total_cancelled: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub success_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_tracks_highest_admission() {
        let metrics = SchedulerMetrics::new();
        metrics.record_admission(1);
        metrics.record_admission(3);
        metrics.record_release(2);
        metrics.record_admission(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_admitted, 3);
        assert_eq!(snapshot.in_flight, 3);
        assert_eq!(snapshot.peak_in_flight, 3);
    }

    #[test]
    fn success_rate_defaults_to_full() {
        let metrics = SchedulerMetrics::new();
        assert!((metrics.snapshot().success_rate - 100.0).abs() < f64::EPSILON);

        metrics.record_success();
        metrics.record_failure();
        assert!((metrics.snapshot().success_rate - 50.0).abs() < f64::EPSILON);
    }
}
