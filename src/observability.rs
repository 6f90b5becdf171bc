//! Process-wide counters and tracing setup

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, honouring `RUST_LOG` (default `info`)
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_accepted: AtomicU64,
    jobs_rejected: AtomicU64,
    jobs_archived: AtomicU64,
    jobs_failed: AtomicU64,
    files_fetched: AtomicU64,
    files_failed: AtomicU64,
    reports_failed: AtomicU64,
    archives_expired: AtomicU64,
}

macro_rules! counter {
    ($name:ident, $field:ident) => {
        pub fn $name(&self, n: u64) {
            self.$field.fetch_add(n, Ordering::Relaxed);
            tracing::trace!(counter = stringify!($field), n, "Metric incremented");
        }
    };
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(job_accepted, jobs_accepted);
    counter!(job_rejected, jobs_rejected);
    counter!(job_archived, jobs_archived);
    counter!(job_failed, jobs_failed);
    counter!(files_fetched, files_fetched);
    counter!(files_failed, files_failed);
    counter!(report_failed, reports_failed);
    counter!(archive_expired, archives_expired);

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_accepted: self.jobs_accepted.load(Ordering::Relaxed),
            jobs_rejected: self.jobs_rejected.load(Ordering::Relaxed),
            jobs_archived: self.jobs_archived.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            files_fetched: self.files_fetched.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            reports_failed: self.reports_failed.load(Ordering::Relaxed),
            archives_expired: self.archives_expired.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub jobs_accepted: u64,
    pub jobs_rejected: u64,
    pub jobs_archived: u64,
    pub jobs_failed: u64,
    pub files_fetched: u64,
    pub files_failed: u64,
    pub reports_failed: u64,
    pub archives_expired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.job_accepted(1);
        metrics.job_accepted(1);
        metrics.files_fetched(5);
        metrics.report_failed(1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_accepted, 2);
        assert_eq!(snapshot.files_fetched, 5);
        assert_eq!(snapshot.reports_failed, 1);
        assert_eq!(snapshot.jobs_failed, 0);
    }
}
