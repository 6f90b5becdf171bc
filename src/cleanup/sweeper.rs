use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::ledger::JobRecordStore;
use crate::observability::Metrics;
use crate::report::{ReportEvent, Reporter, SecondStatus};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("cannot list download directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Epoch millis embedded in `<prefix>_<millis>.tar`
pub fn parse_archive_name(name: &str, prefix: &str) -> Option<i64> {
    let stem = name.strip_suffix(".tar")?;
    let millis = stem.strip_prefix(prefix)?.strip_prefix('_')?;
    if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    millis.parse().ok()
}

/// Both the creation time in the name and the file's mtime must be at least
/// `ttl_hours` old
pub fn is_expired(created_ms: i64, modified_secs: i64, ttl_hours: u64, now_secs: i64) -> bool {
    let Some(ttl) = ttl_hours.checked_mul(3600).and_then(|s| i64::try_from(s).ok()) else {
        return false;
    };
    let reached = |start: i64| start.checked_add(ttl).is_some_and(|end| end <= now_secs);
    reached(created_ms / 1000) && reached(modified_secs)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub scanned: usize,
    pub expired: usize,
    pub cleaned: usize,
    pub missing_record: usize,
    pub report_failed: usize,
    pub records_pruned: usize,
}

pub struct Sweeper {
    download_dir: PathBuf,
    prefix: String,
    ttl_hours: u64,
    retention_hours: u64,
    store: Arc<dyn JobRecordStore>,
    reporter: Reporter,
    metrics: Arc<Metrics>,
}

impl Sweeper {
    pub fn new(
        config: &Config,
        store: Arc<dyn JobRecordStore>,
        reporter: Reporter,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            download_dir: config.storage.download_dir.clone(),
            prefix: config.storage.archive_prefix.clone(),
            ttl_hours: config.cleanup.ttl_hours,
            retention_hours: config.cleanup.record_retention_hours,
            store,
            reporter,
            metrics,
        }
    }

    /// One pass over the download directory as of `now`
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepStats, SweepError> {
        let mut stats = SweepStats::default();
        let now_secs = now.timestamp();
        let mut entries = tokio::fs::read_dir(&self.download_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(created_ms) = parse_archive_name(name, &self.prefix) else {
                continue;
            };
            stats.scanned += 1;

            let modified_secs = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(mtime) => mtime
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or(Duration::ZERO)
                    .as_secs() as i64,
                Err(e) => {
                    warn!(archive = name, error = %e, "Cannot read archive mtime");
                    continue;
                }
            };
            if !is_expired(created_ms, modified_secs, self.ttl_hours, now_secs) {
                continue;
            }
            stats.expired += 1;

            let record = match self.store.get(name).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    warn!(archive = name, "Expired archive has no job record, leaving it");
                    stats.missing_record += 1;
                    continue;
                }
                Err(e) => {
                    error!(archive = name, error = %e, "Failed to read job record");
                    stats.missing_record += 1;
                    continue;
                }
            };

            let event = ReportEvent::Second(SecondStatus {
                uifn: name.to_string(),
            });
            if let Err(e) = self.reporter.send(&record.callback_url, &event).await {
                warn!(archive = name, error = %e, "SECOND_STATUS not delivered, retrying next sweep");
                self.metrics.report_failed(1);
                stats.report_failed += 1;
                continue;
            }

            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                error!(archive = name, error = %e, "Failed to delete expired archive");
                continue;
            }
            if let Err(e) = self.store.delete(name).await {
                warn!(archive = name, error = %e, "Failed to delete job record");
            }

            info!(archive = name, "Expired archive removed");
            self.metrics.archive_expired(1);
            stats.cleaned += 1;
        }

        let cutoff = i64::try_from(self.retention_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .and_then(|retention| now.checked_sub_signed(retention));
        if let Some(cutoff) = cutoff {
            // an archive on disk still owes a SECOND_STATUS, so its record stays
            let download_dir = &self.download_dir;
            let is_live = |name: &str| download_dir.join(name).exists();
            match self.store.prune(cutoff, &is_live).await {
                Ok(pruned) => stats.records_pruned = pruned,
                Err(e) => warn!(error = %e, "Failed to prune job records"),
            }
        }

        Ok(stats)
    }

    /// Sweep every `interval` until `shutdown` flips to true
    pub async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(
            dir = %self.download_dir.display(),
            ttl_hours = self.ttl_hours,
            interval_secs = interval.as_secs(),
            "Cleanup sweeper started"
        );

        loop {
            match self.sweep_once(Utc::now()).await {
                Ok(stats) if stats.expired > 0 || stats.records_pruned > 0 => {
                    info!(?stats, "Sweep finished");
                }
                Ok(stats) => debug!(?stats, "Sweep finished"),
                Err(e) => error!(error = %e, "Sweep failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    info!("Cleanup sweeper stopping");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_archive_name() {
        assert_eq!(parse_archive_name("hb_1700000000000.tar", "hb"), Some(1_700_000_000_000));
        assert_eq!(parse_archive_name("hb_1.tar", "hb"), Some(1));
        assert_eq!(parse_archive_name("xx_1700000000000.tar", "hb"), None);
        assert_eq!(parse_archive_name("hb_1700000000000.zip", "hb"), None);
        assert_eq!(parse_archive_name("hb_.tar", "hb"), None);
        assert_eq!(parse_archive_name("hb_12a.tar", "hb"), None);
        assert_eq!(parse_archive_name("hb1700.tar", "hb"), None);
        assert_eq!(parse_archive_name("README.txt", "hb"), None);
    }

    #[test]
    fn test_expiry_boundary_is_one_second() {
        let ttl_hours = 12;
        let ttl = 12 * 3600;
        let created_secs = 1_700_000_000;
        let created_ms = created_secs * 1000;

        assert!(is_expired(created_ms, created_secs, ttl_hours, created_secs + ttl));
        assert!(!is_expired(created_ms, created_secs, ttl_hours, created_secs + ttl - 1));
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let now = 1_700_000_000;
        assert!(!is_expired(0, 0, u64::MAX, now));
        assert!(!is_expired(0, 0, u64::MAX / 3600, now));
    }

    #[test]
    fn test_expiry_needs_both_clocks() {
        let created_secs = 1_700_000_000;
        let now = created_secs + 13 * 3600;

        // recently touched file stays even though the name is old
        assert!(!is_expired(created_secs * 1000, now - 60, 12, now));
        // name in the future keeps an old file
        assert!(!is_expired(now * 1000, created_secs, 12, now));
        assert!(is_expired(created_secs * 1000, created_secs, 12, now));
    }
}
