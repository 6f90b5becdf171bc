//! Disk-pressure admission checks

use std::io;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AdmissionDenied {
    #[error("disk usage is too high ({used:.2}% > {limit}%)")]
    OverLimit { used: f64, limit: f64 },

    #[error("disk usage unavailable: {0}")]
    Sampling(#[source] io::Error),
}

/// Source of filesystem usage readings
pub trait DiskUsage: Send + Sync {
    /// Used space, in percent, of the filesystem containing `path`
    fn used_percent(&self, path: &Path) -> io::Result<f64>;
}

/// Reads usage through `statvfs`/`GetDiskFreeSpaceEx` via fs2
#[derive(Debug, Default, Clone, Copy)]
pub struct Fs2DiskUsage;

impl DiskUsage for Fs2DiskUsage {
    fn used_percent(&self, path: &Path) -> io::Result<f64> {
        let total = fs2::total_space(path)?;
        let available = fs2::available_space(path)?;
        if total == 0 {
            return Err(io::Error::other("filesystem reports zero capacity"));
        }
        let used = total.saturating_sub(available) as f64 / total as f64 * 100.0;
        Ok((used * 100.0).round() / 100.0)
    }
}

/// Decides whether there is room to keep downloading
#[derive(Clone)]
pub struct AdmissionGate {
    disk: Arc<dyn DiskUsage>,
}

impl AdmissionGate {
    pub fn new(disk: Arc<dyn DiskUsage>) -> Self {
        Self { disk }
    }

    /// Returns the sampled usage when it is at or below `limit_percent`.
    /// A failed sample denies.
    pub fn check(&self, path: &Path, limit_percent: f64) -> Result<f64, AdmissionDenied> {
        let used = self
            .disk
            .used_percent(path)
            .map_err(AdmissionDenied::Sampling)?;

        debug!(path = %path.display(), used, limit = limit_percent, "Sampled disk usage");

        if used > limit_percent {
            return Err(AdmissionDenied::OverLimit {
                used,
                limit: limit_percent,
            });
        }
        Ok(used)
    }

    /// [`check`](Self::check) on the blocking pool, for callers on async tasks
    pub async fn check_async(
        &self,
        path: &Path,
        limit_percent: f64,
    ) -> Result<f64, AdmissionDenied> {
        let gate = self.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || gate.check(&path, limit_percent))
            .await
            .map_err(|e| AdmissionDenied::Sampling(io::Error::other(e)))?
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays a fixed reading, or an error when `None`
    pub(crate) struct FixedUsage(pub Mutex<Option<f64>>);

    impl FixedUsage {
        pub(crate) fn gate(reading: Option<f64>) -> AdmissionGate {
            AdmissionGate::new(Arc::new(FixedUsage(Mutex::new(reading))))
        }
    }

    impl DiskUsage for FixedUsage {
        fn used_percent(&self, _path: &Path) -> io::Result<f64> {
            self.0
                .lock()
                .unwrap()
                .ok_or_else(|| io::Error::other("sampling failed"))
        }
    }

    #[test]
    fn test_allows_below_and_at_limit() {
        let path = Path::new(".");
        assert_eq!(FixedUsage::gate(Some(10.0)).check(path, 90.0).unwrap(), 10.0);
        assert_eq!(FixedUsage::gate(Some(90.0)).check(path, 90.0).unwrap(), 90.0);
    }

    #[test]
    fn test_denies_above_limit() {
        let result = FixedUsage::gate(Some(90.01)).check(Path::new("."), 90.0);
        assert!(matches!(result, Err(AdmissionDenied::OverLimit { .. })));
        assert!(result.unwrap_err().to_string().starts_with("disk usage is too high"));
    }

    #[test]
    fn test_sampling_error_denies() {
        let result = FixedUsage::gate(None).check(Path::new("."), 100.0);
        assert!(matches!(result, Err(AdmissionDenied::Sampling(_))));
    }

    #[tokio::test]
    async fn test_check_async_matches_check() {
        let gate = FixedUsage::gate(Some(95.0));
        let result = gate.check_async(Path::new("."), 90.0).await;
        assert!(matches!(result, Err(AdmissionDenied::OverLimit { .. })));
        assert_eq!(gate.check_async(Path::new("."), 95.0).await.unwrap(), 95.0);
    }

    #[test]
    fn test_fs2_reads_real_filesystem() {
        let temp = tempfile::TempDir::new().unwrap();
        let used = Fs2DiskUsage.used_percent(temp.path()).unwrap();
        assert!((0.0..=100.0).contains(&used));
    }
}
