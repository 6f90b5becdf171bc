use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Advertised service status, surfaced through `/ping`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    #[default]
    Ready,
    Tardy,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Ready => "ready",
            ServiceStatus::Tardy => "tardy",
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub status: ServiceStatus,
    /// Alert mailbox reported by `/ping`
    #[serde(default)]
    pub alert: Option<String>,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
    /// Shared secret for request signatures (loaded from environment, never from file)
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            status: ServiceStatus::default(),
            alert: None,
            max_payload_bytes: default_max_payload_bytes(),
            token: None,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 13145))
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(5 * 1024 * 1024)
}

/// Which [`crate::ledger::JobRecordStore`] implementation backs job records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordBackend {
    #[default]
    File,
    Fjall,
}

/// Filesystem layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Base directory holding job directories and finished archives
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Archive names look like `<archive_prefix>_<epoch_millis>.tar`
    #[serde(default = "default_archive_prefix")]
    pub archive_prefix: String,
    #[serde(default)]
    pub record_backend: RecordBackend,
    /// Directory for file-backed records; defaults to the system temp dir
    #[serde(default)]
    pub record_dir: Option<PathBuf>,
    #[serde(default = "default_fjall_path")]
    pub fjall_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            archive_prefix: default_archive_prefix(),
            record_backend: RecordBackend::default(),
            record_dir: None,
            fjall_path: default_fjall_path(),
        }
    }
}

impl StorageConfig {
    pub fn record_dir(&self) -> PathBuf {
        self.record_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_archive_prefix() -> String {
    "hb".to_string()
}

fn default_fjall_path() -> PathBuf {
    PathBuf::from("data/records")
}

/// Image fetch behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Attempt `k` gets a timeout of `k * attempt_timeout_step_secs`
    #[serde(default = "default_attempt_timeout_step_secs")]
    pub attempt_timeout_step_secs: u64,
    #[serde(default = "default_inter_file_delay_ms")]
    pub inter_file_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_timeout_step_secs: default_attempt_timeout_step_secs(),
            inter_file_delay_ms: default_inter_file_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    pub fn attempt_timeout_step(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_step_secs)
    }

    pub fn inter_file_delay(&self) -> Duration {
        Duration::from_millis(self.inter_file_delay_ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_attempt_timeout_step_secs() -> u64 {
    10
}

fn default_inter_file_delay_ms() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0"
        .to_string()
}

/// Callback delivery
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_report_timeout_secs(),
        }
    }
}

impl ReportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_report_timeout_secs() -> u64 {
    10
}

/// Expiry sweep
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Records older than this are pruned even if their archive was never reported
    #[serde(default = "default_record_retention_hours")]
    pub record_retention_hours: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_hours: default_ttl_hours(),
            interval_secs: default_interval_secs(),
            record_retention_hours: default_record_retention_hours(),
        }
    }
}

impl CleanupConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_ttl_hours() -> u64 {
    12
}

fn default_interval_secs() -> u64 {
    60
}

fn default_record_retention_hours() -> u64 {
    24 * 7
}

/// Job dispatch limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:13145");
        assert_eq!(config.server.status, ServiceStatus::Ready);
        assert_eq!(config.storage.archive_prefix, "hb");
        assert_eq!(config.storage.record_backend, RecordBackend::File);
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.fetch.attempt_timeout_step(), Duration::from_secs(10));
        assert_eq!(config.cleanup.ttl_hours, 12);
        assert_eq!(config.cleanup.interval(), Duration::from_secs(60));
        assert_eq!(config.report.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_record_dir_falls_back_to_temp() {
        let storage = StorageConfig::default();
        assert_eq!(storage.record_dir(), std::env::temp_dir());
    }
}
