//! HTTP client for fetching board images

use reqwest::Client;
use reqwest::header::{REFERER, USER_AGENT};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::admission::AdmissionGate;
use super::readme::Readme;
use crate::config::FetchConfig;
use crate::job::{ImageRef, is_safe_component};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsafe image name: {0:?}")]
    UnsafeName(String),

    #[error("failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Timeout for the 1-based `attempt`
pub fn attempt_timeout(step: Duration, attempt: u32) -> Duration {
    step * attempt
}

/// Where and how one job's images are fetched
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub job_dir: PathBuf,
    pub referer: String,
    pub disk_limit_percent: f64,
}

/// Per-shard tally
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShardReport {
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Files not attempted because the disk was over its limit
    pub denied: usize,
}

impl ShardReport {
    pub fn merge(&mut self, other: ShardReport) {
        self.fetched += other.fetched;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.denied += other.denied;
    }
}

/// Image fetcher shared by all shard tasks
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    gate: AdmissionGate,
}

impl Fetcher {
    pub fn new(config: FetchConfig, gate: AdmissionGate) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.attempt_timeout_step())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            gate,
        })
    }

    /// Fetch every image of a shard sequentially
    pub async fn fetch_shard(
        &self,
        ctx: &FetchContext,
        shard: &[ImageRef],
        readme: &Readme,
    ) -> ShardReport {
        let mut report = ShardReport::default();

        for pin in shard {
            if !is_safe_component(&pin.file_name) {
                warn!(name = %pin.file_name, "Skipping image with unsafe name");
                readme
                    .push(FetchError::UnsafeName(pin.file_name.clone()).to_string())
                    .await;
                report.failed += 1;
                continue;
            }

            let target = ctx.job_dir.join(&pin.file_name);
            if fs::try_exists(&target).await.unwrap_or(false) {
                report.skipped += 1;
                continue;
            }

            if let Err(e) = self
                .gate
                .check_async(&ctx.job_dir, ctx.disk_limit_percent)
                .await
            {
                warn!(name = %pin.file_name, error = %e, "Skipping image on disk pressure");
                readme.push(e.to_string()).await;
                report.denied += 1;
                continue;
            }

            match self.fetch_one(&ctx.referer, &pin.source_url, &target).await {
                Ok(bytes) => {
                    debug!(name = %pin.file_name, bytes, "Image stored");
                    report.fetched += 1;
                }
                Err(e) => {
                    readme
                        .push(format!("{} ({}): {}", pin.file_name, pin.source_url, e))
                        .await;
                    report.failed += 1;
                }
            }

            tokio::time::sleep(self.config.inter_file_delay()).await;
        }

        report
    }

    /// Fetch one image with retry, growing the timeout each attempt
    pub async fn fetch_one(&self, referer: &str, url: &str, target: &Path) -> Result<u64> {
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_attempts {
            let timeout = attempt_timeout(self.config.attempt_timeout_step(), attempt);

            match self.fetch_once(referer, url, target, timeout).await {
                Ok(bytes) => {
                    if attempt > 1 {
                        debug!(url, attempt, "Fetch succeeded after retry");
                    }
                    return Ok(bytes);
                }
                Err(e) => {
                    warn!(url, attempt, error = %e, "Fetch attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(FetchError::Exhausted {
            attempts: self.config.max_attempts,
            last: last_error,
        })
    }

    /// Stream one response into `<target>.lock`, then move it into place
    async fn fetch_once(
        &self,
        referer: &str,
        url: &str,
        target: &Path,
        timeout: Duration,
    ) -> Result<u64> {
        let partial = lock_path(target);

        let result = self.stream_to(referer, url, &partial, timeout).await;
        match result {
            Ok(bytes) => {
                fs::rename(&partial, target).await?;
                Ok(bytes)
            }
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                Err(e)
            }
        }
    }

    async fn stream_to(
        &self,
        referer: &str,
        url: &str,
        partial: &Path,
        timeout: Duration,
    ) -> Result<u64> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::RequestFailed(e.to_string())
            }
        };

        let mut response = self
            .client
            .get(url)
            .header(REFERER, referer)
            .header(USER_AGENT, &self.config.user_agent)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let mut file = fs::File::create(partial).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(map_err)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

fn lock_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}
