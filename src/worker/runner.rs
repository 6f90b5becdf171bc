//! Job runner - drives one board from admission to FIRST_STATUS

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

use super::admission::{AdmissionDenied, AdmissionGate};
use super::archive::{self, ArchiveError, ArchiveSummary, EXCLUDED_EXTENSIONS};
use super::http::{FetchContext, Fetcher, ShardReport};
use super::partition::{self, PartitionError};
use super::readme::Readme;
use crate::config::Config;
use crate::humanize::ByteSize;
use crate::job::DownloadJob;
use crate::observability::Metrics;
use crate::report::{FirstStatus, ReportEvent, Reporter};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("admission denied: {0}")]
    AdmissionDenied(#[from] AdmissionDenied),

    #[error("partition failed: {0}")]
    Partition(#[from] PartitionError),

    #[error("archive failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("archive task failed: {0}")]
    Join(#[from] JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    /// Line left in README.txt when the job stops before fetching
    pub fn readme_line(&self) -> String {
        match self {
            JobError::AdmissionDenied(e) => e.to_string(),
            JobError::Partition(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub archive: ArchiveSummary,
    pub shards: ShardReport,
    pub warnings: usize,
    pub elapsed_secs: u64,
    /// Whether FIRST_STATUS was acknowledged
    pub reported: bool,
}

pub struct JobRunner {
    download_dir: PathBuf,
    fetcher: Fetcher,
    gate: AdmissionGate,
    reporter: Reporter,
    metrics: Arc<Metrics>,
}

impl JobRunner {
    pub fn new(
        config: &Config,
        gate: AdmissionGate,
        reporter: Reporter,
        metrics: Arc<Metrics>,
    ) -> Result<Self, super::http::FetchError> {
        Ok(Self {
            download_dir: config.storage.download_dir.clone(),
            fetcher: Fetcher::new(config.fetch.clone(), gate.clone())?,
            gate,
            reporter,
            metrics,
        })
    }

    /// Run a job to completion, recording the outcome in metrics
    pub async fn run(&self, job: DownloadJob) -> Result<JobOutcome, JobError> {
        let result = self.execute(&job).await;
        match &result {
            Ok(outcome) => {
                self.metrics.job_archived(1);
                info!(
                    archive = %job.archive_name,
                    files = outcome.archive.files,
                    size = outcome.archive.size,
                    warnings = outcome.warnings,
                    dtime = outcome.elapsed_secs,
                    "Job finished"
                );
            }
            Err(e) => {
                self.metrics.job_failed(1);
                error!(archive = %job.archive_name, board = %job.board_id, error = %e, "Job failed");
            }
        }
        result
    }

    async fn execute(&self, job: &DownloadJob) -> Result<JobOutcome, JobError> {
        let job_dir = self.download_dir.join(&job.board_id);
        tokio::fs::create_dir_all(&job_dir).await?;

        let readme = Arc::new(Readme::new());

        let shards = match self.admit_and_partition(job).await {
            Ok(shards) => shards,
            Err(e) => {
                readme.push(e.readme_line()).await;
                readme.flush(&job_dir).await?;
                return Err(e);
            }
        };

        info!(
            archive = %job.archive_name,
            board = %job.board_id,
            shards = shards.len(),
            "Fetching board"
        );

        let started = Instant::now();
        let ctx = Arc::new(FetchContext {
            job_dir: job_dir.clone(),
            referer: job.site.referer(&job.board_id),
            disk_limit_percent: job.disk_limit_percent,
        });

        let mut tasks = JoinSet::new();
        for shard in shards {
            let fetcher = self.fetcher.clone();
            let ctx = ctx.clone();
            let readme = readme.clone();
            tasks.spawn(async move { fetcher.fetch_shard(&ctx, &shard, &readme).await });
        }

        let mut tally = ShardReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => tally.merge(report),
                Err(e) => {
                    warn!(error = %e, "Shard task aborted");
                    readme.push(format!("shard task aborted: {e}")).await;
                }
            }
        }
        let elapsed_secs = started.elapsed().as_secs();

        self.metrics.files_fetched(tally.fetched as u64);
        self.metrics.files_failed((tally.failed + tally.denied) as u64);

        let warnings = readme.flush(&job_dir).await?;
        if warnings > 0 {
            info!(archive = %job.archive_name, warnings, "Wrote README.txt");
        }

        let archive_path = self.download_dir.join(&job.archive_name);
        let summary = tokio::task::spawn_blocking(move || {
            archive::archive_dir(&job_dir, &archive_path, EXCLUDED_EXTENSIONS)
        })
        .await??;

        let event = ReportEvent::First(FirstStatus {
            uifn: job.archive_name.clone(),
            uifn_key: job.archive_key.clone(),
            size: ByteSize(summary.size).to_decimal_string(),
            dtime: elapsed_secs,
        });
        let reported = match self.reporter.send(&job.callback_url, &event).await {
            Ok(_) => true,
            Err(e) => {
                self.metrics.report_failed(1);
                warn!(archive = %job.archive_name, error = %e, "FIRST_STATUS not delivered");
                false
            }
        };

        Ok(JobOutcome {
            archive: summary,
            shards: tally,
            warnings,
            elapsed_secs,
            reported,
        })
    }

    async fn admit_and_partition(
        &self,
        job: &DownloadJob,
    ) -> Result<Vec<Vec<crate::job::ImageRef>>, JobError> {
        self.gate
            .check_async(&self.download_dir, job.disk_limit_percent)
            .await?;
        Ok(partition::partition(&job.pins, job.max_pin_count)?)
    }
}
