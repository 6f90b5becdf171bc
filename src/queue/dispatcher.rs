use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::job::DownloadJob;
use crate::worker::JobRunner;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch queue is full ({capacity} jobs waiting)")]
    QueueFull { capacity: usize },

    #[error("dispatcher is not running")]
    Closed,
}

/// Something that can carry a job to completion
#[async_trait]
pub trait JobExecutor: Send + Sync + 'static {
    async fn execute(&self, job: DownloadJob);
}

#[async_trait]
impl JobExecutor for JobRunner {
    async fn execute(&self, job: DownloadJob) {
        // outcome is logged and counted by the runner
        let _ = self.run(job).await;
    }
}

/// JobDispatcher hands accepted jobs to a bounded pool of running jobs
///
/// Architecture:
/// 1. API calls `dispatcher.submit(job)` after the job record is persisted
/// 2. The job lands in a bounded channel; a full channel is rejected, never awaited
/// 3. [`DispatchLoop`] pulls jobs and spawns each once a semaphore permit is free
pub struct JobDispatcher {
    tx: mpsc::Sender<DownloadJob>,
    capacity: usize,
}

impl JobDispatcher {
    /// Returns the dispatcher (for the API) and the loop that must be spawned
    pub fn new(
        executor: Arc<dyn JobExecutor>,
        config: &DispatchConfig,
    ) -> (Self, DispatchLoop) {
        info!(
            max_concurrent_jobs = config.max_concurrent_jobs,
            queue_capacity = config.queue_capacity,
            "Creating job dispatcher"
        );

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let dispatcher = Self {
            tx,
            capacity: config.queue_capacity,
        };
        let worker = DispatchLoop {
            rx,
            executor,
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
        };

        (dispatcher, worker)
    }

    pub fn submit(&self, job: DownloadJob) -> Result<(), DispatchError> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(archive = %job.archive_name, "Dispatch queue full, rejecting job");
                Err(DispatchError::QueueFull {
                    capacity: self.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DispatchError::Closed),
        }
    }

    /// Jobs waiting for a free slot
    pub fn queued(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn health_check(&self) -> bool {
        !self.tx.is_closed()
    }
}

pub struct DispatchLoop {
    rx: mpsc::Receiver<DownloadJob>,
    executor: Arc<dyn JobExecutor>,
    permits: Arc<Semaphore>,
}

impl DispatchLoop {
    /// Runs until every [`JobDispatcher`] handle is dropped
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            let Ok(permit) = self.permits.clone().acquire_owned().await else {
                break;
            };
            debug!(archive = %job.archive_name, "Starting job");

            let executor = self.executor.clone();
            tokio::spawn(async move {
                let _permit = permit;
                executor.execute(job).await;
            });
        }
        info!("Dispatch loop stopped");
    }
}
