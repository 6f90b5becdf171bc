use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::Result;

/// The part of a job that must survive a restart so its expiry can still be reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub archive_name: String,
    pub callback_url: String,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(archive_name: impl Into<String>, callback_url: impl Into<String>) -> Self {
        Self {
            archive_name: archive_name.into(),
            callback_url: callback_url.into(),
            created_at: Utc::now(),
        }
    }
}

/// Persistence for [`JobRecord`]s, keyed by archive file name.
///
/// Implementations must tolerate concurrent `put` from running jobs alongside
/// `get`/`delete` from the sweeper; every operation touches a single key.
#[async_trait]
pub trait JobRecordStore: Send + Sync {
    async fn put(&self, record: &JobRecord) -> Result<()>;

    /// `Ok(None)` when no record exists for `archive_name`
    async fn get(&self, archive_name: &str) -> Result<Option<JobRecord>>;

    /// Deleting a missing record is not an error
    async fn delete(&self, archive_name: &str) -> Result<()>;

    /// Drop records written before `cutoff` unless `is_live` still claims their
    /// archive name, returning how many were removed
    async fn prune(
        &self,
        cutoff: DateTime<Utc>,
        is_live: &(dyn for<'s> Fn(&'s str) -> bool + Sync),
    ) -> Result<usize>;
}
