use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info, warn};

use super::error::Result;
use super::partitions::{decode_record_key, encode_record_key};
use super::record::{JobRecord, JobRecordStore};

/// Fjall-backed job records, for deployments that keep state in an embedded KV store
#[derive(Clone)]
pub struct FjallRecordStore {
    keyspace: Keyspace,
    records: PartitionHandle,
}

impl FjallRecordStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening Fjall record store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let records = keyspace.open_partition("records", PartitionCreateOptions::default())?;

        Ok(Self { keyspace, records })
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    #[cfg(test)]
    fn len(&self) -> Result<usize> {
        let mut count = 0;
        for item in self.records.iter() {
            item?;
            count += 1;
        }
        Ok(count)
    }

    #[cfg(test)]
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl JobRecordStore for FjallRecordStore {
    async fn put(&self, record: &JobRecord) -> Result<()> {
        let key = encode_record_key(&record.archive_name)?;
        let value = serde_json::to_vec(record)?;
        self.records.insert(key, value)?;
        debug!(archive = %record.archive_name, "Stored job record");
        Ok(())
    }

    async fn get(&self, archive_name: &str) -> Result<Option<JobRecord>> {
        let key = encode_record_key(archive_name)?;
        match self.records.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, archive_name: &str) -> Result<()> {
        let key = encode_record_key(archive_name)?;
        self.records.remove(key)?;
        debug!(archive = %archive_name, "Deleted job record");
        Ok(())
    }

    async fn prune(
        &self,
        cutoff: DateTime<Utc>,
        is_live: &(dyn for<'s> Fn(&'s str) -> bool + Sync),
    ) -> Result<usize> {
        let mut stale = Vec::new();

        for item in self.records.iter() {
            let (key, value) = item?;
            match serde_json::from_slice::<JobRecord>(&value) {
                Ok(record) if record.created_at < cutoff && !is_live(&record.archive_name) => {
                    stale.push(key)
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(key = ?decode_record_key(&key), error = %e, "Dropping undecodable record");
                    stale.push(key);
                }
            }
        }

        let pruned = stale.len();
        for key in stale {
            self.records.remove(key)?;
        }

        if pruned > 0 {
            self.persist()?;
            info!(pruned, "Pruned stale job records");
        }
        Ok(pruned)
    }
}
