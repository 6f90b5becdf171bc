use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, info, warn};

use super::error::Result;
use super::partitions::{archive_name_from_file, record_file_name};
use super::record::{JobRecord, JobRecordStore};

/// One JSON file per job, `.{archive_name}.dat`, inside a single directory
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    dir: PathBuf,
}

impl FileRecordStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        info!("Using file record store at: {}", dir.display());
        Ok(Self { dir })
    }

    fn path_for(&self, archive_name: &str) -> Result<PathBuf> {
        Ok(self.dir.join(record_file_name(archive_name)?))
    }
}

#[async_trait]
impl JobRecordStore for FileRecordStore {
    async fn put(&self, record: &JobRecord) -> Result<()> {
        let path = self.path_for(&record.archive_name)?;
        let staging = path.with_extension("dat.tmp");

        fs::write(&staging, serde_json::to_vec(record)?).await?;
        fs::rename(&staging, &path).await?;

        debug!(archive = %record.archive_name, path = %path.display(), "Stored job record");
        Ok(())
    }

    async fn get(&self, archive_name: &str) -> Result<Option<JobRecord>> {
        let path = self.path_for(archive_name)?;
        match fs::read(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, archive_name: &str) -> Result<()> {
        let path = self.path_for(archive_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(archive = %archive_name, "Deleted job record");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn prune(
        &self,
        cutoff: DateTime<Utc>,
        is_live: &(dyn for<'s> Fn(&'s str) -> bool + Sync),
    ) -> Result<usize> {
        let mut pruned = 0;
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(archive_name) = file_name.to_str().and_then(archive_name_from_file) else {
                continue;
            };

            let stale = match self.get(archive_name).await {
                Ok(Some(record)) => record.created_at < cutoff && !is_live(archive_name),
                Ok(None) => false,
                Err(e) => {
                    warn!(archive = %archive_name, error = %e, "Unreadable job record");
                    false
                }
            };

            if stale {
                self.delete(archive_name).await?;
                pruned += 1;
            }
        }

        if pruned > 0 {
            info!(pruned, "Pruned stale job records");
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerError;
    use chrono::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let temp = TempDir::new().unwrap();
        let store = FileRecordStore::open(temp.path()).unwrap();
        let record = JobRecord::new("hb_1700000000000.tar", "http://cb.example/api");

        store.put(&record).await.unwrap();
        assert!(temp.path().join(".hb_1700000000000.tar.dat").is_file());
        assert_eq!(store.get(&record.archive_name).await.unwrap(), Some(record.clone()));

        store.delete(&record.archive_name).await.unwrap();
        assert!(store.get(&record.archive_name).await.unwrap().is_none());
        // second delete is a no-op
        store.delete(&record.archive_name).await.unwrap();
    }

    #[tokio::test]
    async fn test_overwrite_keeps_latest() {
        let temp = TempDir::new().unwrap();
        let store = FileRecordStore::open(temp.path()).unwrap();

        store.put(&JobRecord::new("hb_1.tar", "http://old")).await.unwrap();
        store.put(&JobRecord::new("hb_1.tar", "http://new")).await.unwrap();

        let loaded = store.get("hb_1.tar").await.unwrap().unwrap();
        assert_eq!(loaded.callback_url, "http://new");
    }

    #[tokio::test]
    async fn test_rejects_unsafe_key() {
        let temp = TempDir::new().unwrap();
        let store = FileRecordStore::open(temp.path()).unwrap();

        let result = store.get("../../etc/passwd").await;
        assert!(matches!(result, Err(LedgerError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_prune_ignores_foreign_files() {
        let temp = TempDir::new().unwrap();
        let store = FileRecordStore::open(temp.path()).unwrap();

        let mut old = JobRecord::new("hb_1.tar", "http://cb");
        old.created_at = Utc::now() - Duration::days(30);
        store.put(&old).await.unwrap();
        store.put(&JobRecord::new("hb_2.tar", "http://cb")).await.unwrap();
        std::fs::write(temp.path().join("unrelated.txt"), b"x").unwrap();

        let pruned = store.prune(Utc::now() - Duration::days(7), &|_| false).await.unwrap();
        assert_eq!(pruned, 1);
        assert!(store.get("hb_2.tar").await.unwrap().is_some());
        assert!(temp.path().join("unrelated.txt").exists());
    }

    #[tokio::test]
    async fn test_prune_keeps_live_records() {
        let temp = TempDir::new().unwrap();
        let store = FileRecordStore::open(temp.path()).unwrap();

        let mut old = JobRecord::new("hb_1.tar", "http://cb");
        old.created_at = Utc::now() - Duration::days(30);
        store.put(&old).await.unwrap();

        let pruned = store
            .prune(Utc::now() - Duration::days(7), &|name| name == "hb_1.tar")
            .await
            .unwrap();
        assert_eq!(pruned, 0);
        assert!(store.get("hb_1.tar").await.unwrap().is_some());
    }
}
