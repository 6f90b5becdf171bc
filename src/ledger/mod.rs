//! Job record persistence
//!
//! A [`JobRecord`] is the only piece of job state that outlives the process: it is
//! written when a job is accepted and read by the cleanup sweeper when the job's
//! archive expires. Two interchangeable backends implement [`JobRecordStore`]:
//!
//! - [`FileRecordStore`]: one JSON file per job in a directory
//! - [`FjallRecordStore`]: a `records` partition in an embedded fjall keyspace
//!
//! Both age out records through [`JobRecordStore::prune`], which the sweeper calls
//! with the configured retention horizon.

pub mod error;
pub mod file;
pub mod partitions;
pub mod record;
pub mod store;

use std::sync::Arc;

pub use error::{LedgerError, Result};
pub use file::FileRecordStore;
pub use record::{JobRecord, JobRecordStore};
pub use store::FjallRecordStore;

use crate::config::{RecordBackend, StorageConfig};

/// Open the backend selected by `storage.record_backend`
pub fn open_store(storage: &StorageConfig) -> Result<Arc<dyn JobRecordStore>> {
    let store: Arc<dyn JobRecordStore> = match storage.record_backend {
        RecordBackend::File => Arc::new(FileRecordStore::open(storage.record_dir())?),
        RecordBackend::Fjall => Arc::new(FjallRecordStore::open(&storage.fjall_path)?),
    };
    Ok(store)
}
