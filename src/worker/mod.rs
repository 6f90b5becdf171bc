//! Board download pipeline
//!
//! A job moves through admission, partitioning, parallel shard fetch, archiving
//! and the FIRST_STATUS report. [`JobRunner`] drives those steps; the pieces live
//! in their own modules so they can be exercised alone.

pub mod admission;
pub mod archive;
pub mod http;
pub mod partition;
pub mod readme;
pub mod runner;

pub use admission::{AdmissionDenied, AdmissionGate, DiskUsage, Fs2DiskUsage};
pub use archive::{ArchiveError, ArchiveSummary};
pub use http::{FetchError, Fetcher};
pub use partition::PartitionError;
pub use readme::Readme;
pub use runner::{JobError, JobOutcome, JobRunner};
