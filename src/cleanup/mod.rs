//! Expiry of finished archives
//!
//! The sweeper lists the download directory, picks archives whose embedded
//! creation time and mtime are both past the TTL, reports SECOND_STATUS to the
//! job's callback and only then deletes the archive and its record. A failed
//! report leaves everything in place for the next pass.

pub mod sweeper;

pub use sweeper::{SweepError, SweepStats, Sweeper, is_expired, parse_archive_name};
