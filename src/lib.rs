pub mod api;
pub mod cleanup;
pub mod config;
pub mod humanize;
pub mod job;
pub mod ledger;
pub mod observability;
pub mod queue;
pub mod report;
pub mod worker;
