//! # Onboardly (live onboarding dashboard client)
//!
//! `onboardly` signs a user in against a hosted backend, mirrors four of its
//! tables in memory and keeps them current from row-level change events.
//!
//! ## Collections
//!
//! Employees, apps, onboarding records and activity entries are each held as
//! an ordered collection with at most one record per key. Inserts land in
//! front, updates replace in place and deletes of unknown keys do nothing.
//! The activity collection keeps only the newest entries.
//!
//! ## Lifecycle
//!
//! - **Gate:** no data is fetched until the identity service reports a user.
//! - **Load:** the four tables are read concurrently and applied all at once,
//!   or not at all.
//! - **Live:** one change subscription per table, each reconciled through a
//!   single writer. Unmounting closes them and drops anything that arrives
//!   later.
//!
//! Aggregates and CSV exports are computed from the current collections on
//! every read.

pub mod aggregates;
pub mod backend;
pub mod cli;
pub mod collection;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod model;
pub mod preferences;
pub mod session;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
