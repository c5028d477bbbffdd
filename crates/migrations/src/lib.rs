//! # day2ops-migrations
//!
//! Applies and reverts a fixed, linear chain of PostgreSQL revisions (roles,
//! schemas, grants, audit tables) and reports what happened.
//!
//! The crate is split the same way the work is:
//! - [`migrations`]: revision units, the embedded script set, the chain walker
//!   and the engine that executes or renders revisions
//! - [`runner`]: the per-invocation runner that checks the connection, resolves
//!   targets and shapes a [`MigrationResult`]
//! - [`database`]: short-lived connections, no pooling

pub mod database;
pub mod error;
pub mod migrations;
pub mod result;
pub mod runner;

pub use error::{MigrateResult, MigrationError};
pub use migrations::*;
pub use result::{MigrationResult, RevisionSummary};
pub use runner::{apply_day2_operations, MigrationRunner};
