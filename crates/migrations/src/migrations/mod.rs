//! Migration System
//!
//! Revision units and their SQL, the chain that orders them, and the engine
//! that applies (`upgrade`) or reverses (`downgrade`) them.

pub mod chain;
pub mod definitions;
pub mod engine;
pub mod manager;
pub mod rollback;

pub use chain::RevisionChain;
pub use definitions::*;
pub use engine::MigrationEngine;
pub use manager::{split_sql_statements, ScriptSet};
