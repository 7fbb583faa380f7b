#![forbid(unsafe_code)]
//! splitscan-core: value/column/batch types, row types, filters, and configs
//! shared by every other crate in the workspace.
//!
//! Nothing here knows about connectors or splits. Connectors produce
//! `RowBatch`es described by a `Schema`; the engine side consumes them.

pub mod budget;
pub mod config;
pub mod error;
pub mod filter;
pub mod hash;
pub mod prelude;
pub mod schema;
pub mod types;

/// Crate version, stamped into CLI output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
