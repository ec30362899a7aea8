//! Database module: record models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: column-level write payloads and row decoding.
//! - `repo`: SQL-only functions, one generic set shared by every resource.
//!
//! Callers import from `school_cms::db`; the repository API is re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::ColumnValues;
