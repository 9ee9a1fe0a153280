//! Relational view of symbols for point queries the graph cannot serve
//! directly: find-by-error-string, find-by-raise-type, find-by-mutates.
//!
//! One row per indexable symbol (function/method/class), keyed by
//! `(file_path, symbol_name)`, with JSON-encoded list columns. The
//! `called_by` column is always the inversion of `calls` across the whole
//! table, recomputed as a second pass after inserts.

pub mod entry;
pub mod errors;
pub mod schema;
pub mod store;

pub use entry::IndexEntry;
pub use errors::IndexError;
pub use store::CodeIndex;
