//! Table reading entrypoints and implementations.
//!
//! Most callers should use [`read_table_from_path`] (from [`unified`]) which:
//!
//! - auto-detects format by file extension (or you can override via [`ReadOptions`])
//! - reads the file into an in-memory [`crate::types::RawTable`], every cell kept as text
//! - optionally stops after a bounded prefix of rows
//!
//! Format-specific functions are also available under:
//! - [`csv`]
//! - [`parquet`]
//! - `excel` (cargo feature `excel`)

pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub mod parquet;
pub mod unified;

pub use unified::{read_table_from_path, FileFormat, ReadOptions, SUPPORTED_EXTENSIONS};
