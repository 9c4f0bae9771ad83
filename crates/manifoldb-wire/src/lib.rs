//! `ManifoldDB` Wire Types
//!
//! This crate provides the data model and binary encodings shared by the
//! `ManifoldDB` remote client and its transports.
//!
//! # Overview
//!
//! - **Columns**: [`FieldData`] holds one named, typed column of a result. It
//!   supports range copy ([`FieldData::slice`]) and in-place extension
//!   ([`FieldData::append`]), which the client iterators use to split and
//!   merge pages.
//! - **Results**: [`QueryResults`] for scalar queries, [`SingleResult`] for one
//!   target vector's search hits.
//! - **Encodings**: binary16/bfloat16 conversions and the sparse vector pair
//!   list in [`encoding`].
//! - **Protocol**: request and response structs in [`protocol`].
//!
//! # Example
//!
//! ```
//! use manifoldb_wire::{FieldData, QueryResults};
//!
//! let page = QueryResults::new(
//!     vec![FieldData::int64("id", vec![1, 2, 3]), FieldData::varchar("title", vec!["a", "b", "c"])],
//!     ["title"],
//! )
//! .unwrap();
//!
//! let head = page.slice(0, 2).unwrap();
//! assert_eq!(head.row_count(), 2);
//! ```
//!
//! # Modules
//!
//! - [`types`] - Columns, results, schemas and enums
//! - [`encoding`] - Binary payload codecs
//! - [`protocol`] - RPC request/response contract
//! - [`error`] - Error types ([`WireError`])

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod encoding;
pub mod error;
pub mod protocol;
pub mod types;

// Re-export commonly used types
pub use error::{WireError, WireResult};
pub use types::{
    ArrayColumn, Column, ConsistencyLevel, DataType, FieldData, FieldSchema, MetricType,
    PrimaryKey, QueryResults, SingleResult, SparseVector,
};
