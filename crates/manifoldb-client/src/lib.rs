//! `ManifoldDB` Remote Client
//!
//! A paginating, retrying client for a remote `ManifoldDB` vector-search
//! service. The server caps every response at 16384 rows; this crate turns one
//! logical query or search into an ordered, duplicate-free sequence of bounded
//! RPCs.
//!
//! # Features
//!
//! - **Query iteration**: walk any number of rows in primary-key order, with
//!   offsets beyond the server page size
//! - **Search iteration**: continuation tokens on servers that issue them,
//!   score-range probing on servers that do not
//! - **Retries**: exponential backoff for rate limits and transient transport
//!   failures, with a count and a time budget
//! - **Session consistency**: reads observe the client's own writes through a
//!   shared [`TimestampRegistry`]
//!
//! # Quick Start
//!
//! The transport is any [`VectorService`] implementation.
//!
//! ```ignore
//! use manifoldb_client::{Client, ClientConfig, QueryIteratorArguments};
//! use manifoldb_wire::{DataType, FieldSchema};
//!
//! let client = Client::new(service, ClientConfig::new().database("analytics"));
//!
//! let args = QueryIteratorArguments::new("docs", FieldSchema::primary_key("id", DataType::Int64))
//!     .with_filter("year > 2020")
//!     .with_output_field("title")
//!     .with_batch_size(500)
//!     .with_offset(20_000);
//!
//! for batch in client.query_iterator(args)? {
//!     for row in batch?.rows() {
//!         println!("{row:?}");
//!     }
//! }
//! ```
//!
//! ## Searching
//!
//! ```ignore
//! use manifoldb_client::{SearchArguments, SearchIteratorArguments};
//! use manifoldb_wire::MetricType;
//!
//! let mut search = SearchArguments::new("docs")
//!     .with_anns_field("embedding")
//!     .with_metric_type(MetricType::L2);
//! search.add_float_vector(vec![0.1, 0.2, 0.3])?;
//!
//! let mut hits = client.search_iterator(SearchIteratorArguments::new(search, pk).with_limit(5000))?;
//! loop {
//!     let batch = hits.next_batch()?;
//!     if batch.is_empty() {
//!         break;
//!     }
//!     println!("{} hits, scores {:?}", batch.row_count(), batch.scores());
//! }
//! ```
//!
//! # Modules
//!
//! - [`client`] - The [`Client`] facade
//! - [`iterator`] - Query and search iterators
//! - [`dql`] - Read arguments, request builders and response conversion
//! - [`retry`] - Retry policy and executor
//! - [`timestamp`] - Session timestamps
//! - [`service`] - The transport trait
//! - [`error`] - Error types

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod client;
pub mod config;
pub mod dql;
pub mod error;
pub mod iterator;
pub mod pipeline;
pub mod retry;
pub mod service;
pub mod timestamp;

// Public API re-exports
pub use client::Client;
pub use config::ClientConfig;
pub use dql::{
    DqlOptions, DqlRequest, QueryArguments, QueryIteratorArguments, SearchArguments,
    SearchIteratorArguments,
};
pub use error::{Error, ErrorKind, Result};
pub use iterator::{
    IteratorState, QueryIterator, SearchIterator, SearchIteratorV1, SearchIteratorV2,
    MAX_BATCH_SIZE, MAX_PROBE_ATTEMPTS, MAX_TIED_IDS,
};
pub use retry::{RetryPolicy, RpcFailure};
pub use service::VectorService;
pub use timestamp::TimestampRegistry;

// Re-export the wire types callers need to build requests and read results
pub use manifoldb_wire::{
    ConsistencyLevel, DataType, FieldData, FieldSchema, MetricType, PrimaryKey, QueryResults,
    SingleResult, SparseVector,
};
