//! RPC request/response contract.
//!
//! These structs are what the client hands to and receives from a transport.
//! They mirror the fields of the remote service that the pagination layer
//! reads or writes; everything else about the wire encoding belongs to the
//! transport.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ConsistencyLevel, FieldData, PrimaryKey};

/// Request parameter keys.
pub mod keys {
    /// Marks a query or search as part of an iteration ("True"/"False").
    pub const ITERATOR: &str = "iterator";
    /// Lets the server stop reducing once the best rows are known ("True"/"False").
    pub const REDUCE_STOP_FOR_BEST: &str = "reduce_stop_for_best";
    /// Collection id, sent when known.
    pub const COLLECTION_ID: &str = "collection_id";
    /// Row limit of a query.
    pub const LIMIT: &str = "limit";
    /// Row offset of a query or search.
    pub const OFFSET: &str = "offset";
    /// Row limit of a search.
    pub const TOPK: &str = "topk";
    /// Outer score bound of a range search.
    pub const RADIUS: &str = "radius";
    /// Inner score bound of a range search.
    pub const RANGE_FILTER: &str = "range_filter";
    /// Vector field to search.
    pub const ANNS_FIELD: &str = "anns_field";
    /// Metric type name.
    pub const METRIC_TYPE: &str = "metric_type";
    /// Index-specific parameters as a JSON object.
    pub const PARAMS: &str = "params";
    /// Score rounding.
    pub const ROUND_DECIMAL: &str = "round_decimal";
    /// Skip growing segments ("True"/"False").
    pub const IGNORE_GROWING: &str = "ignore_growing";
    /// Group-by field of a search.
    pub const GROUP_BY_FIELD: &str = "group_by_field";
    /// Enables token continuation ("True").
    pub const SEARCH_ITER_V2: &str = "search_iter_v2";
    /// Page size of a token-continued search.
    pub const SEARCH_ITER_BATCH_SIZE: &str = "search_iter_batch_size";
    /// Score bound reached by the previous page.
    pub const SEARCH_ITER_LAST_BOUND: &str = "search_iter_last_bound";
    /// Continuation token of the iteration.
    pub const SEARCH_ITER_ID: &str = "search_iter_id";
}

/// Boolean parameter value.
#[must_use]
pub const fn flag(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// String-valued request parameters.
pub type Params = BTreeMap<String, String>;

/// A scalar query request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Database name; empty means the connection's database.
    pub db_name: String,
    /// Collection name.
    pub collection_name: String,
    /// Partitions to read; empty means all.
    pub partition_names: Vec<String>,
    /// Boolean filter expression.
    pub expr: String,
    /// Requested output fields.
    pub output_fields: Vec<String>,
    /// Query parameters.
    pub params: Params,
    /// Minimum data freshness.
    pub guarantee_timestamp: u64,
    /// Requested consistency level.
    pub consistency_level: ConsistencyLevel,
    /// Ask the server to apply the collection's default consistency.
    pub use_default_consistency: bool,
}

/// A scalar query response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Result columns.
    pub fields_data: Vec<FieldData>,
    /// Output field names as resolved by the server.
    pub output_fields: Vec<String>,
    /// Timestamp the query was served at, 0 on older servers.
    pub session_ts: u64,
}

/// A vector search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Database name; empty means the connection's database.
    pub db_name: String,
    /// Collection name.
    pub collection_name: String,
    /// Partitions to read; empty means all.
    pub partition_names: Vec<String>,
    /// Boolean filter expression.
    pub expr: String,
    /// Requested output fields.
    pub output_fields: Vec<String>,
    /// Target vectors, one row per query.
    pub targets: FieldData,
    /// Search parameters.
    pub params: Params,
    /// Minimum data freshness.
    pub guarantee_timestamp: u64,
    /// Requested consistency level.
    pub consistency_level: ConsistencyLevel,
    /// Ask the server to apply the collection's default consistency.
    pub use_default_consistency: bool,
}

impl SearchRequest {
    /// Number of target vectors.
    #[must_use]
    pub fn num_queries(&self) -> usize {
        self.targets.len()
    }
}

/// Primary keys of search hits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ids {
    /// Integer keys.
    Int(Vec<i64>),
    /// String keys.
    Str(Vec<String>),
}

impl Default for Ids {
    fn default() -> Self {
        Self::Int(Vec::new())
    }
}

impl Ids {
    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Str(v) => v.len(),
        }
    }

    /// Returns `true` if there are no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The key at a position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<PrimaryKey> {
        match self {
            Self::Int(v) => v.get(index).map(|&k| PrimaryKey::Int64(k)),
            Self::Str(v) => v.get(index).map(|k| PrimaryKey::VarChar(k.clone())),
        }
    }

    /// Copy the keys `[from, to)` into a named column, `None` if out of bounds.
    #[must_use]
    pub fn to_field(&self, name: &str, from: usize, to: usize) -> Option<FieldData> {
        match self {
            Self::Int(v) => Some(FieldData::int64(name, v.get(from..to)?.to_vec())),
            Self::Str(v) => Some(FieldData::varchar(name, v.get(from..to)?.to_vec())),
        }
    }
}

/// Continuation state returned by a token-continued search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchIteratorV2Results {
    /// Opaque continuation token; empty when the server does not support it.
    pub token: String,
    /// Score bound reached by this page.
    pub last_bound: f32,
}

/// Flattened hits of all target vectors of one search.
///
/// Hits of query `i` occupy the `topks[i]` rows following the hits of the
/// earlier queries, in `ids`, `scores` and every column of `fields_data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResultData {
    /// Number of target vectors.
    pub num_queries: u64,
    /// Requested row limit per query.
    pub top_k: u64,
    /// Rows returned per query.
    pub topks: Vec<u64>,
    /// Primary keys of all hits.
    pub ids: Ids,
    /// Scores of all hits.
    pub scores: Vec<f32>,
    /// Output columns of all hits.
    pub fields_data: Vec<FieldData>,
    /// Output field names as resolved by the server.
    pub output_fields: Vec<String>,
    /// Primary key field name, empty on older servers.
    pub primary_field_name: String,
    /// Continuation state, present for token-continued searches.
    pub iterator_v2: Option<SearchIteratorV2Results>,
}

/// A vector search response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The hits.
    pub results: SearchResultData,
    /// Timestamp the search was served at, 0 on older servers.
    pub session_ts: u64,
}

/// Kind of a row mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    /// Insert new rows.
    Insert,
    /// Insert or replace rows.
    Upsert,
    /// Delete rows matching the expression.
    Delete,
}

/// A row mutation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRequest {
    /// Database name; empty means the connection's database.
    pub db_name: String,
    /// Collection name.
    pub collection_name: String,
    /// Partition to write; empty means the default partition.
    pub partition_name: String,
    /// Mutation kind.
    pub kind: MutationKind,
    /// Rows to write, for inserts and upserts.
    pub fields_data: Vec<FieldData>,
    /// Filter expression, for deletes.
    pub expr: String,
}

/// A row mutation response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    /// Keys of the written rows.
    pub ids: Ids,
    /// Rows inserted.
    pub insert_count: u64,
    /// Rows upserted.
    pub upsert_count: u64,
    /// Rows deleted.
    pub delete_count: u64,
    /// Timestamp the mutation was applied at.
    pub timestamp: u64,
}

/// A drop-collection request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropCollectionRequest {
    /// Database name; empty means the connection's database.
    pub db_name: String,
    /// Collection name.
    pub collection_name: String,
}

/// Transport-level failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportCode {
    /// The call was cancelled.
    Cancelled,
    /// Unknown failure.
    Unknown,
    /// The request was malformed.
    InvalidArgument,
    /// The call deadline passed.
    DeadlineExceeded,
    /// A resource was not found.
    NotFound,
    /// A resource already exists.
    AlreadyExists,
    /// The caller lacks permission.
    PermissionDenied,
    /// A quota or size limit was hit.
    ResourceExhausted,
    /// The system is not in a state to serve the call.
    FailedPrecondition,
    /// The call was aborted.
    Aborted,
    /// A value was out of range.
    OutOfRange,
    /// The method is not implemented.
    Unimplemented,
    /// Internal failure.
    Internal,
    /// The service is temporarily unavailable.
    Unavailable,
    /// Unrecoverable data loss.
    DataLoss,
    /// The caller is not authenticated.
    Unauthenticated,
}

impl TransportCode {
    /// Returns `true` if retrying the call cannot succeed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::DeadlineExceeded
                | Self::PermissionDenied
                | Self::Unauthenticated
                | Self::InvalidArgument
                | Self::AlreadyExists
                | Self::ResourceExhausted
                | Self::Unimplemented
        )
    }
}

impl fmt::Display for TransportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Server code reporting a rate limit.
pub const RATE_LIMIT_CODE: i32 = 8;

/// Legacy error enumerator carried alongside the numeric code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegacyErrorCode {
    /// No legacy classification.
    #[default]
    Other,
    /// The request was rate limited.
    RateLimit,
    /// The data does not match the collection schema.
    SchemaMismatch,
}

/// A non-success application status reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    /// Numeric error code.
    pub code: i32,
    /// Legacy error enumerator.
    pub legacy_code: LegacyErrorCode,
    /// Human-readable reason.
    pub reason: String,
}

impl ServerStatus {
    /// Create a status.
    #[must_use]
    pub fn new(code: i32, reason: impl Into<String>) -> Self {
        Self { code, legacy_code: LegacyErrorCode::Other, reason: reason.into() }
    }

    /// Set the legacy enumerator.
    #[must_use]
    pub fn with_legacy_code(mut self, legacy_code: LegacyErrorCode) -> Self {
        self.legacy_code = legacy_code;
        self
    }

    /// Returns `true` if the server rejected the call for exceeding a rate limit.
    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        self.code == RATE_LIMIT_CODE || self.legacy_code == LegacyErrorCode::RateLimit
    }

    /// Returns `true` if the server reported a schema mismatch.
    #[must_use]
    pub fn is_schema_mismatch(&self) -> bool {
        self.legacy_code == LegacyErrorCode::SchemaMismatch
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}: {}", self.code, self.reason)
    }
}
