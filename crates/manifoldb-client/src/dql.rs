//! Query and search arguments, request builders and response conversion.
//!
//! Every read request shares a [`DqlOptions`] block (target collection,
//! filter, output fields, consistency). Argument types embed it and expose it
//! through the [`DqlRequest`] trait, so the request builders below are written
//! once and instantiated per argument type.

use std::collections::BTreeMap;

use manifoldb_wire::protocol::{
    flag, keys, Params, QueryRequest, QueryResponse, SearchRequest, SearchResultData,
};
use manifoldb_wire::{
    ConsistencyLevel, FieldData, FieldSchema, MetricType, QueryResults, SingleResult,
    SparseVector,
};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::timestamp::TimestampRegistry;

/// Name of the score column when it does not collide with an output field.
pub const DEFAULT_SCORE_NAME: &str = "score";

/// Primary key name used when neither the server nor the caller names one.
pub const DEFAULT_PK_NAME: &str = "pk";

/// Fields shared by every read request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DqlOptions {
    /// Database name; empty means the client's current database.
    pub database: String,
    /// Collection name.
    pub collection: String,
    /// Partitions to read; empty means all.
    pub partitions: Vec<String>,
    /// Boolean filter expression; empty means no filter.
    pub filter: String,
    /// Fields to return.
    pub output_fields: Vec<String>,
    /// Read consistency.
    pub consistency_level: ConsistencyLevel,
}

impl DqlOptions {
    /// Options targeting a collection.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self { collection: collection.into(), ..Default::default() }
    }
}

/// Access to the shared read-request fields.
pub trait DqlRequest {
    /// The shared fields.
    fn dql(&self) -> &DqlOptions;

    /// Database name; empty means the client's current database.
    fn database_name(&self) -> &str {
        &self.dql().database
    }

    /// Collection name.
    fn collection_name(&self) -> &str {
        &self.dql().collection
    }

    /// Partitions to read.
    fn partition_names(&self) -> &[String] {
        &self.dql().partitions
    }

    /// Filter expression.
    fn filter(&self) -> &str {
        &self.dql().filter
    }

    /// Fields to return.
    fn output_fields(&self) -> &[String] {
        &self.dql().output_fields
    }

    /// Read consistency.
    fn consistency_level(&self) -> ConsistencyLevel {
        self.dql().consistency_level
    }
}

macro_rules! dql_builders {
    ($ty:ty, $($path:ident).+) => {
        impl $ty {
            /// Read from a database other than the client's current one.
            #[must_use]
            pub fn with_database(mut self, name: impl Into<String>) -> Self {
                self.$($path).+.database = name.into();
                self
            }

            /// Restrict the read to a partition.
            #[must_use]
            pub fn with_partition(mut self, name: impl Into<String>) -> Self {
                self.$($path).+.partitions.push(name.into());
                self
            }

            /// Set the filter expression.
            #[must_use]
            pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
                self.$($path).+.filter = filter.into();
                self
            }

            /// Add an output field.
            #[must_use]
            pub fn with_output_field(mut self, name: impl Into<String>) -> Self {
                self.$($path).+.output_fields.push(name.into());
                self
            }

            /// Set the read consistency.
            #[must_use]
            pub fn with_consistency_level(mut self, level: ConsistencyLevel) -> Self {
                self.$($path).+.consistency_level = level;
                self
            }
        }

        impl DqlRequest for $ty {
            fn dql(&self) -> &DqlOptions {
                &self.$($path).+
            }
        }
    };
}

/// Arguments of a scalar query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryArguments {
    /// Shared read fields.
    pub options: DqlOptions,
    /// Maximum rows; `None` returns every match.
    pub limit: Option<u64>,
    /// Rows to skip.
    pub offset: u64,
    /// Skip growing segments.
    pub ignore_growing: bool,
}

impl QueryArguments {
    /// Query a collection.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self { options: DqlOptions::new(collection), ..Default::default() }
    }

    /// Set the row limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the row offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Skip growing segments.
    #[must_use]
    pub const fn with_ignore_growing(mut self, ignore: bool) -> Self {
        self.ignore_growing = ignore;
        self
    }
}

dql_builders!(QueryArguments, options);

/// Arguments of a vector search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchArguments {
    /// Shared read fields.
    pub options: DqlOptions,
    /// Vector field to search; empty lets the server pick the only one.
    pub anns_field: String,
    /// Target vectors, one row per query.
    pub targets: Option<FieldData>,
    /// Metric type; required by the search iterators.
    pub metric_type: Option<MetricType>,
    /// Rows per target vector.
    pub limit: u64,
    /// Rows to skip per target vector.
    pub offset: u64,
    /// Outer score bound of a range search.
    pub radius: Option<f64>,
    /// Inner score bound of a range search.
    pub range_filter: Option<f64>,
    /// Score rounding; -1 disables it.
    pub round_decimal: i32,
    /// Skip growing segments.
    pub ignore_growing: bool,
    /// Group hits by this scalar field.
    pub group_by_field: Option<String>,
    /// Index-specific parameters such as `ef` or `nprobe`.
    pub extra_params: BTreeMap<String, Value>,
}

impl Default for SearchArguments {
    fn default() -> Self {
        Self {
            options: DqlOptions::default(),
            anns_field: String::new(),
            targets: None,
            metric_type: None,
            limit: 10,
            offset: 0,
            radius: None,
            range_filter: None,
            round_decimal: -1,
            ignore_growing: false,
            group_by_field: None,
            extra_params: BTreeMap::new(),
        }
    }
}

impl SearchArguments {
    /// Search a collection.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self { options: DqlOptions::new(collection), ..Default::default() }
    }

    /// Set the vector field to search.
    #[must_use]
    pub fn with_anns_field(mut self, name: impl Into<String>) -> Self {
        self.anns_field = name.into();
        self
    }

    /// Replace the target vectors.
    #[must_use]
    pub fn with_targets(mut self, targets: FieldData) -> Self {
        self.targets = Some(targets);
        self
    }

    /// Add a float32 target vector.
    ///
    /// # Errors
    ///
    /// Returns an error if other targets are not float32 vectors.
    pub fn add_float_vector(&mut self, vector: Vec<f32>) -> Result<()> {
        self.add_target(FieldData::float_vector(self.anns_field.clone(), vec![vector]))
    }

    /// Add a sparse target vector.
    ///
    /// # Errors
    ///
    /// Returns an error if other targets are not sparse vectors.
    pub fn add_sparse_vector(&mut self, vector: SparseVector) -> Result<()> {
        self.add_target(FieldData::sparse(self.anns_field.clone(), vec![vector]))
    }

    fn add_target(&mut self, target: FieldData) -> Result<()> {
        match &mut self.targets {
            Some(existing) => existing.append(&target).map_err(Error::from_request),
            None => {
                self.targets = Some(target);
                Ok(())
            }
        }
    }

    /// Set the metric type.
    #[must_use]
    pub const fn with_metric_type(mut self, metric: MetricType) -> Self {
        self.metric_type = Some(metric);
        self
    }

    /// Set the rows per target vector.
    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Set the rows to skip.
    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the outer range bound.
    #[must_use]
    pub const fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    /// Set the inner range bound.
    #[must_use]
    pub const fn with_range_filter(mut self, range_filter: f64) -> Self {
        self.range_filter = Some(range_filter);
        self
    }

    /// Set the score rounding.
    #[must_use]
    pub const fn with_round_decimal(mut self, decimals: i32) -> Self {
        self.round_decimal = decimals;
        self
    }

    /// Skip growing segments.
    #[must_use]
    pub const fn with_ignore_growing(mut self, ignore: bool) -> Self {
        self.ignore_growing = ignore;
        self
    }

    /// Group hits by a scalar field.
    #[must_use]
    pub fn with_group_by_field(mut self, name: impl Into<String>) -> Self {
        self.group_by_field = Some(name.into());
        self
    }

    /// Add an index-specific parameter.
    #[must_use]
    pub fn with_extra_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    /// The `ef` parameter, if given as an integer or an integer string.
    #[must_use]
    pub fn ef(&self) -> Option<u64> {
        match self.extra_params.get("ef")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Number of target vectors.
    #[must_use]
    pub fn num_targets(&self) -> usize {
        self.targets.as_ref().map_or(0, FieldData::len)
    }
}

dql_builders!(SearchArguments, options);

/// Arguments of a query iterator.
///
/// `query.limit` bounds the total rows delivered and `query.offset` the rows
/// skipped before the first batch; both are applied by the iterator, not by
/// the server.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryIteratorArguments {
    /// The underlying query.
    pub query: QueryArguments,
    /// Rows per batch, 1 to 16384.
    /// Default: 1000
    pub batch_size: u64,
    /// Primary key of the collection.
    pub primary_key: FieldSchema,
    /// Collection id, sent when positive.
    pub collection_id: i64,
    /// Let the server stop reducing once the batch is filled.
    pub reduce_stop_for_best: bool,
}

impl QueryIteratorArguments {
    /// Iterate a collection by its primary key.
    #[must_use]
    pub fn new(collection: impl Into<String>, primary_key: FieldSchema) -> Self {
        Self {
            query: QueryArguments::new(collection),
            batch_size: 1000,
            primary_key,
            collection_id: 0,
            reduce_stop_for_best: false,
        }
    }

    /// Set the rows per batch.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the total row limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Set the rows to skip.
    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.query.offset = offset;
        self
    }

    /// Set the collection id.
    #[must_use]
    pub const fn with_collection_id(mut self, id: i64) -> Self {
        self.collection_id = id;
        self
    }

    /// Let the server stop reducing once the batch is filled.
    #[must_use]
    pub const fn with_reduce_stop_for_best(mut self, enabled: bool) -> Self {
        self.reduce_stop_for_best = enabled;
        self
    }
}

dql_builders!(QueryIteratorArguments, query.options);

/// Arguments of a search iterator.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchIteratorArguments {
    /// The underlying search; its `limit` is replaced per request.
    pub search: SearchArguments,
    /// Rows per batch, 1 to 16384.
    /// Default: 1000
    pub batch_size: u64,
    /// Total rows to deliver; `None` iterates every hit.
    pub limit: Option<u64>,
    /// Primary key of the collection.
    pub primary_key: FieldSchema,
    /// Collection id, sent when positive.
    pub collection_id: i64,
}

impl SearchIteratorArguments {
    /// Iterate the hits of a search.
    #[must_use]
    pub fn new(search: SearchArguments, primary_key: FieldSchema) -> Self {
        Self { search, batch_size: 1000, limit: None, primary_key, collection_id: 0 }
    }

    /// Set the rows per batch.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the total row limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the collection id.
    #[must_use]
    pub const fn with_collection_id(mut self, id: i64) -> Self {
        self.collection_id = id;
        self
    }
}

impl DqlRequest for SearchIteratorArguments {
    fn dql(&self) -> &DqlOptions {
        &self.search.options
    }
}

/// Resolves the database and guarantee timestamp of read requests.
#[derive(Debug, Clone, Copy)]
pub struct ReadContext<'a> {
    /// Database used when a request names none.
    pub default_database: &'a str,
    /// Write timestamps for session consistency.
    pub registry: &'a TimestampRegistry,
}

impl ReadContext<'_> {
    /// The database a request reads from.
    #[must_use]
    pub fn database_for<R: DqlRequest + ?Sized>(&self, args: &R) -> String {
        let name = args.database_name();
        if name.is_empty() { self.default_database } else { name }.to_string()
    }
}

/// Reject requests without a collection.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the collection name is empty.
pub fn validate_dql<R: DqlRequest + ?Sized>(args: &R) -> Result<()> {
    if args.collection_name().is_empty() {
        return Err(Error::invalid_argument("collection name must not be empty"));
    }
    Ok(())
}

/// Fill the shared fields of a query request.
#[must_use]
pub fn base_query_request<R: DqlRequest + ?Sized>(args: &R, ctx: &ReadContext<'_>) -> QueryRequest {
    let db = ctx.database_for(args);
    let level = args.consistency_level();
    QueryRequest {
        guarantee_timestamp: ctx.registry.guarantee_timestamp(level, &db, args.collection_name()),
        use_default_consistency: level == ConsistencyLevel::Default,
        db_name: db,
        collection_name: args.collection_name().to_string(),
        partition_names: args.partition_names().to_vec(),
        expr: args.filter().to_string(),
        output_fields: args.output_fields().to_vec(),
        params: Params::new(),
        consistency_level: level,
    }
}

/// Build the request of a scalar query.
#[must_use]
pub fn query_request(args: &QueryArguments, ctx: &ReadContext<'_>) -> QueryRequest {
    let mut request = base_query_request(args, ctx);
    if let Some(limit) = args.limit {
        request.params.insert(keys::LIMIT.into(), limit.to_string());
    }
    if args.offset > 0 {
        request.params.insert(keys::OFFSET.into(), args.offset.to_string());
    }
    if args.ignore_growing {
        request.params.insert(keys::IGNORE_GROWING.into(), flag(true).into());
    }
    request
}

/// Build the request of a vector search.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if there are no target vectors or the
/// targets are not a vector column.
pub fn search_request(args: &SearchArguments, ctx: &ReadContext<'_>) -> Result<SearchRequest> {
    let targets = match &args.targets {
        Some(t) if !t.is_empty() => t.clone(),
        _ => return Err(Error::invalid_argument("search requires at least one target vector")),
    };
    if !targets.data_type().is_vector() {
        return Err(Error::invalid_argument(format!(
            "search targets must be vectors, got {}",
            targets.data_type()
        )));
    }

    let base = base_query_request(args, ctx);
    let mut params = Params::new();
    if !args.anns_field.is_empty() {
        params.insert(keys::ANNS_FIELD.into(), args.anns_field.clone());
    }
    params.insert(keys::TOPK.into(), args.limit.to_string());
    params.insert(keys::OFFSET.into(), args.offset.to_string());
    params.insert(keys::ROUND_DECIMAL.into(), args.round_decimal.to_string());
    params.insert(keys::IGNORE_GROWING.into(), flag(args.ignore_growing).into());
    if let Some(metric) = args.metric_type {
        params.insert(keys::METRIC_TYPE.into(), metric.as_str().into());
    }
    if let Some(radius) = args.radius {
        params.insert(keys::RADIUS.into(), radius.to_string());
    }
    if let Some(range_filter) = args.range_filter {
        params.insert(keys::RANGE_FILTER.into(), range_filter.to_string());
    }
    if let Some(group_by) = &args.group_by_field {
        params.insert(keys::GROUP_BY_FIELD.into(), group_by.clone());
    }
    let extra = serde_json::to_string(&args.extra_params)
        .map_err(|e| Error::invalid_argument(format!("invalid search params: {e}")))?;
    params.insert(keys::PARAMS.into(), extra);

    Ok(SearchRequest {
        db_name: base.db_name,
        collection_name: base.collection_name,
        partition_names: base.partition_names,
        expr: base.expr,
        output_fields: base.output_fields,
        targets,
        params,
        guarantee_timestamp: base.guarantee_timestamp,
        consistency_level: base.consistency_level,
        use_default_consistency: base.use_default_consistency,
    })
}

/// Convert a query response.
///
/// # Errors
///
/// Returns [`Error::Unknown`] if the columns have different row counts.
pub fn query_results(response: QueryResponse, requested: &[String]) -> Result<QueryResults> {
    let names = if response.output_fields.is_empty() {
        requested.to_vec()
    } else {
        response.output_fields
    };
    Ok(QueryResults::new(response.fields_data, names)?)
}

/// Pick a score column name that does not collide with an output column.
fn score_name(data: &SearchResultData) -> String {
    let mut name = DEFAULT_SCORE_NAME.to_string();
    while data.fields_data.iter().any(|f| f.name == name)
        || data.output_fields.iter().any(|f| *f == name)
    {
        name.insert(0, '_');
    }
    name
}

/// Split a search response into one page per target vector.
///
/// The primary-key column is named after the server's primary field, the
/// caller-known key name, or `"pk"`, in that order.
///
/// # Errors
///
/// Returns [`Error::Unknown`] if `topks` does not account for every id, score
/// and column row.
pub fn search_results(
    data: SearchResultData,
    pk_name: &str,
    requested: &[String],
) -> Result<Vec<SingleResult>> {
    let pk_name = if !data.primary_field_name.is_empty() {
        data.primary_field_name.clone()
    } else if !pk_name.is_empty() {
        pk_name.to_string()
    } else {
        DEFAULT_PK_NAME.to_string()
    };
    let score_name = score_name(&data);
    let names: Vec<String> =
        if data.output_fields.is_empty() { requested.to_vec() } else { data.output_fields.clone() };

    let total = data
        .topks
        .iter()
        .try_fold(0usize, |acc, &topk| usize::try_from(topk).ok().and_then(|k| acc.checked_add(k)))
        .ok_or_else(|| Error::unknown("search result row count overflows"))?;
    if data.ids.len() != total || data.scores.len() != total {
        return Err(Error::unknown(format!(
            "search result holds {} ids and {} scores for {total} hits",
            data.ids.len(),
            data.scores.len()
        )));
    }
    if let Some(bad) = data.fields_data.iter().find(|f| f.len() != total) {
        return Err(Error::unknown(format!(
            "search result column '{}' holds {} rows for {total} hits",
            bad.name,
            bad.len()
        )));
    }

    let mut results = Vec::with_capacity(data.topks.len());
    let mut offset = 0usize;
    for &topk in &data.topks {
        let end = usize::try_from(topk)
            .ok()
            .and_then(|count| offset.checked_add(count))
            .filter(|&end| end <= total)
            .ok_or_else(|| Error::unknown("search result topk out of range"))?;
        let count = end - offset;
        let ids = data
            .ids
            .to_field(&pk_name, offset, end)
            .ok_or_else(|| Error::unknown("search result ids out of range"))?;
        let mut fields = vec![ids, FieldData::float(score_name.clone(), data.scores[offset..end].to_vec())];
        for field in data.fields_data.iter().filter(|f| f.name != pk_name) {
            let column = if count == 0 { field.empty_like() } else { field.slice(offset, end)? };
            fields.push(column);
        }
        results.push(SingleResult::new(pk_name.clone(), score_name.clone(), fields, names.clone())?);
        offset = end;
    }
    Ok(results)
}
