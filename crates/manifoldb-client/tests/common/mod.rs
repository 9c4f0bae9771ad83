//! In-memory `VectorService` shared by the integration tests.
//!
//! The fake keeps one collection of rows with a primary key, an integer `tag`
//! and a fixed score per row. It understands the filter shapes the client
//! produces (`pk > x`, `pk not in [...]`, `(user) and ...`), range search on
//! `radius`/`range_filter`, token continuation, over-fetching iterator
//! queries, and it records every request for inspection.

#![allow(dead_code, clippy::expect_used)]

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use manifoldb_client::retry::RpcFailure;
use manifoldb_client::{Client, ClientConfig, RetryPolicy, VectorService};
use manifoldb_wire::protocol::{
    keys, DropCollectionRequest, Ids, MutationKind, MutationRequest, MutationResponse,
    QueryRequest, QueryResponse, SearchIteratorV2Results, SearchRequest, SearchResponse,
    SearchResultData,
};
use manifoldb_wire::{
    DataType, FieldData, FieldSchema, MetricType, PrimaryKey, QueryResults, SingleResult,
};

/// Primary key name of the fake collection.
pub const PK: &str = "id";

/// Session timestamp the fake reports by default.
pub const SESSION_TS: u64 = 449_000_000_000_000_000;

/// First write timestamp the fake hands out.
pub const FIRST_WRITE_TS: u64 = 450_000_000_000_000_000;

/// One stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeRow {
    pub key: PrimaryKey,
    pub tag: i64,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Lit {
    Int(i64),
    Str(String),
}

#[derive(Debug)]
enum Predicate {
    Compare { field: String, op: String, value: Lit },
    NotIn { field: String, values: HashSet<Lit> },
}

#[derive(Debug, Default)]
struct FakeState {
    rows: Vec<FakeRow>,
    queries: Vec<QueryRequest>,
    searches: Vec<SearchRequest>,
    mutations: Vec<MutationRequest>,
    drops: Vec<DropCollectionRequest>,
    calls: usize,
    failures: VecDeque<RpcFailure>,
    query_session_ts: u64,
    search_session_ts: u64,
    supports_v2: bool,
    over_fetch: usize,
    primary_field_name: String,
    next_write_ts: u64,
    tokens: HashMap<String, usize>,
    token_seq: u64,
}

/// In-memory vector service.
#[derive(Debug)]
pub struct FakeService {
    state: Mutex<FakeState>,
}

impl FakeService {
    /// A collection holding the given rows, sorted by key.
    pub fn from_rows(mut rows: Vec<FakeRow>) -> Self {
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Self {
            state: Mutex::new(FakeState {
                rows,
                query_session_ts: SESSION_TS,
                search_session_ts: SESSION_TS,
                over_fetch: 1,
                primary_field_name: PK.to_string(),
                next_write_ts: FIRST_WRITE_TS,
                ..Default::default()
            }),
        }
    }

    /// Rows with keys `0..n`, tag `key % 10` and score `key * 0.01`.
    pub fn int_rows(n: usize) -> Self {
        Self::from_rows(
            (0..n as i64)
                .map(|i| FakeRow { key: PrimaryKey::Int64(i), tag: i % 10, score: i as f32 * 0.01 })
                .collect(),
        )
    }

    /// Rows with keys `"k00000".."k{n}"`.
    pub fn varchar_rows(n: usize) -> Self {
        Self::from_rows(
            (0..n as i64)
                .map(|i| FakeRow {
                    key: PrimaryKey::VarChar(format!("k{i:05}")),
                    tag: i % 10,
                    score: i as f32 * 0.01,
                })
                .collect(),
        )
    }

    /// Iterator queries return `factor` times the requested rows.
    pub fn with_over_fetch(self, factor: usize) -> Self {
        self.lock().over_fetch = factor.max(1);
        self
    }

    /// Issue continuation tokens.
    pub fn with_v2(self, enabled: bool) -> Self {
        self.set_v2(enabled);
        self
    }

    /// Session timestamps reported by queries and searches.
    pub fn with_session_ts(self, query: u64, search: u64) -> Self {
        {
            let mut state = self.lock();
            state.query_session_ts = query;
            state.search_session_ts = search;
        }
        self
    }

    /// Primary field name reported in search results.
    pub fn with_primary_field_name(self, name: &str) -> Self {
        self.lock().primary_field_name = name.to_string();
        self
    }

    /// Turn continuation tokens on or off.
    pub fn set_v2(&self, enabled: bool) {
        self.lock().supports_v2 = enabled;
    }

    /// Fail the next `times` calls of any kind.
    pub fn fail_next(&self, failure: RpcFailure, times: usize) {
        let mut state = self.lock();
        for _ in 0..times {
            state.failures.push_back(failure.clone());
        }
    }

    pub fn queries(&self) -> Vec<QueryRequest> {
        self.lock().queries.clone()
    }

    pub fn searches(&self) -> Vec<SearchRequest> {
        self.lock().searches.clone()
    }

    pub fn mutations(&self) -> Vec<MutationRequest> {
        self.lock().mutations.clone()
    }

    pub fn drops(&self) -> Vec<DropCollectionRequest> {
        self.lock().drops.clone()
    }

    /// Attempts of every kind, failed ones included.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    pub fn row_count(&self) -> usize {
        self.lock().rows.len()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(state: &mut FakeState) -> Result<(), RpcFailure> {
        state.calls += 1;
        match state.failures.pop_front() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

impl VectorService for FakeService {
    fn query(&self, request: &QueryRequest, _: Duration) -> Result<QueryResponse, RpcFailure> {
        let mut state = self.lock();
        Self::begin(&mut state)?;
        state.queries.push(request.clone());

        let predicates = parse_filter(&request.expr);
        let mut limit = param_usize(&request.params, keys::LIMIT).unwrap_or(usize::MAX);
        if request.params.get(keys::ITERATOR).map(String::as_str) == Some("True") {
            limit = limit.saturating_mul(state.over_fetch);
        }
        let offset = param_usize(&request.params, keys::OFFSET).unwrap_or(0);
        let rows: Vec<&FakeRow> = state
            .rows
            .iter()
            .filter(|row| matches_all(row, &predicates))
            .skip(offset)
            .take(limit)
            .collect();

        let mut fields = vec![key_column(PK, &rows)];
        fields.extend(output_columns(&request.output_fields, &rows));
        Ok(QueryResponse {
            fields_data: fields,
            output_fields: request.output_fields.clone(),
            session_ts: state.query_session_ts,
        })
    }

    fn search(&self, request: &SearchRequest, _: Duration) -> Result<SearchResponse, RpcFailure> {
        let mut state = self.lock();
        Self::begin(&mut state)?;
        state.searches.push(request.clone());

        let params = &request.params;
        let metric = params
            .get(keys::METRIC_TYPE)
            .and_then(|m| m.parse::<MetricType>().ok())
            .unwrap_or(MetricType::L2);
        let radius = param_f64(params, keys::RADIUS);
        let range_filter = param_f64(params, keys::RANGE_FILTER);
        let predicates = parse_filter(&request.expr);

        let mut hits: Vec<FakeRow> = state
            .rows
            .iter()
            .filter(|row| matches_all(row, &predicates))
            .filter(|row| in_range(metric, f64::from(row.score), radius, range_filter))
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            let by_score = if metric.smaller_is_closer() {
                a.score.partial_cmp(&b.score)
            } else {
                b.score.partial_cmp(&a.score)
            };
            by_score.unwrap_or(Ordering::Equal).then_with(|| a.key.cmp(&b.key))
        });

        let topk = param_usize(params, keys::TOPK).unwrap_or(10);
        let mut iterator_v2 = None;
        let page: Vec<FakeRow> = if state.supports_v2
            && params.get(keys::SEARCH_ITER_V2).map(String::as_str) == Some("True")
        {
            let batch = param_usize(params, keys::SEARCH_ITER_BATCH_SIZE).unwrap_or(topk);
            let token = match params.get(keys::SEARCH_ITER_ID) {
                Some(token) => token.clone(),
                None => {
                    state.token_seq += 1;
                    format!("token-{}", state.token_seq)
                }
            };
            let position = state.tokens.get(&token).copied().unwrap_or(0);
            let page: Vec<FakeRow> = hits.into_iter().skip(position).take(batch).collect();
            state.tokens.insert(token.clone(), position + page.len());
            let last_bound = page.last().map_or(0.0, |row| row.score);
            iterator_v2 = Some(SearchIteratorV2Results { token, last_bound });
            page
        } else {
            hits.into_iter().take(topk).collect()
        };

        let refs: Vec<&FakeRow> = page.iter().collect();
        let ids = match refs.first().map(|row| &row.key) {
            Some(PrimaryKey::VarChar(_)) => Ids::Str(
                refs.iter()
                    .map(|row| match &row.key {
                        PrimaryKey::VarChar(k) => k.clone(),
                        PrimaryKey::Int64(k) => k.to_string(),
                    })
                    .collect(),
            ),
            _ => Ids::Int(
                refs.iter()
                    .map(|row| match &row.key {
                        PrimaryKey::Int64(k) => *k,
                        PrimaryKey::VarChar(_) => 0,
                    })
                    .collect(),
            ),
        };
        Ok(SearchResponse {
            results: SearchResultData {
                num_queries: 1,
                top_k: topk as u64,
                topks: vec![refs.len() as u64],
                ids,
                scores: refs.iter().map(|row| row.score).collect(),
                fields_data: output_columns(&request.output_fields, &refs),
                output_fields: request.output_fields.clone(),
                primary_field_name: state.primary_field_name.clone(),
                iterator_v2,
            },
            session_ts: state.search_session_ts,
        })
    }

    fn mutate(
        &self,
        request: &MutationRequest,
        _: Duration,
    ) -> Result<MutationResponse, RpcFailure> {
        let mut state = self.lock();
        Self::begin(&mut state)?;
        state.mutations.push(request.clone());

        let mut response = MutationResponse::default();
        match request.kind {
            MutationKind::Insert | MutationKind::Upsert => {
                let keys = request
                    .fields_data
                    .iter()
                    .find(|f| f.name == PK)
                    .and_then(FieldData::as_int64)
                    .map(<[i64]>::to_vec)
                    .unwrap_or_default();
                let tags = request
                    .fields_data
                    .iter()
                    .find(|f| f.name == "tag")
                    .and_then(FieldData::as_int64)
                    .map(<[i64]>::to_vec)
                    .unwrap_or_default();
                for (i, &key) in keys.iter().enumerate() {
                    state.rows.retain(|row| row.key != PrimaryKey::Int64(key));
                    state.rows.push(FakeRow {
                        key: PrimaryKey::Int64(key),
                        tag: tags.get(i).copied().unwrap_or(0),
                        score: key as f32 * 0.01,
                    });
                }
                state.rows.sort_by(|a, b| a.key.cmp(&b.key));
                if request.kind == MutationKind::Insert {
                    response.insert_count = keys.len() as u64;
                } else {
                    response.upsert_count = keys.len() as u64;
                }
                response.ids = Ids::Int(keys);
            }
            MutationKind::Delete => {
                let predicates = parse_filter(&request.expr);
                let before = state.rows.len();
                state.rows.retain(|row| !matches_all(row, &predicates));
                response.delete_count = (before - state.rows.len()) as u64;
            }
        }
        response.timestamp = state.next_write_ts;
        state.next_write_ts += 1;
        Ok(response)
    }

    fn drop_collection(
        &self,
        request: &DropCollectionRequest,
        _: Duration,
    ) -> Result<(), RpcFailure> {
        let mut state = self.lock();
        Self::begin(&mut state)?;
        state.drops.push(request.clone());
        Ok(())
    }
}

// ============================================================================
// Filter evaluation
// ============================================================================

fn parse_filter(expr: &str) -> Vec<Predicate> {
    let mut predicates = Vec::new();
    for part in split_top_level(expr, " and ") {
        if part.starts_with('(') && part.ends_with(')') && wraps(part) {
            predicates.extend(parse_filter(&part[1..part.len() - 1]));
        } else {
            predicates.push(parse_predicate(part));
        }
    }
    predicates
}

/// Returns `true` if the opening parenthesis closes at the very end.
fn wraps(part: &str) -> bool {
    let mut depth = 0;
    for (i, c) in part.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return i == part.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

fn split_top_level<'a>(expr: &'a str, separator: &str) -> Vec<&'a str> {
    let bytes = expr.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            b'"' => in_string = true,
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            _ if depth == 0 && expr[i..].starts_with(separator) => {
                parts.push(&expr[start..i]);
                i += separator.len();
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&expr[start..]);
    parts.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

fn parse_predicate(text: &str) -> Predicate {
    if let Some((field, rest)) = text.split_once(" not in ") {
        let inner = rest.trim().trim_start_matches('[').trim_end_matches(']');
        let values = split_top_level(inner, ",").into_iter().map(parse_literal).collect();
        return Predicate::NotIn { field: field.trim().to_string(), values };
    }
    for op in [">=", "<=", "==", "!=", ">", "<"] {
        if let Some((field, value)) = text.split_once(&format!(" {op} ")) {
            return Predicate::Compare {
                field: field.trim().to_string(),
                op: op.to_string(),
                value: parse_literal(value),
            };
        }
    }
    panic!("unsupported filter: {text}");
}

fn parse_literal(text: &str) -> Lit {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        return Lit::Str(inner.replace("\\\"", "\"").replace("\\\\", "\\"));
    }
    Lit::Int(text.parse().expect("integer literal"))
}

fn field_value(row: &FakeRow, field: &str) -> Lit {
    match field {
        "tag" => Lit::Int(row.tag),
        _ => match &row.key {
            PrimaryKey::Int64(k) => Lit::Int(*k),
            PrimaryKey::VarChar(k) => Lit::Str(k.clone()),
        },
    }
}

fn matches_all(row: &FakeRow, predicates: &[Predicate]) -> bool {
    predicates.iter().all(|p| match p {
        Predicate::Compare { field, op, value } => {
            let actual = field_value(row, field);
            match op.as_str() {
                ">" => actual > *value,
                ">=" => actual >= *value,
                "<" => actual < *value,
                "<=" => actual <= *value,
                "==" => actual == *value,
                _ => actual != *value,
            }
        }
        Predicate::NotIn { field, values } => !values.contains(&field_value(row, field)),
    })
}

/// Range search bounds: `[range_filter, radius)` for distances,
/// `(radius, range_filter]` for similarities.
fn in_range(metric: MetricType, score: f64, radius: Option<f64>, range_filter: Option<f64>) -> bool {
    if metric.smaller_is_closer() {
        radius.map_or(true, |r| score < r) && range_filter.map_or(true, |f| score >= f)
    } else {
        radius.map_or(true, |r| score > r) && range_filter.map_or(true, |f| score <= f)
    }
}

fn param_usize(params: &std::collections::BTreeMap<String, String>, key: &str) -> Option<usize> {
    params.get(key).and_then(|v| v.parse().ok())
}

fn param_f64(params: &std::collections::BTreeMap<String, String>, key: &str) -> Option<f64> {
    params.get(key).and_then(|v| v.parse().ok())
}

fn key_column(name: &str, rows: &[&FakeRow]) -> FieldData {
    match rows.first().map(|row| &row.key) {
        Some(PrimaryKey::VarChar(_)) => FieldData::varchar(
            name,
            rows.iter().map(|row| row.key.to_string()).collect::<Vec<_>>(),
        ),
        _ => FieldData::int64(
            name,
            rows.iter()
                .map(|row| match &row.key {
                    PrimaryKey::Int64(k) => *k,
                    PrimaryKey::VarChar(_) => 0,
                })
                .collect(),
        ),
    }
}

fn output_columns(names: &[String], rows: &[&FakeRow]) -> Vec<FieldData> {
    names
        .iter()
        .filter_map(|name| match name.as_str() {
            "tag" => Some(FieldData::int64("tag", rows.iter().map(|row| row.tag).collect())),
            "title" => Some(FieldData::varchar(
                "title",
                rows.iter().map(|row| format!("doc-{}", row.key)).collect::<Vec<_>>(),
            )),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Client helpers
// ============================================================================

/// A retry policy with millisecond backoff.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new().initial_backoff_ms(1).max_backoff_ms(2)
}

/// A client over a shared fake.
pub fn client(service: &Arc<FakeService>) -> Client<FakeService> {
    Client::from_shared(Arc::clone(service), ClientConfig::new().retry(fast_retry()))
}

/// The integer primary key of the fake collection.
pub fn int_pk() -> FieldSchema {
    FieldSchema::primary_key(PK, DataType::Int64)
}

/// The string primary key of the fake collection.
pub fn varchar_pk() -> FieldSchema {
    FieldSchema::primary_key(PK, DataType::VarChar)
}

/// Integer keys of a query page.
pub fn int_keys(page: &QueryResults) -> Vec<i64> {
    page.field(PK).and_then(FieldData::as_int64).map(<[i64]>::to_vec).unwrap_or_default()
}

/// Integer keys of a search page.
pub fn hit_keys(page: &SingleResult) -> Vec<i64> {
    page.primary_keys()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|key| match key {
            PrimaryKey::Int64(k) => Some(k),
            PrimaryKey::VarChar(_) => None,
        })
        .collect()
}
