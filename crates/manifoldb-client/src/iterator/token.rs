//! Search iteration by server-issued continuation tokens.

use std::collections::VecDeque;

use manifoldb_wire::protocol::{flag, keys, Params, SearchResponse};
use manifoldb_wire::SingleResult;
use tracing::debug;

use super::cache::{cached_rows, fetch_page_from_cache};
use super::{
    batch_iterator, remaining, session_ts_or_now, to_usize, validate_search, IteratorState,
};
use crate::client::Connection;
use crate::dql::{self, SearchArguments, SearchIteratorArguments, DEFAULT_SCORE_NAME};
use crate::error::{Error, Result};
use crate::service::VectorService;

/// Iterates the hits of a search page by page, each request carrying the
/// token and score bound of the previous response.
pub struct SearchIteratorV2<S> {
    conn: Connection<S>,
    search: SearchArguments,
    params: Params,
    pk_name: String,
    batch_size: u64,
    limit: Option<u64>,
    returned: u64,
    session_ts: u64,
    cache: VecDeque<SingleResult>,
    template: SingleResult,
    state: IteratorState,
}

impl<S: VectorService> SearchIteratorV2<S> {
    /// Validate the arguments and probe the server for token support.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for invalid arguments, or
    /// [`Error::NotSupported`] if the probe response carries no token.
    pub(crate) fn new(conn: Connection<S>, args: SearchIteratorArguments) -> Result<Self> {
        validate_search(&args)?;
        let template = SingleResult::new(
            args.primary_key.name.clone(),
            DEFAULT_SCORE_NAME,
            Vec::new(),
            args.search.options.output_fields.clone(),
        )?;

        let mut params = Params::new();
        params.insert(keys::ITERATOR.into(), flag(true).into());
        params.insert(keys::SEARCH_ITER_V2.into(), flag(true).into());
        params.insert(keys::SEARCH_ITER_BATCH_SIZE.into(), args.batch_size.to_string());
        if args.collection_id > 0 {
            params.insert(keys::COLLECTION_ID.into(), args.collection_id.to_string());
        }

        let mut search = args.search;
        search.limit = args.batch_size;
        let mut iterator = Self {
            conn,
            search,
            params,
            pk_name: args.primary_key.name,
            batch_size: args.batch_size,
            limit: args.limit,
            returned: 0,
            session_ts: 0,
            cache: VecDeque::new(),
            template,
            state: IteratorState::Created,
        };
        iterator.probe().map_err(|e| e.context("failed to init search iterator"))?;
        iterator.state = IteratorState::Initialized;
        Ok(iterator)
    }

    fn probe(&self) -> Result<()> {
        let mut search = self.search.clone();
        search.limit = 1;
        let mut params = self.params.clone();
        params.insert(keys::SEARCH_ITER_BATCH_SIZE.into(), "1".into());
        let response = self.execute_search(&search, params)?;
        token_of(&response).map(|_| ())
    }

    fn execute_search(&self, search: &SearchArguments, params: Params) -> Result<SearchResponse> {
        let mut request = dql::search_request(search, &self.conn.read_context())?;
        request.params.extend(params);
        if self.session_ts > 0 {
            request.guarantee_timestamp = self.session_ts;
        }
        self.conn.search(request)
    }

    fn next_page(&mut self) -> Result<SingleResult> {
        let response = self.execute_search(&self.search, self.params.clone())?;
        if self.session_ts == 0 {
            self.session_ts = session_ts_or_now(response.session_ts);
        }

        let (token, last_bound) = token_of(&response)?;
        self.params.insert(keys::SEARCH_ITER_LAST_BOUND.into(), f64::from(last_bound).to_string());
        self.params.entry(keys::SEARCH_ITER_ID.into()).or_insert_with(|| token.to_string());

        let mut pages = dql::search_results(
            response.results,
            &self.pk_name,
            &self.search.options.output_fields,
        )?;
        if pages.len() != 1 {
            return Err(Error::unknown(format!(
                "expected one search result, the server returned {}",
                pages.len()
            )));
        }
        let page = pages.remove(0);
        debug!(rows = page.row_count(), last_bound, "search iterator fetched page");
        Ok(page)
    }

    /// The next batch of hits; empty once the limit is met or the server has
    /// no more.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of a search, [`Error::NotSupported`]
    /// if a response lacks the token, or [`Error::Unknown`] if it does not
    /// hold exactly one result.
    pub fn next_batch(&mut self) -> Result<SingleResult> {
        let owed = remaining(self.limit, self.returned);
        if self.state == IteratorState::Exhausted || owed == 0 {
            self.state = IteratorState::Exhausted;
            return Ok(self.template.empty_like());
        }

        let target = to_usize(self.batch_size.min(owed));
        while cached_rows(&self.cache) < target {
            let page = self.next_page()?;
            if page.is_empty() {
                break;
            }
            self.cache.push_back(page);
        }

        let page = fetch_page_from_cache(&mut self.cache, target, &self.template)?;
        self.returned += page.row_count() as u64;
        self.state = if page.is_empty() {
            IteratorState::Exhausted
        } else {
            IteratorState::Delivering
        };
        Ok(page)
    }

    /// The lifecycle state.
    #[must_use]
    pub const fn state(&self) -> IteratorState {
        self.state
    }

    /// Rows delivered so far.
    #[must_use]
    pub const fn returned(&self) -> u64 {
        self.returned
    }

    /// The session timestamp later pages are pinned to, 0 before the first page.
    #[must_use]
    pub const fn session_ts(&self) -> u64 {
        self.session_ts
    }
}

batch_iterator!(SearchIteratorV2, SingleResult);

fn token_of(response: &SearchResponse) -> Result<(&str, f32)> {
    match &response.results.iterator_v2 {
        Some(v2) if !v2.token.is_empty() => Ok((v2.token.as_str(), v2.last_bound)),
        _ => Err(Error::not_supported(
            "the server does not issue search iterator tokens, use range probing instead",
        )),
    }
}
