//! Primary-key cursor iteration over a scalar query.

use manifoldb_wire::protocol::{flag, keys, QueryRequest};
use manifoldb_wire::{PrimaryKey, QueryResults};
use tracing::debug;

use super::{
    and_filter, batch_iterator, remaining, session_ts_or_now, to_usize, validate_batch_size,
    validate_primary_key, IteratorState, MAX_BATCH_SIZE,
};
use crate::client::Connection;
use crate::dql::{self, QueryIteratorArguments};
use crate::error::{Error, Result};
use crate::service::VectorService;

/// Iterates the rows of a query in ascending primary-key order.
///
/// The offset is consumed on the client by seeking the cursor forward, so it
/// may exceed the server's page size. Rows the server returns beyond the batch
/// size are cached in whole batches and served without another RPC.
pub struct QueryIterator<S> {
    conn: Connection<S>,
    args: QueryIteratorArguments,
    limit: Option<u64>,
    offset: u64,
    returned: u64,
    session_ts: u64,
    cursor: Option<PrimaryKey>,
    cache: QueryResults,
    state: IteratorState,
}

impl<S: VectorService> QueryIterator<S> {
    /// Validate the arguments. No RPC is issued until [`init`](Self::init).
    pub(crate) fn new(conn: Connection<S>, mut args: QueryIteratorArguments) -> Result<Self> {
        dql::validate_dql(&args)?;
        validate_batch_size(args.batch_size)?;
        validate_primary_key(&args.primary_key)?;

        let limit = args.query.limit.take();
        let offset = std::mem::take(&mut args.query.offset);
        Ok(Self {
            conn,
            args,
            limit,
            offset,
            returned: 0,
            session_ts: 0,
            cursor: None,
            cache: QueryResults::default(),
            state: IteratorState::Created,
        })
    }

    /// Capture the session timestamp and skip the offset.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the initial or seek queries.
    pub(crate) fn init(&mut self) -> Result<()> {
        if self.state != IteratorState::Created {
            return Ok(());
        }
        if self.limit == Some(0) {
            self.state = IteratorState::Exhausted;
            return Ok(());
        }

        let request = self.request(1, true);
        let response = self.conn.query(request)?;
        self.session_ts = session_ts_or_now(response.session_ts);
        debug!(
            collection = %self.args.query.options.collection,
            session_ts = self.session_ts,
            "query iterator pinned session timestamp"
        );

        self.seek().map_err(|e| e.context("iterator fails to seek"))?;
        self.state = IteratorState::Initialized;
        Ok(())
    }

    fn seek(&mut self) -> Result<()> {
        let mut left = self.offset;
        while left > 0 {
            let batch = left.min(MAX_BATCH_SIZE);
            let mut request = self.request(batch, false);
            request.output_fields.clear();
            let response = self.conn.query(request)?;
            let page = dql::query_results(response, &[])?;
            let rows = page.row_count().min(to_usize(batch));
            if rows == 0 {
                debug!(skipped = self.offset - left, "data ran out while seeking");
                break;
            }
            self.cursor = Some(self.key_at(&page, rows - 1)?);
            left = left.saturating_sub(rows as u64);
        }
        Ok(())
    }

    /// The next batch of rows; empty once the limit is met or the data ran out.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the query, or
    /// [`Error::Unknown`] if a page lacks the primary-key column.
    pub fn next_batch(&mut self) -> Result<QueryResults> {
        if self.state == IteratorState::Created {
            self.init()?;
        }
        let owed = remaining(self.limit, self.returned);
        if self.state == IteratorState::Exhausted || owed == 0 {
            self.state = IteratorState::Exhausted;
            return Ok(self.cache.empty_like());
        }

        let batch = to_usize(self.args.batch_size);
        let mut output = if self.cache.row_count() >= batch {
            self.take_from_cache(batch)?
        } else {
            self.fetch(batch)?
        };

        let owed = to_usize(owed);
        if output.row_count() > owed {
            output = output.slice(0, owed)?;
        }
        self.returned += output.row_count() as u64;
        self.state = if output.is_empty() {
            IteratorState::Exhausted
        } else {
            IteratorState::Delivering
        };
        Ok(output)
    }

    fn take_from_cache(&mut self, batch: usize) -> Result<QueryResults> {
        let rows = self.cache.row_count();
        let output = self.cache.slice(0, batch)?;
        self.cache = if rows > batch {
            self.cache.slice(batch, rows)?
        } else {
            self.cache.empty_like()
        };
        Ok(output)
    }

    fn fetch(&mut self, batch: usize) -> Result<QueryResults> {
        let request = self.request(batch as u64, true);
        let response = self.conn.query(request)?;
        let page = dql::query_results(response, &self.args.query.options.output_fields)?;
        debug!(rows = page.row_count(), batch, "query iterator fetched page");

        let mut combined = std::mem::take(&mut self.cache);
        combined.append(&page)?;
        let rows = combined.row_count();
        if rows == 0 {
            return Ok(combined);
        }
        if rows <= batch {
            self.cursor = Some(self.key_at(&combined, rows - 1)?);
            return Ok(combined);
        }

        let kept = (rows - batch) / batch * batch;
        let retained = batch + kept;
        self.cursor = Some(self.key_at(&combined, retained - 1)?);
        let output = combined.slice(0, batch)?;
        self.cache = if kept > 0 {
            combined.slice(batch, retained)?
        } else {
            combined.empty_like()
        };
        Ok(output)
    }

    fn key_at(&self, page: &QueryResults, row: usize) -> Result<PrimaryKey> {
        let name = &self.args.primary_key.name;
        page.primary_key_at(name, row)
            .ok_or_else(|| Error::unknown(format!("primary key '{name}' not found in query result")))
    }

    fn cursor_filter(&self) -> String {
        let user = &self.args.query.options.filter;
        match &self.cursor {
            Some(key) => and_filter(
                user,
                &format!("{} > {}", self.args.primary_key.name, key.to_filter_literal()),
            ),
            None => user.clone(),
        }
    }

    fn request(&self, limit: u64, iterating: bool) -> QueryRequest {
        let mut request = dql::base_query_request(&self.args, &self.conn.read_context());
        request.expr = self.cursor_filter();
        if self.session_ts > 0 {
            request.guarantee_timestamp = self.session_ts;
        }
        let params = &mut request.params;
        params.insert(keys::ITERATOR.into(), flag(iterating).into());
        params.insert(
            keys::REDUCE_STOP_FOR_BEST.into(),
            flag(iterating && self.args.reduce_stop_for_best).into(),
        );
        if self.args.collection_id > 0 {
            params.insert(keys::COLLECTION_ID.into(), self.args.collection_id.to_string());
        }
        params.insert(keys::LIMIT.into(), limit.to_string());
        if self.args.query.ignore_growing {
            params.insert(keys::IGNORE_GROWING.into(), flag(true).into());
        }
        request
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

    /// The session timestamp reads are pinned to, 0 before initialization.
    #[must_use]
    pub const fn session_ts(&self) -> u64 {
        self.session_ts
    }
}

batch_iterator!(QueryIterator, QueryResults);
