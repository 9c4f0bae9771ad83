//! Paginating iterators over queries and searches.
//!
//! The server caps every request at [`MAX_BATCH_SIZE`] rows. The iterators
//! here turn one logical request into a sequence of bounded RPCs:
//!
//! - [`QueryIterator`] walks the primary key with a `pk > last` cursor
//! - [`SearchIteratorV1`] probes widening score ranges around the last hit
//! - [`SearchIteratorV2`] follows server-issued continuation tokens
//!
//! All of them hand out batches through `next_batch()`; an empty batch means
//! the iteration is over, and every later call returns an empty batch too.

/// Implements `Iterator` over `next_batch`, stopping at the first empty batch
/// and after the first error.
macro_rules! batch_iterator {
    ($ty:ident, $item:ty) => {
        impl<S: $crate::service::VectorService> Iterator for $ty<S> {
            type Item = $crate::error::Result<$item>;

            fn next(&mut self) -> Option<Self::Item> {
                if self.state == $crate::iterator::IteratorState::Exhausted {
                    return None;
                }
                match self.next_batch() {
                    Ok(batch) if batch.is_empty() => None,
                    Ok(batch) => Some(Ok(batch)),
                    Err(e) => {
                        self.state = $crate::iterator::IteratorState::Exhausted;
                        Some(Err(e))
                    }
                }
            }
        }
    };
}

pub(crate) use batch_iterator;

pub mod cache;
mod probing;
mod query;
mod token;

pub use probing::{SearchIteratorV1, MAX_PROBE_ATTEMPTS, MAX_TIED_IDS};
pub use query::QueryIterator;
pub use token::SearchIteratorV2;

use manifoldb_wire::{FieldSchema, SingleResult};

use crate::dql::{self, SearchIteratorArguments};
use crate::error::{Error, Result};
use crate::service::VectorService;
use crate::timestamp::synthetic_session_ts;

/// Largest number of rows the server returns for one request.
pub const MAX_BATCH_SIZE: u64 = 16384;

/// Lifecycle of an iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    /// Arguments validated, no RPC issued.
    Created,
    /// Session timestamp captured and offset consumed.
    Initialized,
    /// At least one batch has been delivered.
    Delivering,
    /// The row limit was met or the data ran out.
    Exhausted,
}

pub(crate) fn validate_batch_size(batch_size: u64) -> Result<()> {
    if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
        return Err(Error::invalid_argument(format!(
            "batch size must be between 1 and {MAX_BATCH_SIZE}, got {batch_size}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_primary_key(schema: &FieldSchema) -> Result<()> {
    if schema.name.is_empty() {
        return Err(Error::invalid_argument("primary key name must not be empty"));
    }
    if !schema.data_type.is_primary_key_type() {
        return Err(Error::invalid_argument(format!(
            "primary key '{}' has unsupported type {}",
            schema.name, schema.data_type
        )));
    }
    Ok(())
}

/// Checks shared by both search iterators.
pub(crate) fn validate_search(args: &SearchIteratorArguments) -> Result<()> {
    dql::validate_dql(args)?;
    validate_batch_size(args.batch_size)?;
    validate_primary_key(&args.primary_key)?;
    let targets = args.search.num_targets();
    if targets != 1 {
        return Err(Error::invalid_argument(format!(
            "search iterator requires exactly one target vector, got {targets}"
        )));
    }
    if let Some(ef) = args.search.ef() {
        if ef < args.batch_size {
            return Err(Error::invalid_argument(format!(
                "ef ({ef}) must be at least the batch size ({})",
                args.batch_size
            )));
        }
    }
    Ok(())
}

/// AND a clause onto a user filter.
pub(crate) fn and_filter(user: &str, clause: &str) -> String {
    if user.trim().is_empty() {
        clause.to_string()
    } else {
        format!("({user}) and {clause}")
    }
}

/// The server's session timestamp, or the local clock for servers that send 0.
pub(crate) fn session_ts_or_now(ts: u64) -> u64 {
    if ts == 0 {
        synthetic_session_ts()
    } else {
        ts
    }
}

/// Rows still owed under an optional limit.
pub(crate) fn remaining(limit: Option<u64>, returned: u64) -> u64 {
    limit.map_or(u64::MAX, |limit| limit.saturating_sub(returned))
}

/// Convert a row count known to fit in memory.
pub(crate) fn to_usize(count: u64) -> usize {
    usize::try_from(count).unwrap_or(usize::MAX)
}

/// A search iterator of either generation.
pub enum SearchIterator<S> {
    /// Range probing.
    V1(SearchIteratorV1<S>),
    /// Token continuation.
    V2(SearchIteratorV2<S>),
}

impl<S: VectorService> SearchIterator<S> {
    /// The next batch of hits; empty once the iteration is over.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the underlying searches.
    pub fn next_batch(&mut self) -> Result<SingleResult> {
        match self {
            Self::V1(it) => it.next_batch(),
            Self::V2(it) => it.next_batch(),
        }
    }

    /// The lifecycle state.
    #[must_use]
    pub fn state(&self) -> IteratorState {
        match self {
            Self::V1(it) => it.state(),
            Self::V2(it) => it.state(),
        }
    }

    /// Rows delivered so far.
    #[must_use]
    pub fn returned(&self) -> u64 {
        match self {
            Self::V1(it) => it.returned(),
            Self::V2(it) => it.returned(),
        }
    }

    /// Returns `true` for the token-continued generation.
    #[must_use]
    pub const fn is_v2(&self) -> bool {
        matches!(self, Self::V2(_))
    }
}

impl<S: VectorService> Iterator for SearchIterator<S> {
    type Item = Result<SingleResult>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::V1(it) => it.next(),
            Self::V2(it) => it.next(),
        }
    }
}
