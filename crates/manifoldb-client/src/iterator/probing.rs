//! Search iteration by range probing.
//!
//! Each probe searches the score band just beyond the last delivered hit:
//! `range_filter` is pinned to the tail score and `radius` is pushed outward
//! by the current band width times a coefficient that grows with every
//! attempt. Keys tied with the tail score are excluded by a `not in` filter so
//! a boundary row is never delivered twice.

use std::collections::VecDeque;

use manifoldb_wire::protocol::{flag, keys};
use manifoldb_wire::{MetricType, PrimaryKey, SingleResult};
use tracing::{debug, warn};

use super::cache::{cached_rows, fetch_page_from_cache};
use super::{
    and_filter, batch_iterator, remaining, session_ts_or_now, to_usize, validate_search,
    IteratorState, MAX_BATCH_SIZE,
};
use crate::client::Connection;
use crate::dql::{self, SearchArguments, SearchIteratorArguments};
use crate::error::{Error, Result};
use crate::service::VectorService;

/// Probes issued per batch before serving whatever is cached.
pub const MAX_PROBE_ATTEMPTS: u32 = 20;

/// Most keys that may share the tail score.
pub const MAX_TIED_IDS: usize = 100_000;

/// Smallest band width.
const MIN_WIDTH: f64 = 0.05;

/// Over-fetch factor of probe searches.
const PROBE_EXTENSION: u64 = 10;

fn scores_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= f64::from(f32::EPSILON) * a.abs().max(1.0)
}

/// Iterates the hits of a search by probing widening score ranges.
pub struct SearchIteratorV1<S> {
    conn: Connection<S>,
    search: SearchArguments,
    user_radius: Option<f64>,
    metric: MetricType,
    pk_name: String,
    batch_size: u64,
    limit: Option<u64>,
    collection_id: i64,
    returned: u64,
    session_ts: u64,
    width: f64,
    tail_distance: f64,
    tied_ids: Vec<PrimaryKey>,
    cache: VecDeque<SingleResult>,
    template: SingleResult,
    state: IteratorState,
}

impl<S: VectorService> SearchIteratorV1<S> {
    /// Validate the arguments and run the first search.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for invalid arguments or when the
    /// first search matches nothing, or the failure of that search.
    pub(crate) fn new(conn: Connection<S>, args: SearchIteratorArguments) -> Result<Self> {
        validate_search(&args)?;
        let metric = validate_range(&args.search)?;

        let mut iterator = Self {
            conn,
            user_radius: args.search.radius,
            search: args.search,
            metric,
            pk_name: args.primary_key.name,
            batch_size: args.batch_size,
            limit: args.limit,
            collection_id: args.collection_id,
            returned: 0,
            session_ts: 0,
            width: MIN_WIDTH,
            tail_distance: 0.0,
            tied_ids: Vec::new(),
            cache: VecDeque::new(),
            template: SingleResult::default(),
            state: IteratorState::Created,
        };
        iterator.init().map_err(|e| e.context("failed to init search iterator"))?;
        Ok(iterator)
    }

    fn init(&mut self) -> Result<()> {
        let filter = self.search.options.filter.clone();
        let page = self.execute_search(filter, false)?;
        if page.is_empty() {
            return Err(Error::invalid_argument(
                "first page matched no rows, check the radius and range_filter",
            ));
        }
        self.width = page_width(&page)?;
        self.tail_distance = tail_score(&page)?;
        self.tied_ids.clear();
        self.update_tied_ids(&page)?;
        self.template = page.empty_like();
        self.cache.push_back(page);
        self.state = IteratorState::Initialized;
        Ok(())
    }

    /// The next batch of hits; empty once the limit is met or probing finds
    /// nothing more.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of a probe search, or
    /// [`Error::NotSupported`] when too many hits share one score.
    pub fn next_batch(&mut self) -> Result<SingleResult> {
        let owed = remaining(self.limit, self.returned);
        if self.state == IteratorState::Exhausted || owed == 0 {
            self.state = IteratorState::Exhausted;
            return Ok(self.template.empty_like());
        }

        let desired = to_usize(self.batch_size.min(owed));
        if cached_rows(&self.cache) < desired {
            self.fill(desired)?;
        }

        let page = fetch_page_from_cache(&mut self.cache, desired, &self.template)?;
        if page.row_count() as u64 == self.batch_size {
            self.width = page_width(&page)?;
        }
        self.returned += page.row_count() as u64;
        self.state = if page.is_empty() {
            IteratorState::Exhausted
        } else {
            IteratorState::Delivering
        };
        Ok(page)
    }

    fn fill(&mut self, desired: usize) -> Result<()> {
        let mut coefficient = 1.0;
        let mut attempts = 0;
        while cached_rows(&self.cache) < desired {
            if attempts >= MAX_PROBE_ATTEMPTS {
                warn!(
                    attempts,
                    cached = cached_rows(&self.cache),
                    desired,
                    "search probing exceeded max attempts"
                );
                break;
            }
            self.next_range(coefficient);
            let filter = self.exclusion_filter();
            let page = self.execute_search(filter, true)?;
            attempts += 1;
            coefficient += 1.0;
            debug!(
                attempt = attempts,
                rows = page.row_count(),
                radius = ?self.search.radius,
                range_filter = ?self.search.range_filter,
                "search probe"
            );

            if !page.is_empty() {
                self.update_tied_ids(&page)?;
                self.tail_distance = tail_score(&page)?;
                self.width = self.width.max(page_width(&page)?);
                self.cache.push_back(page);
            }
        }
        Ok(())
    }

    /// Move the score band past the tail. Only a user-declared radius bounds it.
    fn next_range(&mut self, coefficient: f64) {
        let step = self.width * coefficient.max(1.0);
        let next_radius = if self.metric.smaller_is_closer() {
            let next = self.tail_distance + step;
            match self.user_radius {
                Some(bound) if next > bound => bound,
                _ => next,
            }
        } else {
            let next = self.tail_distance - step;
            match self.user_radius {
                Some(bound) if next < bound => bound,
                _ => next,
            }
        };
        self.search.radius = Some(next_radius);
        self.search.range_filter = Some(self.tail_distance);
    }

    fn exclusion_filter(&self) -> String {
        let user = &self.search.options.filter;
        if self.tied_ids.is_empty() {
            return user.clone();
        }
        let list = self
            .tied_ids
            .iter()
            .map(PrimaryKey::to_filter_literal)
            .collect::<Vec<_>>()
            .join(", ");
        and_filter(user, &format!("{} not in [{list}]", self.pk_name))
    }

    /// Track the keys sharing the page's tail score. They accumulate while the
    /// tail stays put and reset once it moves.
    fn update_tied_ids(&mut self, page: &SingleResult) -> Result<()> {
        let last = tail_score(page)?;
        let scores = page.scores().ok_or_else(|| missing_column(page.score_name()))?;
        let ids = page.primary_keys().ok_or_else(|| missing_column(page.pk_name()))?;
        let tied = ids
            .into_iter()
            .zip(scores)
            .filter(|(_, score)| scores_equal(f64::from(**score), last))
            .map(|(id, _)| id);

        if scores_equal(last, self.tail_distance) {
            self.tied_ids.extend(tied);
        } else {
            self.tied_ids = tied.collect();
        }

        if self.tied_ids.len() > MAX_TIED_IDS {
            return Err(Error::not_supported(format!(
                "{} hits share the score {last}, more than {MAX_TIED_IDS}",
                self.tied_ids.len()
            )));
        }
        Ok(())
    }

    fn probe_limit(&self, extend: bool) -> u64 {
        let rate = if extend { PROBE_EXTENSION } else { 1 };
        let limit = self.batch_size.saturating_mul(rate).min(MAX_BATCH_SIZE);
        self.search.ef().map_or(limit, |ef| limit.min(ef))
    }

    fn execute_search(&mut self, filter: String, extend: bool) -> Result<SingleResult> {
        self.search.limit = self.probe_limit(extend);
        let mut request = dql::search_request(&self.search, &self.conn.read_context())?;
        request.expr = filter;
        request.params.insert(keys::ITERATOR.into(), flag(true).into());
        if self.collection_id > 0 {
            request.params.insert(keys::COLLECTION_ID.into(), self.collection_id.to_string());
        }
        if self.session_ts > 0 {
            request.guarantee_timestamp = self.session_ts;
        }

        let response = self.conn.search(request)?;
        if self.session_ts == 0 {
            self.session_ts = session_ts_or_now(response.session_ts);
        }
        dql::search_results(response.results, &self.pk_name, &self.search.options.output_fields)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::unknown("the server returned an empty search result"))
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

    /// The current band width.
    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Score of the last hit found so far.
    #[must_use]
    pub const fn tail_distance(&self) -> f64 {
        self.tail_distance
    }
}

batch_iterator!(SearchIteratorV1, SingleResult);

/// Checks specific to range probing; returns the metric to probe with.
fn validate_range(search: &SearchArguments) -> Result<MetricType> {
    if search.offset > 0 {
        return Err(Error::invalid_argument("offset is not supported by the search iterator"));
    }
    let Some(metric) = search.metric_type else {
        return Err(Error::invalid_argument("search iterator requires a metric type"));
    };
    if let (Some(radius), Some(range_filter)) = (search.radius, search.range_filter) {
        if metric.smaller_is_closer() && radius <= range_filter {
            return Err(Error::invalid_argument(format!(
                "{metric} metric type requires radius larger than range_filter"
            )));
        }
        if !metric.smaller_is_closer() && radius >= range_filter {
            return Err(Error::invalid_argument(format!(
                "{metric} metric type requires radius smaller than range_filter"
            )));
        }
    }
    Ok(metric)
}

fn missing_column(name: &str) -> Error {
    Error::unknown(format!("search result is missing column '{name}'"))
}

fn tail_score(page: &SingleResult) -> Result<f64> {
    page.scores()
        .and_then(|s| s.last())
        .map(|&s| f64::from(s))
        .ok_or_else(|| missing_column(page.score_name()))
}

/// Score spread of a page, floored to [`MIN_WIDTH`].
fn page_width(page: &SingleResult) -> Result<f64> {
    let scores = page.scores().ok_or_else(|| missing_column(page.score_name()))?;
    let (Some(&first), Some(&last)) = (scores.first(), scores.last()) else {
        return Ok(MIN_WIDTH);
    };
    let width = (f64::from(first) - f64::from(last)).abs();
    Ok(if width <= 0.0 { MIN_WIDTH } else { width })
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifoldb_wire::FieldData;

    fn page(scores: Vec<f32>) -> SingleResult {
        let ids = (0..scores.len() as i64).collect();
        SingleResult::new(
            "id",
            "score",
            vec![FieldData::int64("id", ids), FieldData::float("score", scores)],
            Vec::<String>::new(),
        )
        .expect("valid page")
    }

    #[test]
    fn test_page_width_floor() {
        assert!((page_width(&page(vec![0.5, 0.5])).expect("width") - MIN_WIDTH).abs() < 1e-12);
        assert!((page_width(&page(vec![0.25, 1.0])).expect("width") - 0.75).abs() < 1e-6);
        assert!((page_width(&page(vec![])).expect("width") - MIN_WIDTH).abs() < 1e-12);
    }

    #[test]
    fn test_range_validation() {
        let base = SearchArguments::new("docs");
        assert!(validate_range(&base).is_err());

        let l2 = base.clone().with_metric_type(MetricType::L2);
        assert!(validate_range(&l2).is_ok());
        assert!(validate_range(&l2.clone().with_offset(3)).is_err());
        assert!(validate_range(&l2.clone().with_radius(2.0).with_range_filter(1.0)).is_ok());
        assert!(validate_range(&l2.with_radius(1.0).with_range_filter(1.0)).is_err());

        let ip = base.with_metric_type(MetricType::Ip);
        assert!(validate_range(&ip.clone().with_radius(0.2).with_range_filter(0.9)).is_ok());
        assert!(validate_range(&ip.with_radius(0.9).with_range_filter(0.2)).is_err());
    }

    #[test]
    fn test_score_equality() {
        assert!(scores_equal(0.5, 0.5));
        assert!(scores_equal(f64::from(0.1f32), f64::from(0.1f32)));
        assert!(!scores_equal(0.5, 0.5001));
    }
}
