//! The page cache shared by the search iterators.

use std::collections::VecDeque;

use manifoldb_wire::SingleResult;

use crate::error::Result;

/// Total rows held by the cache.
#[must_use]
pub fn cached_rows(cache: &VecDeque<SingleResult>) -> usize {
    cache.iter().map(SingleResult::row_count).sum()
}

/// Take up to `count` rows from the front of the cache.
///
/// Whole pages are popped while they fit. A page that would overshoot is
/// split: its head goes to the output and a copy of its tail returns to the
/// front of the cache, so the order of cached rows is kept. With an empty
/// cache the result is an empty page named like `template`.
///
/// # Errors
///
/// Returns [`Error::Unknown`](crate::Error::Unknown) if cached pages do not
/// share the same columns.
pub fn fetch_page_from_cache(
    cache: &mut VecDeque<SingleResult>,
    count: usize,
    template: &SingleResult,
) -> Result<SingleResult> {
    let mut output = template.empty_like();
    let mut rows = 0;

    while rows < count {
        let Some(page) = cache.pop_front() else {
            break;
        };
        let page_rows = page.row_count();
        if page_rows == 0 {
            continue;
        }

        if rows + page_rows <= count {
            absorb(&mut output, page)?;
            rows += page_rows;
        } else {
            let take = count - rows;
            let head = page.slice(0, take)?;
            let tail = page.slice(take, page_rows)?;
            absorb(&mut output, head)?;
            cache.push_front(tail);
            rows += take;
        }
    }
    Ok(output)
}

fn absorb(output: &mut SingleResult, page: SingleResult) -> Result<()> {
    if output.fields().is_empty() {
        *output = page;
    } else {
        output.append(&page)?;
    }
    Ok(())
}
