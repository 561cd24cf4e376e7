//! Search Service
//!
//! Criteria-to-query translation with visibility enforcement and paging.
//! The authorization policy's visibility filter is folded into every search
//! before execution; a role-less actor can never see another applicant's
//! expenses regardless of the criteria they send.

use crate::domain::{AuthorizationPolicy, DomainError, Expense, RequestContext};
use crate::store::{ExpenseStore, PageSpec, SearchCriteria, SortSpec};

/// How many page numbers the pagination window shows
const PAGE_WINDOW_SIZE: i64 = 5;

/// One page of search results with paging metadata.
#[derive(Debug, Clone)]
pub struct PagedResult {
    pub items: Vec<Expense>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
    /// Contiguous run of up to five page numbers centred on the current page
    pub page_window: Vec<i64>,
}

pub struct SearchService {
    store: ExpenseStore,
    policy: AuthorizationPolicy,
}

impl SearchService {
    pub fn new(store: ExpenseStore) -> Self {
        Self {
            store,
            policy: AuthorizationPolicy,
        }
    }

    /// Run a visibility-restricted search. Pages are 1-indexed; out-of-range
    /// page numbers yield an empty item list with intact metadata. Malformed
    /// sort values silently normalise to `(created_at, DESC)`.
    pub async fn execute(
        &self,
        criteria: &SearchCriteria,
        sort: Option<&str>,
        page: i64,
        page_size: i64,
        ctx: &RequestContext,
    ) -> Result<PagedResult, DomainError> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let visibility = self.policy.visibility_filter(ctx);
        let sort = SortSpec::normalize(sort);
        let page_spec = PageSpec::new((page - 1) * page_size, page_size);

        let (items, total) = self
            .store
            .search(criteria, visibility, sort, page_spec)
            .await?;

        let total_pages = if total == 0 {
            0
        } else {
            (total + page_size - 1) / page_size
        };

        tracing::debug!(
            actor_id = ctx.actor_id(),
            trace_id = ctx.trace_id(),
            total,
            page,
            sort = %sort,
            "expense search executed"
        );

        Ok(PagedResult {
            items,
            page,
            page_size,
            total,
            total_pages,
            page_window: page_window(page, total_pages, PAGE_WINDOW_SIZE),
        })
    }
}

/// Contiguous page numbers centred on `current`, clipped to
/// `[1, total_pages]`, always of length `min(display, total_pages)`.
fn page_window(current: i64, total_pages: i64, display: i64) -> Vec<i64> {
    if total_pages < display {
        return (1..=total_pages).collect();
    }

    let current = current.clamp(1, total_pages);
    let mut start = (current - 2).max(1);
    let end = (start + display - 1).min(total_pages);
    if end == total_pages {
        start = end - display + 1;
    }

    (start..=end).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_window_empty_when_no_results() {
        assert!(page_window(1, 0, 5).is_empty());
    }

    #[test]
    fn test_page_window_short_totals() {
        assert_eq!(page_window(1, 1, 5), vec![1]);
        assert_eq!(page_window(2, 3, 5), vec![1, 2, 3]);
        assert_eq!(page_window(4, 4, 5), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_page_window_centres_on_current() {
        assert_eq!(page_window(5, 10, 5), vec![3, 4, 5, 6, 7]);
        assert_eq!(page_window(6, 20, 5), vec![4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_page_window_clips_at_edges() {
        assert_eq!(page_window(1, 10, 5), vec![1, 2, 3, 4, 5]);
        assert_eq!(page_window(2, 10, 5), vec![1, 2, 3, 4, 5]);
        assert_eq!(page_window(9, 10, 5), vec![6, 7, 8, 9, 10]);
        assert_eq!(page_window(10, 10, 5), vec![6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_page_window_length_and_containment() {
        for total in 1..=12 {
            for current in 1..=total {
                let window = page_window(current, total, 5);
                assert_eq!(window.len() as i64, total.min(5), "total={total}");
                assert!(
                    window.contains(&current),
                    "window {window:?} must contain page {current} of {total}"
                );
                // contiguous
                for pair in window.windows(2) {
                    assert_eq!(pair[1], pair[0] + 1);
                }
            }
        }
    }

    #[test]
    fn test_page_window_out_of_range_current() {
        // A request beyond the last page still yields a valid window
        assert_eq!(page_window(99, 10, 5), vec![6, 7, 8, 9, 10]);
    }
}
