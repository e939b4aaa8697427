//! Cursor pagination over newest-first edge lists with a time-window filter.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::calendar::TimeWindow;

/// One upstream page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Edges, newest first.
    pub items: Vec<T>,
    /// Cursor for the following page, `None` on the last page.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// Fetch pages until the edges fall behind `window`, keeping those inside it.
///
/// Edges newer than `window.end` are skipped; the first edge older than
/// `window.start` ends pagination without requesting further pages.
pub async fn collect_window<T, E, F, Fut, D>(
    window: &TimeWindow,
    mut fetch_page: F,
    date_of: D,
) -> Result<Vec<T>, E>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
    D: Fn(&T) -> DateTime<Utc>,
{
    let mut collected = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = fetch_page(cursor.take()).await?;
        pages += 1;

        for item in page.items {
            let at = date_of(&item);
            if at > window.end {
                continue;
            }
            if at < window.start {
                tracing::trace!(pages, kept = collected.len(), "window exhausted");
                return Ok(collected);
            }
            collected.push(item);
        }

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    tracing::trace!(pages, kept = collected.len(), "reached last page");
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn day0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap()
    }

    fn d(offset: i64) -> DateTime<Utc> {
        day0() + Duration::days(offset)
    }

    /// Serves pages in order and records the cursors it was asked for.
    struct Pages {
        pages: Mutex<VecDeque<Page<DateTime<Utc>>>>,
        cursors: Mutex<Vec<Option<String>>>,
    }

    impl Pages {
        fn new(pages: Vec<Vec<DateTime<Utc>>>) -> Self {
            let count = pages.len();
            let pages = pages
                .into_iter()
                .enumerate()
                .map(|(i, items)| {
                    let next = (i + 1 < count).then(|| format!("cursor-{}", i + 1));
                    Page::new(items, next)
                })
                .collect();
            Self {
                pages: Mutex::new(pages),
                cursors: Mutex::new(Vec::new()),
            }
        }

        async fn fetch(&self, cursor: Option<String>) -> Result<Page<DateTime<Utc>>, String> {
            self.cursors.lock().unwrap().push(cursor);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| "fetched past the last page".to_string())
        }

        fn calls(&self) -> usize {
            self.cursors.lock().unwrap().len()
        }
    }

    #[tokio::test]
    async fn keeps_inclusive_window_and_stops_at_first_older_edge() {
        let pages = Pages::new(vec![
            vec![d(3), d(1)],
            vec![d(0), d(-1), d(-3)],
            vec![d(-4), d(-5)],
        ]);
        let window = TimeWindow::new(d(-1), d(1));

        let items = collect_window(&window, |c| pages.fetch(c), |at| *at)
            .await
            .unwrap();

        assert_eq!(items, vec![d(1), d(0), d(-1)]);
        assert_eq!(pages.calls(), 2);
        assert_eq!(
            *pages.cursors.lock().unwrap(),
            vec![None, Some("cursor-1".to_string())]
        );
    }

    #[tokio::test]
    async fn newer_edges_on_early_pages_do_not_stop_pagination() {
        let pages = Pages::new(vec![vec![d(9), d(8)], vec![d(7), d(6)], vec![d(0)]]);
        let window = TimeWindow::new(d(-1), d(1));

        let items = collect_window(&window, |c| pages.fetch(c), |at| *at)
            .await
            .unwrap();

        assert_eq!(items, vec![d(0)]);
        assert_eq!(pages.calls(), 3);
    }

    #[tokio::test]
    async fn empty_upstream_yields_empty_result() {
        let pages = Pages::new(vec![vec![]]);
        let window = TimeWindow::new(d(-1), d(1));

        let items = collect_window(&window, |c| pages.fetch(c), |at| *at)
            .await
            .unwrap();

        assert!(items.is_empty());
        assert_eq!(pages.calls(), 1);
    }

    #[tokio::test]
    async fn page_errors_propagate() {
        let window = TimeWindow::new(d(-1), d(1));
        let err = collect_window(
            &window,
            |_c| async { Err::<Page<DateTime<Utc>>, _>("boom") },
            |at| *at,
        )
        .await
        .unwrap_err();

        assert_eq!(err, "boom");
    }
}
