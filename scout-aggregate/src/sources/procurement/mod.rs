//! Procurement notices from a provider with two listing endpoints.
//!
//! The keyword-search endpoint is tried first; when it yields nothing the
//! general listing is paged instead and filtered client-side on the title.
//! [`dual_endpoint_fetch`] holds that policy independent of HTTP so it can
//! be exercised against an in-memory endpoint.

pub mod pps;

pub use pps::{PpsConfig, ProcurementAdapter, PPS_BASE_URL, PPS_KEY_VAR};

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::normalize::fields::first_present;
use crate::normalize::timestamp::parse_timestamp;
use crate::normalize::DateWindow;
use crate::types::RawRecord;

/// Title fields used for the client-side keyword filter.
const TITLE_KEYS: &[&str] = &["bidNtceNm", "bidNm", "ntceNm"];

/// Announcement fields checked against the date window.
const ANNOUNCED_KEYS: &[&str] = &["bidNtceDt", "ntceDt", "bidBeginDt"];

/// Which of the two listing endpoints to page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Listing {
    /// Server-side keyword search on the notice title.
    Search,
    /// Everything in the date window.
    General,
}

/// One page of a listing endpoint.
#[async_trait]
pub trait ListingEndpoint: Send + Sync {
    /// Fetch 1-based `page`. An empty page ends pagination.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the page cannot be fetched or read.
    async fn fetch_page(
        &self,
        listing: Listing,
        keyword: Option<&str>,
        page: usize,
    ) -> Result<Vec<RawRecord>, AdapterError>;
}

/// Fetch notices with search-then-fallback paging.
///
/// - With a keyword, the search listing is paged first (at most `page_max`
///   pages, stopping at the first empty page).
/// - If that produced nothing, or there is no keyword, the general listing
///   is paged the same way and, when a keyword was given, filtered on a
///   case-insensitive title substring.
/// - Every collected item is then checked against `window`; items without
///   a readable announcement date are kept.
///
/// A page failure stops that listing but keeps the pages already
/// collected. It is returned as an error only when nothing was collected.
pub async fn dual_endpoint_fetch<E>(
    endpoint: &E,
    keyword: Option<&str>,
    page_max: usize,
    window: Option<&DateWindow>,
) -> Result<Vec<RawRecord>, AdapterError>
where
    E: ListingEndpoint + ?Sized,
{
    let keyword = keyword.map(str::trim).filter(|k| !k.is_empty());

    let mut items = match keyword {
        Some(kw) => collect_pages(endpoint, Listing::Search, Some(kw), page_max).await?,
        None => Vec::new(),
    };

    if items.is_empty() {
        tracing::debug!(keyword = keyword.is_some(), "falling back to general listing");
        items = collect_pages(endpoint, Listing::General, None, page_max).await?;
        if let Some(kw) = keyword {
            let needle = kw.to_lowercase();
            items.retain(|item| {
                first_present(item, TITLE_KEYS)
                    .is_some_and(|title| title.to_lowercase().contains(&needle))
            });
        }
    }

    if let Some(window) = window {
        let before = items.len();
        items.retain(|item| {
            window.admits(first_present(item, ANNOUNCED_KEYS).and_then(|s| parse_timestamp(&s)))
        });
        if items.len() < before {
            tracing::debug!(dropped = before - items.len(), "listing items outside window");
        }
    }

    Ok(items)
}

async fn collect_pages<E>(
    endpoint: &E,
    listing: Listing,
    keyword: Option<&str>,
    page_max: usize,
) -> Result<Vec<RawRecord>, AdapterError>
where
    E: ListingEndpoint + ?Sized,
{
    let mut items = Vec::new();
    for page in 1..=page_max.max(1) {
        match endpoint.fetch_page(listing, keyword, page).await {
            Ok(chunk) if chunk.is_empty() => break,
            Ok(chunk) => items.extend(chunk),
            Err(e) if items.is_empty() => return Err(e),
            Err(e) => {
                tracing::warn!(?listing, page, error = %e, "listing page failed, keeping earlier pages");
                break;
            }
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;
    use std::collections::HashMap;
    use std::sync::Mutex;

    type PageKey = (Listing, usize);

    /// Serves canned pages and records every call.
    #[derive(Default)]
    struct CannedEndpoint {
        pages: HashMap<PageKey, Result<Vec<RawRecord>, AdapterError>>,
        calls: Mutex<Vec<(Listing, Option<String>, usize)>>,
    }

    impl CannedEndpoint {
        fn page(mut self, listing: Listing, page: usize, titles: &[(&str, &str)]) -> Self {
            let records = titles
                .iter()
                .map(|(title, date)| {
                    RawRecord::from_pairs(
                        SourceKind::Procurement,
                        [("bidNtceNm", *title), ("bidNtceDt", *date)],
                    )
                })
                .collect();
            self.pages.insert((listing, page), Ok(records));
            self
        }

        fn failing(mut self, listing: Listing, page: usize) -> Self {
            self.pages
                .insert((listing, page), Err(AdapterError::Transport("connection reset".into())));
            self
        }

        fn calls(&self) -> Vec<(Listing, Option<String>, usize)> {
            self.calls.lock().expect("calls").clone()
        }
    }

    #[async_trait]
    impl ListingEndpoint for CannedEndpoint {
        async fn fetch_page(
            &self,
            listing: Listing,
            keyword: Option<&str>,
            page: usize,
        ) -> Result<Vec<RawRecord>, AdapterError> {
            self.calls
                .lock()
                .expect("calls")
                .push((listing, keyword.map(str::to_owned), page));
            self.pages
                .get(&(listing, page))
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn titles(items: &[RawRecord]) -> Vec<String> {
        items.iter().filter_map(|r| r.text("bidNtceNm")).collect()
    }

    fn june() -> DateWindow {
        DateWindow::new(
            parse_timestamp("202406010000").expect("from"),
            parse_timestamp("202406302359").expect("to"),
        )
    }

    #[tokio::test]
    async fn search_hits_skip_the_general_listing() {
        let endpoint = CannedEndpoint::default()
            .page(Listing::Search, 1, &[("AI 플랫폼 구축", "2024-06-03 10:00:00")])
            .page(Listing::Search, 2, &[("AI 교육", "2024-06-04 10:00:00")]);
        let items = dual_endpoint_fetch(&endpoint, Some("AI"), 3, None).await.expect("ok");
        assert_eq!(titles(&items), vec!["AI 플랫폼 구축", "AI 교육"]);
        assert!(endpoint.calls().iter().all(|(l, _, _)| *l == Listing::Search));
        // Page 3 was empty and ended the loop.
        assert_eq!(endpoint.calls().len(), 3);
    }

    #[tokio::test]
    async fn empty_search_falls_back_and_filters_titles() {
        let endpoint = CannedEndpoint::default().page(
            Listing::General,
            1,
            &[
                ("Healthcare data platform", "2024-06-05 09:00:00"),
                ("Road maintenance", "2024-06-06 09:00:00"),
                ("HEALTHCARE consulting", "2024-06-07 09:00:00"),
            ],
        );
        let items = dual_endpoint_fetch(&endpoint, Some("healthcare"), 2, Some(&june()))
            .await
            .expect("ok");
        assert_eq!(
            titles(&items),
            vec!["Healthcare data platform", "HEALTHCARE consulting"]
        );
        let calls = endpoint.calls();
        assert_eq!(calls[0], (Listing::Search, Some("healthcare".into()), 1));
        assert_eq!(calls[1], (Listing::General, None, 1));
    }

    #[tokio::test]
    async fn no_keyword_pages_general_listing_unfiltered() {
        let endpoint = CannedEndpoint::default()
            .page(Listing::General, 1, &[("a", "2024-06-01 00:00:00")])
            .page(Listing::General, 2, &[("b", "2024-06-02 00:00:00")]);
        let items = dual_endpoint_fetch(&endpoint, Some("   "), 2, None).await.expect("ok");
        assert_eq!(titles(&items), vec!["a", "b"]);
        assert!(endpoint.calls().iter().all(|(l, _, _)| *l == Listing::General));
    }

    #[tokio::test]
    async fn window_drops_dated_items_and_keeps_undated() {
        let endpoint = CannedEndpoint::default().page(
            Listing::General,
            1,
            &[
                ("in", "2024-06-10 12:00:00"),
                ("before", "2024-05-31 23:59:00"),
                ("undated", "not a date"),
            ],
        );
        let items = dual_endpoint_fetch(&endpoint, None, 1, Some(&june())).await.expect("ok");
        assert_eq!(titles(&items), vec!["in", "undated"]);
    }

    #[tokio::test]
    async fn later_page_failure_keeps_earlier_pages() {
        let endpoint = CannedEndpoint::default()
            .page(Listing::Search, 1, &[("AI one", "2024-06-01 00:00:00")])
            .failing(Listing::Search, 2)
            .page(Listing::Search, 3, &[("AI three", "2024-06-01 00:00:00")]);
        let items = dual_endpoint_fetch(&endpoint, Some("AI"), 3, None).await.expect("ok");
        assert_eq!(titles(&items), vec!["AI one"]);
        assert_eq!(endpoint.calls().len(), 2);
    }

    #[tokio::test]
    async fn first_page_failure_is_an_error() {
        let endpoint = CannedEndpoint::default().failing(Listing::Search, 1);
        let err = dual_endpoint_fetch(&endpoint, Some("AI"), 2, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Transport(_)));
        assert_eq!(endpoint.calls().len(), 1);
    }
}
