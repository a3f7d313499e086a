//! Page-traversal state machine: current-page detection, next-page address
//! derivation, and stall classification. The site's page-1 URL carries no
//! page segment; page N >= 2 inserts one before the query string.

use std::sync::LazyLock;

use regex::Regex;

static FIRST_INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());
static PAGE_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?&]page=(\d+)").unwrap());

/// Pagination indicator probes, most site-specific first.
pub const ACTIVE_PAGE_SELECTORS: &[&str] = &[
    ".hui-pagination .page-item.active .page-link",
    ".pagination .page-item.active .page-link",
];

/// Probes for the on-page "next" control, used when URL derivation does not
/// apply. Only anchors whose visible text mentions "next" count.
pub const NEXT_LINK_SELECTORS: &[&str] = &[
    ".hui-pagination a.page-link",
    ".pagination a.page-link",
    "a.page-link",
    r#"a[aria-label="Next"]"#,
    r#"a[title="Next"]"#,
    ".pagination-next",
    r#"[data-testid="pagination-next"]"#,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    OnPage,
    Advancing,
    Done,
    Stalled,
}

/// What a failed page advance means, by where it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallKind {
    /// Stalled near the known last page: natural end of the result set.
    NaturalEnd,
    /// Stalled far from the end: pagination is broken for this run.
    Fatal,
}

/// Ephemeral state for one multi-page traversal.
#[derive(Debug, Clone)]
pub struct PaginationState {
    pub phase: Phase,
    pub current_page: u32,
    pub max_pages: u32,
    /// Stalling at or beyond this page is a natural end, not a failure.
    /// Policy constant inherited from the site's observed page count.
    pub last_page_hint: u32,
    pub last_known_url: String,
    pub stalls: u32,
}

impl PaginationState {
    pub fn new(start_page: u32, max_pages: u32, last_page_hint: u32) -> Self {
        Self {
            phase: Phase::Init,
            current_page: start_page.max(1),
            max_pages: max_pages.max(1),
            last_page_hint,
            last_known_url: String::new(),
            stalls: 0,
        }
    }

    /// First successful attachment/navigation observed.
    pub fn arrived(&mut self, page: u32, url: String) {
        self.current_page = page;
        self.last_known_url = url;
        self.phase = Phase::OnPage;
    }

    pub fn should_advance(&self) -> bool {
        self.phase == Phase::OnPage && self.current_page < self.max_pages
    }

    pub fn advancing(&mut self) {
        self.phase = Phase::Advancing;
    }

    /// Re-read page number after navigating. Strict increase confirms
    /// progress; anything else is a stall, classified by position.
    pub fn confirm(&mut self, observed_page: u32, url: String) -> Result<(), StallKind> {
        if observed_page > self.current_page {
            self.current_page = observed_page;
            self.last_known_url = url;
            self.phase = Phase::OnPage;
            Ok(())
        } else {
            self.stalls += 1;
            self.phase = Phase::Stalled;
            Err(self.classify_stall())
        }
    }

    pub fn classify_stall(&self) -> StallKind {
        if self.current_page >= self.last_page_hint {
            StallKind::NaturalEnd
        } else {
            StallKind::Fatal
        }
    }

    pub fn finish(&mut self) {
        self.phase = Phase::Done;
    }
}

/// Page number from an active-pagination-indicator's text ("2\n(current)").
pub fn page_from_indicator(text: &str) -> Option<u32> {
    FIRST_INT_RE.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Page number from the URL: a trailing numeric path segment, else a
/// `page=` query parameter.
pub fn page_from_url(url: &str) -> Option<u32> {
    let (path, _) = split_query(url);
    if let Some(segment) = path.rsplit('/').next() {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            return segment.parse().ok();
        }
    }
    PAGE_PARAM_RE.captures(url)?.get(1)?.as_str().parse().ok()
}

/// Derive the next page's address from the current one. Page-1 URLs gain a
/// page segment immediately before the query string; later pages have their
/// segment replaced. None when the URL has no path to extend.
pub fn next_page_url(current_url: &str, next_page: u32) -> Option<String> {
    let (path, query) = split_query(current_url);

    let after_scheme = path.find("://").map(|i| i + 3).unwrap_or(0);
    if !path[after_scheme..].contains('/') {
        return None;
    }

    let derived = match path.rsplit_once('/') {
        Some((head, segment))
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) =>
        {
            format!("{}/{}", head, next_page)
        }
        _ => format!("{}/{}", path.trim_end_matches('/'), next_page),
    };

    match query {
        Some(q) => Some(format!("{}?{}", derived, q)),
        None => Some(derived),
    }
}

fn split_query(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE1: &str = "https://www.propertyguru.com.sg/property-for-sale?districtCode=D19&isCommercial=false";

    #[test]
    fn derives_page_two_by_inserting_segment() {
        let next = next_page_url(PAGE1, 2).unwrap();
        assert_eq!(
            next,
            "https://www.propertyguru.com.sg/property-for-sale/2?districtCode=D19&isCommercial=false"
        );
    }

    #[test]
    fn derives_page_three_by_replacing_segment() {
        let page2 = "https://www.propertyguru.com.sg/property-for-sale/2?districtCode=D19";
        assert_eq!(
            next_page_url(page2, 3).unwrap(),
            "https://www.propertyguru.com.sg/property-for-sale/3?districtCode=D19"
        );
    }

    #[test]
    fn derivation_without_query_string() {
        assert_eq!(
            next_page_url("https://example.test/search", 2).unwrap(),
            "https://example.test/search/2"
        );
    }

    #[test]
    fn derivation_needs_a_path() {
        assert!(next_page_url("https://example.test", 2).is_none());
    }

    #[test]
    fn page_number_from_url() {
        assert_eq!(page_from_url(PAGE1), None);
        assert_eq!(
            page_from_url("https://www.propertyguru.com.sg/property-for-sale/7?x=1"),
            Some(7)
        );
        assert_eq!(page_from_url("https://example.test/list?page=4"), Some(4));
    }

    #[test]
    fn page_number_from_indicator_text() {
        assert_eq!(page_from_indicator("2\n(current)"), Some(2));
        assert_eq!(page_from_indicator("(current)"), None);
    }

    #[test]
    fn stall_near_hint_is_natural_end() {
        let mut st = PaginationState::new(2600, 5000, 2600);
        st.arrived(2600, "u".into());
        st.advancing();
        assert_eq!(st.confirm(2600, "u".into()), Err(StallKind::NaturalEnd));
    }

    #[test]
    fn stall_far_from_hint_is_fatal() {
        let mut st = PaginationState::new(1, 50, 2600);
        st.arrived(10, "u".into());
        st.advancing();
        assert_eq!(st.confirm(10, "u".into()), Err(StallKind::Fatal));
        assert_eq!(st.phase, Phase::Stalled);
    }

    #[test]
    fn strict_increase_confirms_progress() {
        let mut st = PaginationState::new(1, 50, 2600);
        st.arrived(1, "a".into());
        st.advancing();
        assert!(st.confirm(2, "b".into()).is_ok());
        assert_eq!(st.phase, Phase::OnPage);
        assert_eq!(st.current_page, 2);
        assert_eq!(st.last_known_url, "b");
    }

    #[test]
    fn advance_gate_respects_page_ceiling() {
        let mut st = PaginationState::new(1, 2, 2600);
        st.arrived(1, "a".into());
        assert!(st.should_advance());
        st.advancing();
        st.confirm(2, "b".into()).unwrap();
        assert!(!st.should_advance());
    }
}
