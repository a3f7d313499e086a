//! The sequential page traversal: wait out the anti-bot interstitial,
//! extract each results page through the strategy cascade, normalize the
//! drafts, then advance until the page ceiling, the end of the result set,
//! cancellation, or a stall.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::extract;
use crate::normalize;
use crate::paginate::{self, PaginationState, StallKind};
use crate::record::CanonicalRecord;
use crate::session::BrowserSession;

/// Title fragments shown while the challenge page is up.
const CHALLENGE_MARKERS: &[&str] = &["just a moment", "cloudflare", "checking your browser"];
/// Body fragments that only appear once real results have rendered.
const CONTENT_MARKERS: &[&str] = &["s$", "properties for sale", "property for sale"];
const CHALLENGE_POLL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub max_pages: u32,
    pub start_page: u32,
    /// Page at which a stall stops being an error. See [`PaginationState`].
    pub last_page_hint: u32,
    /// How long to wait for the challenge interstitial to clear.
    pub challenge_wait: Duration,
    /// Pause between pages so the traversal does not hammer the site.
    pub page_delay: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            start_page: 1,
            last_page_hint: 2600,
            challenge_wait: Duration::from_secs(90),
            page_delay: Duration::from_secs(2),
        }
    }
}

/// How a traversal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Reached the configured page ceiling.
    Completed,
    /// Stalled at the natural end of the result set.
    LastPage,
    /// Pagination stopped working mid-run.
    Stalled { page: u32 },
    Cancelled,
}

#[derive(Debug)]
pub struct ScrapeOutcome {
    pub records: Vec<CanonicalRecord>,
    pub pages_visited: u32,
    pub drafts_seen: usize,
    /// Drafts the normalization layer rejected.
    pub skipped: usize,
    pub termination: Termination,
}

/// Drive one traversal over `session`. Records gathered before a stall or
/// cancellation are kept in the outcome.
pub async fn run<S: BrowserSession>(
    session: &mut S,
    config: &ScrapeConfig,
    cancel: &CancellationToken,
) -> Result<ScrapeOutcome> {
    if !await_page_ready(session, config.challenge_wait).await? {
        warn!("page never showed listing content, extracting anyway");
    }

    let start_url = session.current_url().await?;
    let observed = detect_current_page(session).await;
    let mut state = PaginationState::new(config.start_page, config.max_pages, config.last_page_hint);
    state.arrived(observed.max(config.start_page), start_url);
    info!("starting on page {} of at most {}", state.current_page, state.max_pages);

    let pb = ProgressBar::new(config.max_pages as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut records: Vec<CanonicalRecord> = Vec::new();
    let mut seen = HashSet::new();
    let mut drafts_seen = 0usize;
    let mut skipped = 0usize;
    let mut pages_visited = 0u32;

    let termination = loop {
        if cancel.is_cancelled() {
            info!("cancellation requested, stopping after {pages_visited} pages");
            break Termination::Cancelled;
        }

        let extraction = extract::extract_page(session).await?;
        pages_visited += 1;
        drafts_seen += extraction.drafts.len();
        let mut kept_here = 0usize;
        for draft in &extraction.drafts {
            if !seen.insert(draft.dedup_key()) {
                debug!(name = %draft.name, "repeat listing across pages, dropped");
                continue;
            }
            match normalize::normalize(draft) {
                Some(record) => {
                    records.push(record);
                    kept_here += 1;
                }
                None => skipped += 1,
            }
        }
        info!(
            page = state.current_page,
            kept = kept_here,
            total = records.len(),
            "page done"
        );
        pb.inc(1);
        pb.set_message(format!("{} listings", records.len()));

        if !state.should_advance() {
            break Termination::Completed;
        }

        tokio::time::sleep(config.page_delay).await;
        if cancel.is_cancelled() {
            break Termination::Cancelled;
        }

        match advance(session, &mut state).await? {
            None => {}
            Some(StallKind::NaturalEnd) => {
                info!("page {} did not advance near the known end, done", state.current_page);
                break Termination::LastPage;
            }
            Some(StallKind::Fatal) => {
                warn!("pagination stalled on page {}", state.current_page);
                break Termination::Stalled {
                    page: state.current_page,
                };
            }
        }
    };
    state.finish();
    pb.finish_and_clear();

    info!(
        pages = pages_visited,
        records = records.len(),
        skipped,
        "traversal finished: {termination:?}"
    );
    Ok(ScrapeOutcome {
        records,
        pages_visited,
        drafts_seen,
        skipped,
        termination,
    })
}

/// Wait for the anti-bot interstitial to clear and listing content to show.
/// False when the budget runs out without either signal.
async fn await_page_ready<S: BrowserSession>(session: &mut S, budget: Duration) -> Result<bool> {
    let deadline = tokio::time::Instant::now() + budget;
    loop {
        let title = session.title().await.unwrap_or_default().to_lowercase();
        if CHALLENGE_MARKERS.iter().any(|m| title.contains(m)) {
            info!("anti-bot challenge on screen, waiting");
        } else {
            let body = session.body_text().await.unwrap_or_default().to_lowercase();
            if CONTENT_MARKERS.iter().any(|m| body.contains(m)) {
                return Ok(true);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(CHALLENGE_POLL).await;
    }
}

/// Read the current page number: active pagination indicator first, then the
/// URL, else page 1.
async fn detect_current_page<S: BrowserSession>(session: &mut S) -> u32 {
    for selector in paginate::ACTIVE_PAGE_SELECTORS {
        if let Ok(containers) = session.query_containers(selector).await {
            for container in &containers {
                if let Some(page) = paginate::page_from_indicator(&container.text) {
                    return page;
                }
            }
        }
    }
    if let Ok(url) = session.current_url().await {
        if let Some(page) = paginate::page_from_url(&url) {
            return page;
        }
    }
    1
}

/// Move to the next page: URL derivation first, then the on-page next
/// control. None on confirmed progress, otherwise the stall class.
async fn advance<S: BrowserSession>(
    session: &mut S,
    state: &mut PaginationState,
) -> Result<Option<StallKind>> {
    state.advancing();
    let target = state.current_page + 1;

    if let Some(url) = paginate::next_page_url(&state.last_known_url, target) {
        debug!("derived next page address: {url}");
        session.navigate(&url).await?;
        let observed = detect_current_page(session).await;
        let here = session.current_url().await.unwrap_or(url);
        match state.confirm(observed, here) {
            Ok(()) => return Ok(None),
            Err(StallKind::NaturalEnd) => return Ok(Some(StallKind::NaturalEnd)),
            Err(StallKind::Fatal) => {
                warn!("derived address did not advance, trying the next control")
            }
        }
    }

    match find_next_href(session).await? {
        Some(href) => {
            session.navigate(&href).await?;
            let observed = detect_current_page(session).await;
            let here = session.current_url().await.unwrap_or(href);
            Ok(state.confirm(observed, here).err())
        }
        None => {
            let page = state.current_page;
            let here = state.last_known_url.clone();
            Ok(state.confirm(page, here).err())
        }
    }
}

/// First anchor whose visible text mentions "next" among the pagination
/// control probes.
async fn find_next_href<S: BrowserSession>(session: &mut S) -> Result<Option<String>> {
    for selector in paginate::NEXT_LINK_SELECTORS {
        let links = match session.query_links(selector).await {
            Ok(links) => links,
            Err(e) => {
                debug!(selector, "next-control query failed: {e}");
                continue;
            }
        };
        if let Some(link) = links
            .iter()
            .find(|l| !l.href.is_empty() && l.text.to_lowercase().contains("next"))
        {
            return Ok(Some(link.href.clone()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fixture::{FixturePage, FixtureSession};
    use crate::session::{Container, PageLink};

    fn fast_config(max_pages: u32) -> ScrapeConfig {
        ScrapeConfig {
            max_pages,
            challenge_wait: Duration::ZERO,
            page_delay: Duration::ZERO,
            ..ScrapeConfig::default()
        }
    }

    fn listing_card(name: &str, price: &str, extra: &str) -> Container {
        Container {
            text: format!(
                "{name}\nS$ {price}\n3 Bed 2 Bath\n900 sqft\nCondominium\nFreehold\n\
                 5 min (350 m) from NE11 Woodleigh MRT Station\nBuilt: 2016\n\
                 Listed by Jane Tan\n{extra}"
            ),
            heading: Some(name.to_string()),
            link_hrefs: vec![format!(
                "https://example.test/property/{}",
                name.to_lowercase().replace(' ', "-")
            )],
            image_srcs: vec!["https://example.test/img/1.jpg".into()],
        }
    }

    fn card_page(cards: Vec<Container>) -> FixturePage {
        let mut page = FixturePage::default();
        page.body_text = "1,234 Properties For Sale\nS$".into();
        page.containers
            .insert(r#"article[data-testid="listing-card"]"#.to_string(), cards);
        page
    }

    #[tokio::test]
    async fn two_page_run_collects_and_normalizes() {
        let start = "https://example.test/property-for-sale?districtCode=D19";
        let mut session = FixtureSession::new(start);
        session.add_page(
            start,
            card_page(vec![listing_card("Skyline Tower", "1,250,000", "")]),
        );
        session.add_page(
            "https://example.test/property-for-sale/2?districtCode=D19",
            card_page(vec![listing_card("Harbour View", "2,880,000", "")]),
        );

        let cancel = CancellationToken::new();
        let outcome = run(&mut session, &fast_config(2), &cancel).await.unwrap();

        assert_eq!(outcome.termination, Termination::Completed);
        assert_eq!(outcome.pages_visited, 2);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.skipped, 0);

        let skyline = &outcome.records[0];
        assert_eq!(skyline.property_name, "Skyline Tower");
        assert_eq!(skyline.price_numeric, 1_250_000);
        assert_eq!(skyline.price_range, "1.2M-2M");
        assert_eq!(skyline.bedrooms, 3);
        assert_eq!(skyline.bathrooms, 2);
        assert_eq!(skyline.mrt_station.as_deref(), Some("Woodleigh"));
        assert_eq!(skyline.mrt_line_name.as_deref(), Some("North East Line"));
        assert_eq!(skyline.agent_name.as_deref(), Some("Jane Tan"));
    }

    #[tokio::test]
    async fn repeat_listing_across_pages_is_dropped() {
        let start = "https://example.test/property-for-sale?x=1";
        let mut session = FixtureSession::new(start);
        let card = listing_card("Skyline Tower", "1,250,000", "");
        session.add_page(start, card_page(vec![card.clone()]));
        session.add_page(
            "https://example.test/property-for-sale/2?x=1",
            card_page(vec![card]),
        );

        let cancel = CancellationToken::new();
        let outcome = run(&mut session, &fast_config(2), &cancel).await.unwrap();
        assert_eq!(outcome.drafts_seen, 2);
        assert_eq!(outcome.records.len(), 1);
    }

    #[tokio::test]
    async fn stall_far_from_end_terminates_with_stalled() {
        // No path to extend, no next control, so the advance has nowhere to go.
        let start = "https://example.test";
        let mut session = FixtureSession::new(start);
        let mut page = card_page(vec![listing_card("Skyline Tower", "1,250,000", "")]);
        page.containers.insert(
            paginate::ACTIVE_PAGE_SELECTORS[0].to_string(),
            vec![Container {
                text: "10".into(),
                ..Default::default()
            }],
        );
        session.add_page(start, page);

        let cancel = CancellationToken::new();
        let outcome = run(&mut session, &fast_config(50), &cancel).await.unwrap();
        assert_eq!(outcome.termination, Termination::Stalled { page: 10 });
        // Records gathered before the stall survive.
        assert_eq!(outcome.records.len(), 1);
    }

    #[tokio::test]
    async fn stall_near_known_end_is_last_page() {
        let start = "https://example.test";
        let mut session = FixtureSession::new(start);
        let mut page = card_page(vec![listing_card("Skyline Tower", "1,250,000", "")]);
        page.containers.insert(
            paginate::ACTIVE_PAGE_SELECTORS[0].to_string(),
            vec![Container {
                text: "2600".into(),
                ..Default::default()
            }],
        );
        session.add_page(start, page);

        let cancel = CancellationToken::new();
        let outcome = run(&mut session, &fast_config(5000), &cancel).await.unwrap();
        assert_eq!(outcome.termination, Termination::LastPage);
    }

    #[tokio::test]
    async fn next_control_href_rescues_underivable_urls() {
        let start = "https://example.test";
        let mut session = FixtureSession::new(start);
        let mut first = card_page(vec![listing_card("Skyline Tower", "1,250,000", "")]);
        first.links.insert(
            "a.page-link".to_string(),
            vec![PageLink {
                text: "Next ›".into(),
                href: "https://example.test/property-for-sale/2?x=1".into(),
            }],
        );
        session.add_page(start, first);
        session.add_page(
            "https://example.test/property-for-sale/2?x=1",
            card_page(vec![listing_card("Harbour View", "2,880,000", "")]),
        );

        let cancel = CancellationToken::new();
        let outcome = run(&mut session, &fast_config(2), &cancel).await.unwrap();
        assert_eq!(outcome.termination, Termination::Completed);
        assert_eq!(outcome.records.len(), 2);
    }

    #[tokio::test]
    async fn cancellation_before_first_page() {
        let mut session = FixtureSession::new("https://example.test/property-for-sale?x=1");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = run(&mut session, &fast_config(5), &cancel).await.unwrap();
        assert_eq!(outcome.termination, Termination::Cancelled);
        assert_eq!(outcome.pages_visited, 0);
        assert!(outcome.records.is_empty());
    }
}
