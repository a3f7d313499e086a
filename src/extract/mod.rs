//! Page extraction as a ranked strategy cascade: structural listing-card
//! selectors first, then embedded state payloads, then free-text
//! segmentation. Exactly one strategy's output is used per page.

pub mod card;
pub mod embedded;
pub mod fields;
pub mod text;

use anyhow::Result;
use tracing::{debug, info};

use crate::record::DraftRecord;
use crate::session::{BrowserSession, Container};

/// Structural queries for listing cards, most specific first. Candidates from
/// the first selector with a non-empty filtered set win.
pub const LISTING_SELECTORS: &[&str] = &[
    r#"article[data-testid="listing-card"]"#,
    r#"div[data-testid="listing-card"]"#,
    ".listing-card",
    ".property-card",
    ".search-result-item",
    r#"div[class*="listing"]"#,
    r#"div[class*="property"]"#,
];

/// Listing cards carry substantial text; shorter matches are nested
/// fragments of a card, not the card itself.
pub const MIN_CARD_TEXT_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Cards,
    EmbeddedJson,
    TextBlocks,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Cards => "cards",
            Strategy::EmbeddedJson => "embedded_json",
            Strategy::TextBlocks => "text_fallback",
        }
    }
}

/// Cascade order. Reorderable, but the ranking below mirrors reliability.
pub const STRATEGY_ORDER: &[Strategy] =
    &[Strategy::Cards, Strategy::EmbeddedJson, Strategy::TextBlocks];

#[derive(Debug, Default)]
pub struct PageExtraction {
    pub strategy: Option<Strategy>,
    pub drafts: Vec<DraftRecord>,
}

/// Try each strategy in rank order and keep the first non-empty result.
/// A page where every strategy misses contributes zero records; that is an
/// empty page, not an error.
pub async fn extract_page<S: BrowserSession>(session: &mut S) -> Result<PageExtraction> {
    for &strategy in STRATEGY_ORDER {
        let drafts = attempt(session, strategy).await?;
        if !drafts.is_empty() {
            info!(strategy = strategy.name(), listings = drafts.len(), "strategy selected");
            return Ok(PageExtraction {
                strategy: Some(strategy),
                drafts,
            });
        }
        debug!(strategy = strategy.name(), "strategy yielded nothing");
    }
    Ok(PageExtraction::default())
}

async fn attempt<S: BrowserSession>(session: &mut S, strategy: Strategy) -> Result<Vec<DraftRecord>> {
    match strategy {
        Strategy::Cards => {
            let Some(containers) = select_card_containers(session).await else {
                return Ok(Vec::new());
            };
            Ok(card::extract_cards(&containers))
        }
        Strategy::EmbeddedJson => {
            let source = session.page_source().await?;
            Ok(embedded::extract_from_source(&source))
        }
        Strategy::TextBlocks => {
            let body = session.body_text().await?;
            Ok(text::extract_from_text(&body))
        }
    }
}

/// Walk the selector list and return the first non-empty set of substantial
/// candidates. A selector the page rejects is skipped, not fatal.
async fn select_card_containers<S: BrowserSession>(session: &mut S) -> Option<Vec<Container>> {
    for selector in LISTING_SELECTORS {
        let containers = match session.query_containers(selector).await {
            Ok(c) => c,
            Err(e) => {
                debug!(selector, "selector query failed: {e}");
                continue;
            }
        };
        let substantial: Vec<Container> = containers
            .into_iter()
            .filter(|c| c.text.trim().len() > MIN_CARD_TEXT_LEN)
            .collect();
        if !substantial.is_empty() {
            debug!(selector, candidates = substantial.len(), "selector matched");
            return Some(substantial);
        }
    }
    None
}
