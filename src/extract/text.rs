//! Last-resort extraction: segment the page body text on price tokens and
//! treat each segment as one candidate listing. Deliberately noisy, so the
//! result is capped.

use std::sync::LazyLock;

use regex::Regex;

use crate::record::DraftRecord;

use super::fields;

pub const METHOD_TEXT: &str = "text_fallback";

/// Segments shorter than this are fragments, not listings.
const MIN_BLOCK_LEN: usize = 50;

/// Upper bound on candidates taken from one page of free text.
const MAX_TEXT_RECORDS: usize = 25;

const TEXT_RAW_CAP: usize = 300;

static PRICE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"S\$\s*([\d,]+)").unwrap());

/// Split the visible body text on currency-prefixed price tokens. Each block
/// keeps the price token that opened it; name comes from the block's first
/// non-empty line, the rest via the text-mode field parsers.
pub fn extract_from_text(body_text: &str) -> Vec<DraftRecord> {
    let matches: Vec<_> = PRICE_TOKEN_RE.captures_iter(body_text).collect();
    let mut drafts = Vec::new();

    for (i, caps) in matches.iter().enumerate() {
        if drafts.len() >= MAX_TEXT_RECORDS {
            break;
        }
        let Some(price) = caps
            .get(1)
            .and_then(|m| m.as_str().replace(',', "").parse::<u64>().ok())
        else {
            continue;
        };

        let start = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let end = matches
            .get(i + 1)
            .and_then(|c| c.get(0))
            .map(|m| m.start())
            .unwrap_or(body_text.len());
        let block = body_text[start..end].trim();
        if block.len() < MIN_BLOCK_LEN {
            continue;
        }

        let name = block
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string();

        let draft = DraftRecord {
            name,
            price: Some(price),
            price_formatted: Some(format!("S$ {}", caps.get(1).map(|m| m.as_str()).unwrap_or(""))),
            bedrooms: fields::bedrooms(block),
            floor_area_sqft: fields::floor_area(block).map(|(n, _)| n),
            raw_text: block.chars().take(TEXT_RAW_CAP).collect(),
            extraction_method: METHOD_TEXT.to_string(),
            position_on_page: drafts.len(),
            ..Default::default()
        };

        if draft.is_acceptable() {
            drafts.push(draft);
        }
    }

    drafts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_keep_their_opening_price() {
        let body = "header noise\n\
            S$ 1,250,000\nSkyline Tower\n3 Bed 2 Bath\n900 sqft\nCondominium near the park\n\
            S$ 980,000\nThe Arte\n2 Bed 1 Bath\n700 sqft\nFreehold boutique apartment\n";
        let drafts = extract_from_text(body);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].price, Some(1_250_000));
        assert_eq!(drafts[0].name, "Skyline Tower");
        assert_eq!(drafts[0].bedrooms, Some(3));
        assert_eq!(drafts[0].floor_area_sqft, Some(900));
        assert_eq!(drafts[1].price, Some(980_000));
        assert_eq!(drafts[1].name, "The Arte");
    }

    #[test]
    fn short_fragments_are_skipped() {
        let body = "S$ 500,000\ntoo short\nS$ 750,000\nProper Condo Name\n2 Bed 1 Bath\n650 sqft with a long enough tail";
        let drafts = extract_from_text(body);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].price, Some(750_000));
    }

    #[test]
    fn result_is_capped() {
        let mut body = String::new();
        for i in 0..40 {
            body.push_str(&format!(
                "S$ {},000\nListing Number {}\n3 Bed 2 Bath\n900 sqft of living space here\n",
                500 + i,
                i
            ));
        }
        assert_eq!(extract_from_text(&body).len(), 25);
    }

    #[test]
    fn no_prices_no_candidates() {
        assert!(extract_from_text("nothing for sale on this page").is_empty());
    }
}
