//! Turns one listing container into a draft record by running every field
//! parser over its text, then deduplicates batches on (name, price, bedrooms).

use std::collections::HashSet;

use tracing::debug;

use super::fields;
use crate::record::{DraftRecord, RAW_TEXT_CAP};
use crate::session::Container;

pub const METHOD_CARD: &str = "card";

/// Extract a draft from a single listing container. Returns None when the
/// container lacks the minimum (name + price) to be a listing at all.
pub fn extract_card(container: &Container, position: usize) -> Option<DraftRecord> {
    let text = container.text.as_str();

    let mut draft = DraftRecord {
        position_on_page: position,
        extraction_method: METHOD_CARD.to_string(),
        ..Default::default()
    };

    // Name: the card heading when the session captured one, else the first
    // non-empty text line.
    draft.name = container
        .heading
        .clone()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| {
            text.lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_default();

    draft.postal_code = fields::postal_code(&draft.name);

    if let Some((numeric, formatted)) = fields::price(text) {
        draft.price = Some(numeric);
        draft.price_formatted = Some(formatted);
    }
    if let Some((numeric, formatted)) = fields::price_per_sqft(text) {
        draft.price_per_sqft = Some(numeric);
        draft.price_per_sqft_formatted = Some(formatted);
    }
    draft.bedrooms = fields::bedrooms(text);
    draft.bathrooms = fields::bathrooms(text);
    if let Some((numeric, formatted)) = fields::floor_area(text) {
        draft.floor_area_sqft = Some(numeric);
        draft.floor_area_formatted = Some(formatted);
    }
    if let Some((numeric, formatted)) = fields::land_area(text) {
        draft.land_area_sqft = Some(numeric);
        draft.land_area_formatted = Some(formatted);
    }
    draft.property_type = fields::property_type(text).map(str::to_string);
    draft.tenure = fields::tenure(text).map(str::to_string);
    draft.built_year = fields::built_year(text);
    draft.completion_year = fields::completion_year(text);

    if let Some(mrt) = fields::mrt(text) {
        draft.mrt_distance = mrt.distance;
        draft.mrt_line = mrt.line;
        draft.mrt_station = mrt.station;
    }
    draft.district = fields::district(text);

    draft.agent_name = fields::agent_name(text);
    draft.agent_rating = fields::agent_rating(text);
    draft.agent_description = fields::agent_description(text);

    if let Some((date, ago)) = fields::listed_date(text) {
        draft.listed_date = Some(date);
        draft.listed_time_ago = Some(ago);
    }

    draft.listing_url = container
        .link_hrefs
        .iter()
        .find(|href| href.to_lowercase().contains("property"))
        .cloned();

    draft.image_count = container.image_srcs.len();
    draft.main_image_url = container
        .image_srcs
        .first()
        .filter(|src| src.contains("http"))
        .cloned();

    draft.has_virtual_tour = fields::has_virtual_tour(text);
    draft.verified_listing = fields::is_verified_listing(text);
    draft.featured_listing = fields::is_featured_listing(text);

    draft.raw_text = text.chars().take(RAW_TEXT_CAP).collect();

    draft.is_acceptable().then_some(draft)
}

/// Batch extraction over a page's containers with in-batch deduplication.
/// The second and later occurrences of an identity triple are dropped and
/// logged, never surfaced as errors.
pub fn extract_cards(containers: &[Container]) -> Vec<DraftRecord> {
    let mut seen = HashSet::new();
    let mut drafts = Vec::new();

    for (position, container) in containers.iter().enumerate() {
        let Some(draft) = extract_card(container, position) else {
            continue;
        };
        if seen.insert(draft.dedup_key()) {
            drafts.push(draft);
        } else {
            debug!("skipping duplicate listing: {}", draft.name);
        }
    }

    drafts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(text: &str) -> Container {
        Container {
            text: text.to_string(),
            heading: None,
            link_hrefs: vec![],
            image_srcs: vec![],
        }
    }

    const SKYLINE: &str = "Skyline Tower\nS$ 1,250,000\n3 Bed 2 Bath\n900 sqft\nCondominium\nFreehold\n5 min (350 m) from NE11 Woodleigh MRT Station\nListed by Jane Tan";

    #[test]
    fn full_card() {
        let draft = extract_card(&card(SKYLINE), 0).unwrap();
        assert_eq!(draft.name, "Skyline Tower");
        assert_eq!(draft.price, Some(1_250_000));
        assert_eq!(draft.bedrooms, Some(3));
        assert_eq!(draft.bathrooms, Some(2));
        assert_eq!(draft.floor_area_sqft, Some(900));
        assert_eq!(draft.property_type.as_deref(), Some("Condominium"));
        assert_eq!(draft.tenure.as_deref(), Some("Freehold"));
        assert_eq!(draft.mrt_line.as_deref(), Some("NE11"));
        assert_eq!(draft.agent_name.as_deref(), Some("Jane Tan"));
        assert_eq!(draft.extraction_method, METHOD_CARD);
    }

    #[test]
    fn heading_preferred_over_first_line() {
        let mut c = card(SKYLINE);
        c.heading = Some("The Skyline @ Woodleigh".to_string());
        let draft = extract_card(&c, 0).unwrap();
        assert_eq!(draft.name, "The Skyline @ Woodleigh");
    }

    #[test]
    fn rejects_without_price() {
        assert!(extract_card(&card("Skyline Tower\n3 Bed"), 0).is_none());
    }

    #[test]
    fn listing_url_and_images() {
        let mut c = card(SKYLINE);
        c.link_hrefs = vec![
            "https://x.example/agent/jane".into(),
            "https://x.example/property/skyline-tower-123".into(),
        ];
        c.image_srcs = vec![
            "https://img.example/1.jpg".into(),
            "https://img.example/2.jpg".into(),
        ];
        let draft = extract_card(&c, 3).unwrap();
        assert_eq!(
            draft.listing_url.as_deref(),
            Some("https://x.example/property/skyline-tower-123")
        );
        assert_eq!(draft.image_count, 2);
        assert_eq!(draft.main_image_url.as_deref(), Some("https://img.example/1.jpg"));
        assert_eq!(draft.position_on_page, 3);
    }

    #[test]
    fn batch_dedup_drops_second_occurrence() {
        let containers = vec![card(SKYLINE), card(SKYLINE)];
        let drafts = extract_cards(&containers);
        assert_eq!(drafts.len(), 1);
    }

    #[test]
    fn batch_keeps_distinct_listings() {
        let other = SKYLINE.replace("1,250,000", "1,150,000");
        let containers = vec![card(SKYLINE), card(&other)];
        assert_eq!(extract_cards(&containers).len(), 2);
    }

    #[test]
    fn raw_text_is_capped() {
        let long = format!("Big Listing\nS$ 500,000\n{}", "x".repeat(2000));
        let draft = extract_card(&card(&long), 0).unwrap();
        assert_eq!(draft.raw_text.chars().count(), RAW_TEXT_CAP);
    }
}
