//! Embedded-data extraction: when no listing cards are selectable, the page's
//! raw markup often still carries the listings as a serialized state payload.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::record::DraftRecord;

pub const METHOD_EMBEDDED: &str = "embedded_json";

/// Keys that commonly hold the listing array inside a state payload.
const CONTAINER_KEYS: &[&str] = &["listings", "properties", "results", "data"];

/// Guard against cyclic or pathological nesting in untrusted payloads.
const MAX_DEPTH: usize = 12;

static STATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?s)window\.__INITIAL_STATE__\s*=\s*(\{.*?\});").unwrap(),
        Regex::new(r"(?s)window\.__NEXT_DATA__\s*=\s*(\{.*?\});").unwrap(),
        Regex::new(r#"(?s)"listings":\s*(\[.*?\])"#).unwrap(),
    ]
});

/// Scan the page source for known state-payload markers and pull drafts out
/// of the first payload that parses and yields anything.
pub fn extract_from_source(page_source: &str) -> Vec<DraftRecord> {
    for re in STATE_PATTERNS.iter() {
        for caps in re.captures_iter(page_source) {
            let Some(raw) = caps.get(1) else { continue };
            let Ok(value) = serde_json::from_str::<Value>(raw.as_str()) else {
                continue;
            };
            let mut drafts = Vec::new();
            // The bare "listings": [...] marker captures the array itself.
            if let Value::Array(items) = &value {
                collect_listings(items, &mut drafts);
            } else {
                walk(&value, 0, &mut drafts);
            }
            if !drafts.is_empty() {
                debug!("embedded payload yielded {} drafts", drafts.len());
                return drafts;
            }
        }
    }
    Vec::new()
}

/// Bounded-depth search for a listing-like array container.
fn walk(value: &Value, depth: usize, out: &mut Vec<DraftRecord>) {
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if CONTAINER_KEYS.contains(&key.as_str()) {
                    if let Value::Array(items) = child {
                        collect_listings(items, out);
                        continue;
                    }
                }
                walk(child, depth + 1, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, depth + 1, out);
            }
        }
        _ => {}
    }
}

fn collect_listings(items: &[Value], out: &mut Vec<DraftRecord>) {
    for item in items {
        if looks_like_listing(item) {
            let position = out.len();
            if let Some(draft) = parse_listing(item, position) {
                out.push(draft);
            }
        }
    }
}

/// A listing-like object mentions a price somewhere in its serialized form.
fn looks_like_listing(item: &Value) -> bool {
    item.is_object()
        && serde_json::to_string(item)
            .map(|s| s.to_lowercase().contains("price"))
            .unwrap_or(false)
}

/// Map the common payload keys into a draft-compatible shape. Objects with no
/// usable price are dropped.
fn parse_listing(item: &Value, position: usize) -> Option<DraftRecord> {
    let price = number_field(item, "price")?;

    let name = string_field(item, "title")
        .or_else(|| string_field(item, "address"))
        .unwrap_or_default();

    let draft = DraftRecord {
        name,
        price: Some(price),
        bedrooms: number_field(item, "bedrooms").map(|n| n as u32),
        bathrooms: number_field(item, "bathrooms").map(|n| n as u32),
        floor_area_sqft: number_field(item, "area"),
        extraction_method: METHOD_EMBEDDED.to_string(),
        position_on_page: position,
        ..Default::default()
    };

    draft.is_acceptable().then_some(draft)
}

fn string_field(item: &Value, key: &str) -> Option<String> {
    item.get(key)?.as_str().map(str::to_string)
}

fn number_field(item: &Value, key: &str) -> Option<u64> {
    let v = item.get(key)?;
    v.as_u64()
        .or_else(|| v.as_f64().map(|f| f as u64))
        .or_else(|| v.as_str().and_then(|s| s.replace(',', "").parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_payload() {
        let html = r#"<script>window.__INITIAL_STATE__ = {"search":{"listings":[
            {"title":"Skyline Tower","price":1250000,"bedrooms":3,"bathrooms":2,"area":900},
            {"title":"No Price Here"}
        ]}};</script>"#;
        let drafts = extract_from_source(html);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].name, "Skyline Tower");
        assert_eq!(drafts[0].price, Some(1_250_000));
        assert_eq!(drafts[0].floor_area_sqft, Some(900));
        assert_eq!(drafts[0].extraction_method, METHOD_EMBEDDED);
    }

    #[test]
    fn bare_listings_array() {
        let html = r#"var cfg = {"listings": [{"title":"The Arte","price":"2,100,000","bedrooms":4}]};"#;
        let drafts = extract_from_source(html);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].price, Some(2_100_000));
    }

    #[test]
    fn address_fallback_for_name() {
        let html = r#"window.__NEXT_DATA__ = {"props":{"results":[{"address":"8 Farrer Rd","price":980000}]}};"#;
        let drafts = extract_from_source(html);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].name, "8 Farrer Rd");
    }

    #[test]
    fn depth_limit_stops_pathological_nesting() {
        let mut inner = r#"{"properties":[{"title":"Deep","price":500000}]}"#.to_string();
        for _ in 0..20 {
            inner = format!(r#"{{"nest":{}}}"#, inner);
        }
        let html = format!("window.__INITIAL_STATE__ = {};", inner);
        assert!(extract_from_source(&html).is_empty());
    }

    #[test]
    fn no_markers_no_drafts() {
        assert!(extract_from_source("<html><body>hello</body></html>").is_empty());
    }
}
