//! Draft-to-canonical conversion: validation, fixed bucket tables, and the
//! static location lookups. Bucket boundaries and labels are hand-picked
//! constants carried over unchanged; they are data, not derived logic.

use chrono::{Datelike, Utc};

use crate::extract::fields;
use crate::record::{CanonicalRecord, DraftRecord, DATA_SOURCE};

/// Area-name to district-code lookup, matched case-insensitively against the
/// combined name + MRT station text. Slice order is the tie-break for
/// overlapping area names, so it must stay in this canonical order.
const AREA_DISTRICTS: &[(&str, &str)] = &[
    ("commonwealth", "D03"),
    ("alexandra", "D03"),
    ("toa payoh", "D12"),
    ("choa chu kang", "D23"),
    ("hougang", "D19"),
    ("punggol", "D19"),
    ("sengkang", "D19"),
    ("bishan", "D20"),
    ("ang mo kio", "D20"),
    ("orchard", "D09"),
    ("newton", "D11"),
    ("novena", "D11"),
    ("marina", "D01"),
    ("raffles", "D01"),
    ("chinatown", "D02"),
    ("tanjong pagar", "D02"),
    ("harbourfront", "D04"),
    ("telok blangah", "D04"),
    ("buona vista", "D05"),
    ("west coast", "D05"),
    ("clementi", "D05"),
    ("tanglin", "D10"),
    ("holland", "D10"),
    ("bukit timah", "D10"),
    ("east coast", "D15"),
    ("marine parade", "D15"),
    ("bedok", "D16"),
    ("tampines", "D18"),
    ("pasir ris", "D18"),
    ("woodlands", "D25"),
    ("admiralty", "D25"),
    ("sembawang", "D27"),
    ("yishun", "D27"),
    ("jurong", "D22"),
    ("boon lay", "D22"),
    ("tuas", "D22"),
];

/// MRT line names by 2-character code prefix. Unknown codes fall back to a
/// generic label rather than failing.
const MRT_LINES: &[(&str, &str)] = &[
    ("EW", "East West Line"),
    ("NS", "North South Line"),
    ("NE", "North East Line"),
    ("CC", "Circle Line"),
    ("DT", "Downtown Line"),
    ("TE", "Thomson-East Coast Line"),
    ("BP", "Bukit Panjang LRT"),
    ("SK", "Sengkang LRT"),
    ("PG", "Punggol LRT"),
];

const GENERIC_LINE_NAME: &str = "MRT";

/// Convert an accepted draft into the canonical flat record. Returns None
/// when name, price, or bedrooms is missing; derived fields are computed
/// only from fields that are actually present, never fabricated.
pub fn normalize(draft: &DraftRecord) -> Option<CanonicalRecord> {
    let name = draft.name.trim();
    if name.is_empty() {
        return None;
    }
    let price = draft.price.filter(|p| *p > 0)?;
    let bedrooms = draft.bedrooms?;
    let bathrooms = draft.bathrooms.unwrap_or(bedrooms);

    let price_formatted = draft
        .price_formatted
        .clone()
        .unwrap_or_else(|| format!("S$ {}", group_thousands(price)));

    let psf = draft.price_per_sqft;
    let psf_formatted = psf.map(|n| {
        draft
            .price_per_sqft_formatted
            .clone()
            .unwrap_or_else(|| format!("S$ {} psf", group_thousands(n.round() as u64)))
    });

    let district_code = lookup_district(name, draft.mrt_station.as_deref())
        .map(str::to_string)
        .or_else(|| draft.district.clone());

    // MRT fields require both a station and a distance to be meaningful.
    let has_mrt = draft.mrt_station.is_some() && draft.mrt_distance.is_some();
    let walk_minutes = if has_mrt {
        draft.mrt_distance.as_deref().and_then(fields::walk_minutes)
    } else {
        None
    };
    let line_code = if has_mrt { draft.mrt_line.clone() } else { None };
    let line_name = line_code.as_deref().map(mrt_line_name).map(str::to_string);

    let age = draft.built_year.map(|built| Utc::now().year() - built);

    Some(CanonicalRecord {
        property_name: name.to_string(),
        price_numeric: price,
        price_formatted,
        bedrooms,
        bathrooms,
        floor_area_sqft: draft.floor_area_sqft,
        property_type: draft.property_type.clone(),
        property_url: draft.listing_url.clone(),
        price_range: price_range(price).to_string(),
        price_per_sqft_numeric: psf,
        price_per_sqft_formatted: psf_formatted,
        psf_range: psf.map(|n| psf_range(n).to_string()),
        district_code,
        mrt_station: has_mrt.then(|| draft.mrt_station.clone()).flatten(),
        mrt_distance_text: has_mrt.then(|| draft.mrt_distance.clone()).flatten(),
        mrt_walk_minutes: walk_minutes,
        mrt_distance_category: walk_minutes.map(|m| mrt_distance_category(m).to_string()),
        mrt_line_code: line_code,
        mrt_line_name: line_name,
        built_year: draft.built_year,
        property_age_years: age,
        age_category: age.map(|a| age_category(a).to_string()),
        tenure: draft.tenure.clone(),
        size_category: draft.floor_area_sqft.map(|s| size_category(s).to_string()),
        agent_name: draft.agent_name.clone(),
        listed_date: draft.listed_date.clone(),
        image_count: (draft.image_count > 0).then_some(draft.image_count),
        image_category: (draft.image_count > 0)
            .then(|| image_category(draft.image_count).to_string()),
        main_image_url: draft.main_image_url.clone(),
        extraction_timestamp: Utc::now().to_rfc3339(),
        data_source: DATA_SOURCE.to_string(),
    })
}

/// Lower-inclusive, upper-exclusive price bins.
pub fn price_range(price: u64) -> &'static str {
    if price < 500_000 {
        "Under 500K"
    } else if price < 800_000 {
        "500K-800K"
    } else if price < 1_200_000 {
        "800K-1.2M"
    } else if price < 2_000_000 {
        "1.2M-2M"
    } else if price < 3_000_000 {
        "2M-3M"
    } else if price < 5_000_000 {
        "3M-5M"
    } else {
        "Above 5M"
    }
}

pub fn psf_range(psf: f64) -> &'static str {
    if psf < 600.0 {
        "Under 600"
    } else if psf < 1000.0 {
        "600-1000"
    } else if psf < 1500.0 {
        "1000-1500"
    } else if psf < 2000.0 {
        "1500-2000"
    } else {
        "Above 2000"
    }
}

pub fn mrt_distance_category(walk_minutes: u32) -> &'static str {
    if walk_minutes <= 5 {
        "0-5 min"
    } else if walk_minutes <= 10 {
        "6-10 min"
    } else if walk_minutes <= 15 {
        "11-15 min"
    } else {
        "Above 15 min"
    }
}

pub fn age_category(age_years: i32) -> &'static str {
    if age_years < 5 {
        "0-5 years"
    } else if age_years < 15 {
        "5-15 years"
    } else if age_years < 30 {
        "15-30 years"
    } else {
        "Above 30 years"
    }
}

pub fn size_category(sqft: u64) -> &'static str {
    if sqft < 500 {
        "Under 500 sqft"
    } else if sqft < 800 {
        "500-800 sqft"
    } else if sqft < 1200 {
        "800-1200 sqft"
    } else if sqft < 1800 {
        "1200-1800 sqft"
    } else {
        "Above 1800 sqft"
    }
}

pub fn image_category(count: usize) -> &'static str {
    if count >= 15 {
        "15+ images"
    } else if count >= 8 {
        "8-14 images"
    } else if count >= 3 {
        "3-7 images"
    } else {
        "1-2 images"
    }
}

fn lookup_district(name: &str, mrt_station: Option<&str>) -> Option<&'static str> {
    let haystack = format!("{} {}", name, mrt_station.unwrap_or("")).to_lowercase();
    AREA_DISTRICTS
        .iter()
        .find(|(area, _)| haystack.contains(area))
        .map(|(_, code)| *code)
}

fn mrt_line_name(code: &str) -> &'static str {
    let prefix: String = code.chars().take(2).collect();
    MRT_LINES
        .iter()
        .find(|(c, _)| *c == prefix)
        .map(|(_, name)| *name)
        .unwrap_or(GENERIC_LINE_NAME)
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
