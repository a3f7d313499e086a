//! One pattern-matcher per semantic listing field. Each parser is a pure
//! function over the listing text returning `Option`: no match means the
//! field is simply absent, never an error. Parsers are independent and may
//! run in any order.

use std::sync::LazyLock;

use regex::Regex;

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"S\$\s*([\d,]+(?:\.\d+)?)").unwrap());
static PSF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)S\$\s*([\d,]+(?:\.\d+)?)\s*psf").unwrap());
static BED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*Bed").unwrap());
static BATH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*Bath").unwrap());
static AREA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)([\d,]+)\s*sqft").unwrap());
static LAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([\d,]+)\s*sqft\s*\(land\)").unwrap());
static BUILT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Built:\s*(\d{4})").unwrap());
static COMPLETION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"New Project:\s*(\d{4})").unwrap());
static POSTAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{6})").unwrap());
static LISTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Listed on\s*([^(]+)\s*\(([^)]+)\)").unwrap());
static AGENT_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(Contact|Agent)$").unwrap());
static WALK_MINUTES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());

/// Vocabulary order is the tie-break: the first entry found anywhere in the
/// text wins, regardless of where it appears.
pub const PROPERTY_TYPES: &[&str] = &[
    "HDB Flat",
    "Condominium",
    "Apartment",
    "Terraced House",
    "Semi-Detached House",
    "Detached House",
    "Good Class Bungalow",
    "Shophouse",
    "Commercial",
    "Industrial",
];

pub const TENURES: &[&str] = &[
    "Freehold",
    "99-year Leasehold",
    "999-year Leasehold",
    "Leasehold",
];

/// First currency-prefixed numeral run in the text, as (numeric, formatted).
/// Thousands separators are stripped; a decimal tail is truncated.
pub fn price(text: &str) -> Option<(u64, String)> {
    let caps = PRICE_RE.captures(text)?;
    let raw = caps.get(1)?.as_str();
    let numeric = parse_grouped_int(raw)?;
    Some((numeric, format!("S$ {}", raw)))
}

/// Per-square-foot price, matched by its "psf" suffix.
pub fn price_per_sqft(text: &str) -> Option<(f64, String)> {
    let caps = PSF_RE.captures(text)?;
    let raw = caps.get(1)?.as_str();
    let numeric: f64 = raw.replace(',', "").parse().ok()?;
    Some((numeric, format!("S$ {} psf", raw)))
}

pub fn bedrooms(text: &str) -> Option<u32> {
    first_int(&BED_RE, text)
}

pub fn bathrooms(text: &str) -> Option<u32> {
    first_int(&BATH_RE, text)
}

pub fn floor_area(text: &str) -> Option<(u64, String)> {
    let caps = AREA_RE.captures(text)?;
    let raw = caps.get(1)?.as_str();
    Some((parse_grouped_int(raw)?, format!("{} sqft", raw)))
}

/// Stricter area variant requiring the trailing "(land)" qualifier.
pub fn land_area(text: &str) -> Option<(u64, String)> {
    let caps = LAND_RE.captures(text)?;
    let raw = caps.get(1)?.as_str();
    Some((parse_grouped_int(raw)?, format!("{} sqft (land)", raw)))
}

pub fn property_type(text: &str) -> Option<&'static str> {
    PROPERTY_TYPES.iter().find(|t| text.contains(*t)).copied()
}

pub fn tenure(text: &str) -> Option<&'static str> {
    TENURES.iter().find(|t| text.contains(*t)).copied()
}

pub fn built_year(text: &str) -> Option<i32> {
    BUILT_RE.captures(text)?.get(1)?.as_str().parse().ok()
}

pub fn completion_year(text: &str) -> Option<i32> {
    COMPLETION_RE.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Six-digit postal code, usually embedded in the address line.
pub fn postal_code(text: &str) -> Option<String> {
    Some(POSTAL_RE.captures(text)?.get(1)?.as_str().to_string())
}

/// MRT proximity details. Whichever sub-fields the winning pattern captured
/// are populated; the rest stay absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MrtInfo {
    pub distance: Option<String>,
    pub line: Option<String>,
    pub station: Option<String>,
    pub nearest: Option<String>,
}

enum MrtShape {
    /// "5 min (410 m) from NE11 Woodleigh MRT Station"
    WalkDistLineStation,
    /// "5 min (410 m) from NE11 Woodleigh"
    WalkDistLineRest,
    /// "NE11 Woodleigh MRT Station"
    LineStation,
    /// "5 min from Woodleigh MRT"
    WalkStation,
}

static MRT_PATTERNS: LazyLock<Vec<(Regex, MrtShape)>> = LazyLock::new(|| {
    vec![
        (
            // Case-sensitive on purpose: line codes are uppercase, and the
            // negated class must not swallow lowercase m/r/t in station names.
            Regex::new(r"(\d+)\s*min\s*\(([^)]+)\)\s*from\s*([A-Z0-9]+)\s*([^MRT\n]*)\s*MRT Station")
                .unwrap(),
            MrtShape::WalkDistLineStation,
        ),
        (
            Regex::new(r"(\d+)\s*min\s*\(([^)]+)\)\s*from\s*([A-Z0-9]+)\s*([^\n]*)").unwrap(),
            MrtShape::WalkDistLineRest,
        ),
        (
            Regex::new(r"([A-Z0-9]+)\s*([^MRT\n]*)\s*MRT Station").unwrap(),
            MrtShape::LineStation,
        ),
        (
            Regex::new(r"(\d+)\s*min.*?from\s*([^MRT\n]*)\s*MRT").unwrap(),
            MrtShape::WalkStation,
        ),
    ]
});

/// Ordered from most to least specific; the first matching pattern wins.
pub fn mrt(text: &str) -> Option<MrtInfo> {
    for (re, shape) in MRT_PATTERNS.iter() {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let g = |i: usize| caps.get(i).map(|m| m.as_str().trim().to_string());
        let info = match shape {
            MrtShape::WalkDistLineStation | MrtShape::WalkDistLineRest => {
                let line = g(3);
                let station = g(4);
                let nearest = match (&line, &station) {
                    (Some(l), Some(s)) => Some(format!("{} {} MRT Station", l, s)),
                    _ => None,
                };
                MrtInfo {
                    distance: Some(format!("{} min ({})", g(1)?, g(2)?)),
                    line,
                    station,
                    nearest,
                }
            }
            MrtShape::LineStation => {
                let line = g(1)?;
                let station = g(2)?;
                MrtInfo {
                    distance: None,
                    nearest: Some(format!("{} {} MRT Station", line, station)),
                    line: Some(line),
                    station: Some(station),
                }
            }
            MrtShape::WalkStation => MrtInfo {
                distance: g(1).map(|m| format!("{} min", m)),
                line: None,
                station: g(2),
                nearest: None,
            },
        };
        return Some(info);
    }
    None
}

/// First integer in an MRT distance string ("5 min (350 m)" -> 5).
pub fn walk_minutes(distance: &str) -> Option<u32> {
    if !distance.contains("min") {
        return None;
    }
    WALK_MINUTES_RE.captures(distance)?.get(1)?.as_str().parse().ok()
}

static DISTRICT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)D(\d{2})").unwrap(),
        Regex::new(r"(?i)District\s*(\d{1,2})").unwrap(),
    ]
});

/// Explicit district marker in the listing text ("D19", "District 9").
pub fn district(text: &str) -> Option<String> {
    for re in DISTRICT_PATTERNS.iter() {
        if let Some(caps) = re.captures(text) {
            let n: u32 = caps.get(1)?.as_str().parse().ok()?;
            return Some(format!("D{:02}", n));
        }
    }
    None
}

static AGENT_NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)Listed by\s*([^\n\d]+?)(?:\s*\d|\n|$)").unwrap(),
        Regex::new(r"(?i)Agent:\s*([^\n\d]+?)(?:\s*\d|\n|$)").unwrap(),
        Regex::new(r"(?i)Contact\s*([^\n\d]+?)(?:\s*\d|\n|$)").unwrap(),
    ]
});

/// Label-prefixed agent name; a trailing "Contact"/"Agent" echo is stripped.
pub fn agent_name(text: &str) -> Option<String> {
    for re in AGENT_NAME_PATTERNS.iter() {
        if let Some(caps) = re.captures(text) {
            let raw = caps.get(1)?.as_str().trim();
            let name = AGENT_SUFFIX_RE.replace(raw, "").trim().to_string();
            if name.len() > 2 {
                return Some(name);
            }
        }
    }
    None
}

static AGENT_RATING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)(?:Listed by|Agent:).*?(\d+\.\d+)").unwrap(),
        Regex::new(r"(?i)(\d+\.\d+)(?:\s*stars?|\s*rating|\s*/\s*5)").unwrap(),
        Regex::new(r"(?i)Rating:\s*(\d+\.\d+)").unwrap(),
    ]
});

pub fn agent_rating(text: &str) -> Option<f64> {
    for re in AGENT_RATING_PATTERNS.iter() {
        if let Some(caps) = re.captures(text) {
            if let Ok(rating) = caps.get(1)?.as_str().parse::<f64>() {
                if (0.0..=5.0).contains(&rating) {
                    return Some(rating);
                }
            }
        }
    }
    None
}

static AGENT_DESC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r#""([^"]+)""#).unwrap(),
        Regex::new(r"[“”]([^“”]+)[“”]").unwrap(),
    ]
});

/// Quoted tagline near the agent block; short fragments are ignored.
pub fn agent_description(text: &str) -> Option<String> {
    for re in AGENT_DESC_PATTERNS.iter() {
        if let Some(caps) = re.captures(text) {
            let desc = caps.get(1)?.as_str().trim();
            if desc.len() > 10 {
                return Some(desc.to_string());
            }
        }
    }
    None
}

/// "Listed on 12 Jul 2025 (3 days ago)" -> (date, time-ago).
pub fn listed_date(text: &str) -> Option<(String, String)> {
    let caps = LISTED_RE.captures(text)?;
    Some((
        caps.get(1)?.as_str().trim().to_string(),
        caps.get(2)?.as_str().trim().to_string(),
    ))
}

pub fn has_virtual_tour(text: &str) -> bool {
    text.to_lowercase().contains("virtual tour")
}

pub fn is_verified_listing(text: &str) -> bool {
    text.to_lowercase().contains("verified listing")
}

pub fn is_featured_listing(text: &str) -> bool {
    text.to_lowercase().contains("featured")
}

fn first_int(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn parse_grouped_int(raw: &str) -> Option<u64> {
    let integer_part = raw.split('.').next()?;
    integer_part.replace(',', "").parse().ok()
}
