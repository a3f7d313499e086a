use serde::{Deserialize, Serialize};

/// Marker written into every canonical record.
pub const DATA_SOURCE: &str = "PropertyGuru";

/// Maximum length of the diagnostic raw-text excerpt kept on a draft.
pub const RAW_TEXT_CAP: usize = 500;

/// Per-listing accumulator filled by the field parsers. Every field except
/// the name is optional: a parser that finds nothing leaves its field absent.
/// Drafts missing a name or a price never reach normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftRecord {
    #[serde(rename = "property_name", default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_sqft: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_sqft_formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_area_sqft: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_area_formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub land_area_sqft: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub land_area_formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrt_station: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrt_distance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrt_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_url: Option<String>,
    #[serde(default)]
    pub image_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listed_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listed_time_ago: Option<String>,
    #[serde(default)]
    pub has_virtual_tour: bool,
    #[serde(default)]
    pub verified_listing: bool,
    #[serde(default)]
    pub featured_listing: bool,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub extraction_method: String,
    #[serde(default)]
    pub position_on_page: usize,
}

impl DraftRecord {
    /// Identity triple used for in-batch deduplication: two drafts with the
    /// same name, price and bedroom count are the same listing.
    pub fn dedup_key(&self) -> (String, Option<u64>, Option<u32>) {
        (self.name.clone(), self.price, self.bedrooms)
    }

    /// Minimum completeness for a draft to be worth keeping at all.
    pub fn is_acceptable(&self) -> bool {
        !self.name.trim().is_empty() && self.price.is_some_and(|p| p > 0)
    }
}

/// Validated, bucketed output record. Flat string/number map when serialized;
/// derived fields are present only when their source field was present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub property_name: String,
    pub price_numeric: u64,
    pub price_formatted: String,
    pub bedrooms: u32,
    pub bathrooms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_area_sqft: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_url: Option<String>,
    pub price_range: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_sqft_numeric: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_sqft_formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psf_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrt_station: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrt_distance_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrt_walk_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrt_distance_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrt_line_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrt_line_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_age_years: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listed_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_image_url: Option<String>,
    pub extraction_timestamp: String,
    pub data_source: String,
}
