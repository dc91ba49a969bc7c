use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Bounds, Settings, ZeroCapacity};
use crate::extract::text::{description_pairs, is_decimal};
use crate::extract::{ExtractedFields, LatLon};

/// Capacity thresholds, largest first. A capacity maps to the first one it reaches.
const CAPACITY_BUCKETS: &[i64] = &[5000, 4000, 3000, 2000, 1000, 500, 0];

/// Digits followed by the house-number unit.
static HOUSE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+號").unwrap());

pub const NAME_KEY: &str = "name";
pub const CAPACITY_KEY: &str = "capacity";
pub const HOUSE_NUMBER_KEY: &str = "addr:housenumber";
pub const FLOORS_KEY: &str = "building:levels:underground";
pub const FULL_ADDRESS_KEY: &str = "addr:full";

#[derive(Debug, Clone, PartialEq)]
pub struct OutputNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    /// Unique keys, in emission order.
    pub tags: Vec<(String, String)>,
}

impl OutputNode {
    #[cfg(test)]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("coordinates ({lat}, {lon}) outside the region for {label}, swapped or not")]
pub struct Rejected {
    pub label: String,
    pub lat: f64,
    pub lon: f64,
}

/// Validate `raw` and derive the node's tags. Records without coordinates never get here.
/// `id` is only consumed on success.
pub fn build_and_validate(
    fields: &ExtractedFields,
    raw: LatLon,
    id: i64,
    settings: &Settings,
) -> Result<OutputNode, Rejected> {
    let label = || {
        fields
            .name
            .clone()
            .or_else(|| fields.address.clone())
            .unwrap_or_else(|| fields.best_label())
    };
    let coords = validate_coords(raw, &settings.bounds).ok_or_else(|| Rejected {
        label: label(),
        lat: raw.lat,
        lon: raw.lon,
    })?;
    if coords != raw {
        info!(
            label = %label(),
            lat = coords.lat,
            lon = coords.lon,
            "swapped transposed coordinates"
        );
    }

    let capacity = fields.capacity();
    let mut tags = TagList::default();
    tags.push(&settings.category_key, &settings.category_value);
    tags.push(
        NAME_KEY,
        &display_name(fields, capacity, settings.zero_capacity_suffix),
    );
    tags.push(CAPACITY_KEY, &capacity_bucket(capacity).to_string());
    tags.push(
        HOUSE_NUMBER_KEY,
        fields.address.as_deref().and_then(house_number).unwrap_or(""),
    );

    if let Some(description) = &fields.description {
        for (key, value) in description_pairs(description) {
            if key.chars().count() > settings.max_key_chars {
                warn!(key = %key, "description key too long, skipped");
                continue;
            }
            if value.chars().count() > settings.max_value_chars {
                warn!(key = %key, value = %value, "description value too long, skipped");
                continue;
            }
            if !tags.push(&key, &value) {
                debug!(key = %key, "duplicate description key, keeping the first");
            }
        }
    }

    if let Some(floors) = fields.attributes.floors.as_deref().filter(|f| is_decimal(f)) {
        tags.push(FLOORS_KEY, floors);
    }
    if let Some(address) = &fields.address {
        tags.push(FULL_ADDRESS_KEY, address);
    }

    Ok(OutputNode {
        id,
        lat: coords.lat,
        lon: coords.lon,
        tags: tags.0,
    })
}

/// As-is if inside `bounds`, else swapped if that fits, else nothing.
pub fn validate_coords(coords: LatLon, bounds: &Bounds) -> Option<LatLon> {
    [coords, coords.swapped()]
        .into_iter()
        .find(|c| bounds.contains(c.lat, c.lon))
}

/// Greatest bucket not above `capacity`; absent and negative capacities land in 0.
pub fn capacity_bucket(capacity: Option<i64>) -> i64 {
    let capacity = capacity.unwrap_or(0);
    CAPACITY_BUCKETS
        .iter()
        .copied()
        .find(|b| *b <= capacity)
        .unwrap_or(0)
}

/// First "<digits>號" run in the address.
pub fn house_number(address: &str) -> Option<&str> {
    HOUSE_NUMBER_RE.find(address).map(|m| m.as_str())
}

/// Name, or the internal id when the name slot holds a number, plus "(capacity)".
pub fn display_name(fields: &ExtractedFields, capacity: Option<i64>, zero: ZeroCapacity) -> String {
    let base = match fields.name.as_deref() {
        Some(name) if !is_decimal(name) => name.to_string(),
        _ => fields.attributes.internal_id.clone().unwrap_or_default(),
    };
    match capacity {
        Some(0) if zero == ZeroCapacity::Suppress => base,
        Some(c) => format!("{base}({c})"),
        None => base,
    }
}

#[derive(Default)]
struct TagList(Vec<(String, String)>);

impl TagList {
    /// False when the key is already taken.
    fn push(&mut self, key: &str, value: &str) -> bool {
        if self.0.iter().any(|(k, _)| k == key) {
            return false;
        }
        self.0.push((key.to_string(), value.to_string()));
        true
    }
}
