pub mod address;
pub mod coords;
pub mod text;

use crate::kml::RawPlacemark;
use text::{clean, normalize_whitespace, parse_capacity};

/// Extended-data labels used by the shelter datasets.
pub mod keys {
    pub const ADDRESS: &str = "地址";
    pub const INTERNAL_ID: &str = "編號";
    pub const FLOORS: &str = "地下樓層數";
    pub const CAPACITY: &str = "可容納人數";
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn swapped(self) -> Self {
        LatLon {
            lat: self.lon,
            lon: self.lat,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    pub internal_id: Option<String>,
    pub floors: Option<String>,
    /// Raw capacity text, e.g. "1,200人".
    pub capacity: Option<String>,
    /// Every extended-data pair, whitespace-normalized, in source order.
    pub all: Vec<(String, String)>,
}

/// Flat view of a placemark. Coordinates are unvalidated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub coords: Option<LatLon>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub attributes: Attributes,
}

impl ExtractedFields {
    /// Capacity as an integer. Malformed text is logged and treated as absent.
    pub fn capacity(&self) -> Option<i64> {
        self.attributes.capacity.as_deref().and_then(parse_capacity)
    }

    /// How the record is identified in warnings: address, internal id, attribute dump, name.
    pub fn best_label(&self) -> String {
        if let Some(address) = &self.address {
            return address.clone();
        }
        if let Some(id) = &self.attributes.internal_id {
            return id.clone();
        }
        if !self.attributes.all.is_empty() {
            let dump: serde_json::Map<String, serde_json::Value> = self
                .attributes
                .all
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            return serde_json::Value::Object(dump).to_string();
        }
        self.name.clone().unwrap_or_else(|| "<unnamed>".to_string())
    }
}

/// Always produces fields; `coords == None` tells the caller to drop the record.
pub fn extract(raw: &RawPlacemark) -> ExtractedFields {
    let all: Vec<(String, String)> = raw
        .attributes
        .iter()
        .map(|(k, v)| (normalize_whitespace(k), normalize_whitespace(v)))
        .filter(|(k, _)| !k.is_empty())
        .collect();
    let get = |key: &str| -> Option<String> {
        all.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
    };

    let internal_id = get(keys::INTERNAL_ID);
    let floors = get(keys::FLOORS);
    let capacity = get(keys::CAPACITY);

    ExtractedFields {
        coords: coords::resolve(raw),
        name: clean(raw.name.as_deref()),
        address: address::resolve(raw),
        description: raw.description.clone().filter(|d| !d.trim().is_empty()),
        attributes: Attributes {
            internal_id,
            floors,
            capacity,
            all,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(attrs: &[(&str, &str)]) -> RawPlacemark {
        RawPlacemark {
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn geometry_only_record() {
        let r = RawPlacemark {
            point: Some("121.5,25.0,0".into()),
            ..Default::default()
        };
        let f = extract(&r);
        assert_eq!(f.coords, Some(LatLon { lat: 25.0, lon: 121.5 }));
        assert_eq!(f.name, None);
        assert_eq!(f.address, None);
        assert_eq!(f.capacity(), None);
    }

    #[test]
    fn attributes_normalized() {
        let r = raw(&[
            ("編號", " A-01 "),
            ("地下樓層數", "2"),
            ("可容納人數", "1,200\n人"),
            ("備註", ""),
        ]);
        let f = extract(&r);
        assert_eq!(f.attributes.internal_id.as_deref(), Some("A-01"));
        assert_eq!(f.attributes.floors.as_deref(), Some("2"));
        assert_eq!(f.attributes.capacity.as_deref(), Some("1,200 人"));
        assert_eq!(f.capacity(), Some(1200));
        assert_eq!(f.attributes.all.len(), 4);
    }

    #[test]
    fn description_supplies_address() {
        let r = RawPlacemark {
            description: Some("地址: 台北市信義路1號<br>樓層: 3".into()),
            ..Default::default()
        };
        let f = extract(&r);
        assert_eq!(f.address.as_deref(), Some("台北市信義路1號"));
        assert!(f.description.is_some());
        assert_eq!(f.coords, None);
    }

    #[test]
    fn label_preference() {
        let mut f = extract(&raw(&[("編號", "B-7"), ("地址", "台南市")]));
        assert_eq!(f.best_label(), "台南市");
        f.address = None;
        assert_eq!(f.best_label(), "B-7");
        f.attributes.internal_id = None;
        assert!(f.best_label().contains("台南市"));
        f.attributes.all.clear();
        f.name = Some("里民活動中心".into());
        assert_eq!(f.best_label(), "里民活動中心");
        f.name = None;
        assert_eq!(f.best_label(), "<unnamed>");
    }
}
