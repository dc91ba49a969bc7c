use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::text::{is_decimal, parse_decimal};
use super::{keys, LatLon};
use crate::kml::RawPlacemark;

/// A single way of recovering coordinates from a placemark.
pub type CoordinateStrategy = fn(&RawPlacemark) -> Option<LatLon>;

/// Tried in order; first hit wins.
pub const COORDINATE_STRATEGIES: &[(&str, CoordinateStrategy)] = &[
    ("point", from_point),
    ("attributes", from_attributes),
    ("address_attribute", from_address_attribute),
    ("description", from_description),
    ("numeric_name", from_numeric_name),
];

/// Labeled lat/lon attribute pairs. Only the first is trusted without a numeric check.
const PRIMARY_PAIR: (&str, &str) = ("緯度", "經度");
const FALLBACK_PAIRS: &[(&str, &str)] = &[("Y坐標", "X坐標"), ("欄位1", "欄位2")];

const NUM: &str = r"([+-]?\d+(?:\.\d+)?)";

static LABELED_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?:經緯度|座標|坐標)\s*[:：]\s*{NUM}\s*[,，]\s*{NUM}")).unwrap()
});
static LAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"緯度\s*[:：]\s*{NUM}")).unwrap());
static LON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"經度\s*[:：]\s*{NUM}")).unwrap());
static REMARKS_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"備註\s*[:：]\s*{NUM}\s*[,，]\s*{NUM}")).unwrap()
});
static BARE_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^\s*{NUM}\s*[,，]\s*{NUM}\s*$")).unwrap());

/// Run the cascade, logging which step produced the pair.
pub fn resolve(raw: &RawPlacemark) -> Option<LatLon> {
    COORDINATE_STRATEGIES.iter().find_map(|(label, strategy)| {
        let found = strategy(raw)?;
        debug!(strategy = *label, lat = found.lat, lon = found.lon, "coordinates resolved");
        Some(found)
    })
}

/// `<Point>` text is "lon,lat[,alt]"; the order flips here.
pub fn from_point(raw: &RawPlacemark) -> Option<LatLon> {
    let text = raw.point.as_deref()?;
    let mut parts = text.trim().split(',').map(str::trim);
    let lon: f64 = parts.next()?.parse().ok()?;
    let lat: f64 = parts.next()?.parse().ok()?;
    if !(lat.is_finite() && lon.is_finite()) {
        return None;
    }
    Some(LatLon { lat, lon })
}

pub fn from_attributes(raw: &RawPlacemark) -> Option<LatLon> {
    let (lat_key, lon_key) = PRIMARY_PAIR;
    let primary = raw
        .attribute(lat_key)
        .zip(raw.attribute(lon_key))
        .and_then(|(lat, lon)| {
            Some(LatLon {
                lat: lat.trim().parse().ok()?,
                lon: lon.trim().parse().ok()?,
            })
        })
        .filter(|c| c.lat.is_finite() && c.lon.is_finite());
    if primary.is_some() {
        return primary;
    }

    FALLBACK_PAIRS.iter().find_map(|(lat_key, lon_key)| {
        let lat = raw.attribute(lat_key)?;
        let lon = raw.attribute(lon_key)?;
        if !(is_decimal(lat) && is_decimal(lon)) {
            return None;
        }
        Some(LatLon {
            lat: parse_decimal(lat)?,
            lon: parse_decimal(lon)?,
        })
    })
}

/// One source put "lat,lon" into the address column.
pub fn from_address_attribute(raw: &RawPlacemark) -> Option<LatLon> {
    let value = raw.attribute(keys::ADDRESS)?;
    pair_from(&BARE_PAIR_RE, value)
}

pub fn from_description(raw: &RawPlacemark) -> Option<LatLon> {
    let text = raw.description.as_deref()?;
    pair_from(&LABELED_PAIR_RE, text)
        .or_else(|| {
            Some(LatLon {
                lat: number_from(&LAT_RE, text)?,
                lon: number_from(&LON_RE, text)?,
            })
        })
        .or_else(|| pair_from(&REMARKS_PAIR_RE, text))
}

/// Name slot holding a bare latitude; longitude has to come from the description.
pub fn from_numeric_name(raw: &RawPlacemark) -> Option<LatLon> {
    let lat = parse_decimal(raw.name.as_deref()?)?;
    let lon = number_from(&LON_RE, raw.description.as_deref()?)?;
    Some(LatLon { lat, lon })
}

/// Whole value is "number,number" and nothing else.
pub fn is_bare_pair(s: &str) -> bool {
    BARE_PAIR_RE.is_match(s)
}

fn pair_from(re: &Regex, text: &str) -> Option<LatLon> {
    let caps = re.captures(text)?;
    Some(LatLon {
        lat: caps[1].parse().ok()?,
        lon: caps[2].parse().ok()?,
    })
}

fn number_from(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)?[1].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pm() -> RawPlacemark {
        RawPlacemark::default()
    }

    fn with_attrs(attrs: &[(&str, &str)]) -> RawPlacemark {
        RawPlacemark {
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..pm()
        }
    }

    #[test]
    fn point_swaps_order() {
        let raw = RawPlacemark {
            point: Some("121.5,25.0,0".into()),
            ..pm()
        };
        assert_eq!(from_point(&raw), Some(LatLon { lat: 25.0, lon: 121.5 }));
    }

    #[test]
    fn point_with_whitespace_and_no_altitude() {
        let raw = RawPlacemark {
            point: Some("\n  120.25 , 22.6 \n".into()),
            ..pm()
        };
        assert_eq!(from_point(&raw), Some(LatLon { lat: 22.6, lon: 120.25 }));
    }

    #[test]
    fn point_garbage() {
        for bad in ["", "121.5", "a,b", "NaN,25"] {
            let raw = RawPlacemark {
                point: Some(bad.into()),
                ..pm()
            };
            assert_eq!(from_point(&raw), None, "{bad}");
        }
    }

    #[test]
    fn primary_attribute_pair() {
        let raw = with_attrs(&[("經度", "121.1"), ("緯度", "24.9")]);
        assert_eq!(from_attributes(&raw), Some(LatLon { lat: 24.9, lon: 121.1 }));
    }

    #[test]
    fn fallback_pairs_need_numbers() {
        let raw = with_attrs(&[("Y坐標", "無"), ("X坐標", "121"), ("欄位1", "23.5"), ("欄位2", "120.7")]);
        assert_eq!(from_attributes(&raw), Some(LatLon { lat: 23.5, lon: 120.7 }));

        let raw = with_attrs(&[("欄位1", "詳見備註"), ("欄位2", "120.7")]);
        assert_eq!(from_attributes(&raw), None);
    }

    #[test]
    fn half_pair_is_nothing() {
        let raw = with_attrs(&[("緯度", "24.9")]);
        assert_eq!(from_attributes(&raw), None);
    }

    #[test]
    fn address_column_holding_coordinates() {
        let raw = with_attrs(&[("地址", "25.04, 121.56")]);
        assert_eq!(from_address_attribute(&raw), Some(LatLon { lat: 25.04, lon: 121.56 }));
        let raw = with_attrs(&[("地址", "台北市信義路1號")]);
        assert_eq!(from_address_attribute(&raw), None);
    }

    #[test]
    fn description_patterns_in_order() {
        let raw = RawPlacemark {
            description: Some("座標：25.1，121.2<br>緯度: 1<br>經度: 2".into()),
            ..pm()
        };
        assert_eq!(from_description(&raw), Some(LatLon { lat: 25.1, lon: 121.2 }));

        let raw = RawPlacemark {
            description: Some("經度: 120.3<br>緯度: 22.7".into()),
            ..pm()
        };
        assert_eq!(from_description(&raw), Some(LatLon { lat: 22.7, lon: 120.3 }));

        let raw = RawPlacemark {
            description: Some("備註: 24.1,120.6".into()),
            ..pm()
        };
        assert_eq!(from_description(&raw), Some(LatLon { lat: 24.1, lon: 120.6 }));

        let raw = RawPlacemark {
            description: Some("緯度: 22.7 only".into()),
            ..pm()
        };
        assert_eq!(from_description(&raw), None);
    }

    #[test]
    fn numeric_name_last_resort() {
        let raw = RawPlacemark {
            name: Some(" 23.01 ".into()),
            description: Some("經度：120.22".into()),
            ..pm()
        };
        assert_eq!(from_numeric_name(&raw), Some(LatLon { lat: 23.01, lon: 120.22 }));

        let raw = RawPlacemark {
            name: Some("中山里".into()),
            description: Some("經度：120.22".into()),
            ..pm()
        };
        assert_eq!(from_numeric_name(&raw), None);
    }

    #[test]
    fn cascade_prefers_point() {
        let raw = RawPlacemark {
            point: Some("121.5,25.0".into()),
            description: Some("座標: 1, 2".into()),
            attributes: vec![("緯度".into(), "3".into()), ("經度".into(), "4".into())],
            ..pm()
        };
        assert_eq!(resolve(&raw), Some(LatLon { lat: 25.0, lon: 121.5 }));
    }

    #[test]
    fn cascade_falls_through() {
        let raw = RawPlacemark {
            point: Some("".into()),
            description: Some("備註: 24.1,120.6".into()),
            ..pm()
        };
        assert_eq!(resolve(&raw), Some(LatLon { lat: 24.1, lon: 120.6 }));
        assert_eq!(resolve(&pm()), None);
    }
}
