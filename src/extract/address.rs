use std::sync::LazyLock;

use regex::Regex;

use super::coords::is_bare_pair;
use super::keys;
use super::text::clean;
use crate::kml::RawPlacemark;

pub type AddressStrategy = fn(&RawPlacemark) -> Option<String>;

pub const ADDRESS_STRATEGIES: &[AddressStrategy] = &[from_field, from_attribute, from_description];

/// "地址: ..." up to the next tag or line break.
static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"地址\s*[:：]\s*([^<\r\n]+)").unwrap());

pub fn resolve(raw: &RawPlacemark) -> Option<String> {
    ADDRESS_STRATEGIES.iter().find_map(|strategy| strategy(raw))
}

pub fn from_field(raw: &RawPlacemark) -> Option<String> {
    clean(raw.address.as_deref())
}

/// Skips the source that stored coordinates in the address column.
pub fn from_attribute(raw: &RawPlacemark) -> Option<String> {
    clean(raw.attribute(keys::ADDRESS)).filter(|a| !is_bare_pair(a))
}

pub fn from_description(raw: &RawPlacemark) -> Option<String> {
    let caps = ADDRESS_RE.captures(raw.description.as_deref()?)?;
    clean(caps.get(1).map(|m| m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_field_first() {
        let raw = RawPlacemark {
            address: Some(" 高雄市前金區 ".into()),
            attributes: vec![("地址".into(), "other".into())],
            description: Some("地址: third".into()),
            ..Default::default()
        };
        assert_eq!(resolve(&raw).as_deref(), Some("高雄市前金區"));
    }

    #[test]
    fn blank_field_falls_through() {
        let raw = RawPlacemark {
            address: Some("   ".into()),
            attributes: vec![("地址".into(), "台中市西屯區\n台灣大道3段99號".into())],
            ..Default::default()
        };
        assert_eq!(resolve(&raw).as_deref(), Some("台中市西屯區 台灣大道3段99號"));
    }

    #[test]
    fn mined_from_description() {
        let raw = RawPlacemark {
            description: Some("地址: 台北市信義路1號<br>樓層: 3".into()),
            ..Default::default()
        };
        assert_eq!(resolve(&raw).as_deref(), Some("台北市信義路1號"));
    }

    #[test]
    fn coordinate_pair_is_not_an_address() {
        let raw = RawPlacemark {
            attributes: vec![("地址".into(), "25.04,121.56".into())],
            ..Default::default()
        };
        assert_eq!(resolve(&raw), None);
    }

    #[test]
    fn nothing_found() {
        let raw = RawPlacemark {
            description: Some("樓層: 3".into()),
            ..Default::default()
        };
        assert_eq!(resolve(&raw), None);
    }
}
