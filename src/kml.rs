use std::path::Path;
use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;

use crate::error::ConvertError;
use crate::extract::text::normalize_whitespace;

/// One `<Placemark>` as found in the source, before any normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPlacemark {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    /// Raw `<Point><coordinates>` text, "lon,lat[,alt]".
    pub point: Option<String>,
    /// Extended data in document order; first occurrence of a key wins.
    pub attributes: Vec<(String, String)>,
}

impl RawPlacemark {
    /// Keys compare whitespace-normalized, so "緯度 " answers for "緯度".
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key || normalize_whitespace(k) == key)
            .map(|(_, v)| v.as_str())
    }

    fn push_attribute(&mut self, key: String, value: String) {
        let key = normalize_whitespace(&key);
        if !key.is_empty() && self.attribute(&key).is_none() {
            self.attributes.push((key, value));
        }
    }
}

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(?:#[0-9]+|#x[0-9A-Fa-f]+|[A-Za-z][A-Za-z0-9]*);").unwrap());

/// Text-bearing element we are currently inside of.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Name,
    Description,
    Address,
    Coordinates,
    DataValue,
    SimpleData,
}

pub fn read_kml_file(path: &Path) -> Result<Vec<RawPlacemark>, ConvertError> {
    let xml = std::fs::read_to_string(path).map_err(|source| ConvertError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_kml(&xml).map_err(|source| ConvertError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Stream a KML document and collect every Placemark. Prefixes like `kml:` are ignored.
pub fn parse_kml(xml: &str) -> Result<Vec<RawPlacemark>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut placemarks = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<RawPlacemark> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();
    let mut data_name: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let local = e.local_name().as_ref().to_vec();
                if local == b"Placemark" {
                    current = Some(RawPlacemark::default());
                } else if current.is_some() {
                    let parent = stack.last().map(Vec::as_slice);
                    let opened = match (local.as_slice(), parent) {
                        (b"name", Some(b"Placemark")) => Some(Field::Name),
                        (b"description", Some(b"Placemark")) => Some(Field::Description),
                        (b"address", Some(b"Placemark")) => Some(Field::Address),
                        (b"coordinates", Some(b"Point")) => Some(Field::Coordinates),
                        (b"value", Some(b"Data")) => Some(Field::DataValue),
                        (b"SimpleData", _) => {
                            data_name = name_attr(&e)?;
                            Some(Field::SimpleData)
                        }
                        (b"Data", _) => {
                            data_name = name_attr(&e)?;
                            None
                        }
                        _ => None,
                    };
                    if opened.is_some() {
                        field = opened;
                        text.clear();
                    }
                }
                stack.push(local);
            }
            Event::Text(e) if field.is_some() => match e.unescape() {
                Ok(t) => text.push_str(&t),
                Err(_) => text.push_str(&unescape_lenient(&String::from_utf8_lossy(&e))),
            },
            Event::Empty(e) if field == Some(Field::Description) => {
                if e.local_name().as_ref().eq_ignore_ascii_case(b"br") {
                    text.push_str("<br>");
                }
            }
            Event::CData(e) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::End(e) => {
                let local = e.local_name();
                if local.as_ref() == b"Placemark" {
                    if let Some(pm) = current.take() {
                        placemarks.push(pm);
                    }
                    field = None;
                } else if let (Some(pm), Some(f)) = (current.as_mut(), field) {
                    if closes(f, local.as_ref()) {
                        store(pm, f, std::mem::take(&mut text), &mut data_name);
                        field = None;
                    }
                }
                if local.as_ref() == b"Data" {
                    data_name = None;
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(placemarks)
}

fn closes(field: Field, local: &[u8]) -> bool {
    matches!(
        (field, local),
        (Field::Name, b"name")
            | (Field::Description, b"description")
            | (Field::Address, b"address")
            | (Field::Coordinates, b"coordinates")
            | (Field::DataValue, b"value")
            | (Field::SimpleData, b"SimpleData")
    )
}

fn store(pm: &mut RawPlacemark, field: Field, text: String, data_name: &mut Option<String>) {
    match field {
        Field::Name => pm.name = Some(text),
        Field::Description => pm.description = Some(text),
        Field::Address => pm.address = Some(text),
        Field::Coordinates => {
            if pm.point.is_none() {
                pm.point = Some(text);
            }
        }
        Field::DataValue => {
            if let Some(key) = data_name.clone() {
                pm.push_attribute(key, text);
            }
        }
        Field::SimpleData => {
            if let Some(key) = data_name.take() {
                pm.push_attribute(key, text);
            }
        }
    }
}

/// Resolves each reference on its own; HTML-only ones such as `&nbsp;` stay verbatim.
fn unescape_lenient(raw: &str) -> String {
    ENTITY_RE
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            let entity = &caps[0];
            match quick_xml::escape::unescape(entity) {
                Ok(resolved) => resolved.into_owned(),
                Err(_) => entity.to_string(),
            }
        })
        .into_owned()
}

fn name_attr(e: &BytesStart<'_>) -> Result<Option<String>, quick_xml::Error> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if attr.key.as_ref() == b"name" {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}
