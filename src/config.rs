use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::ConvertError;

/// Env prefix for overrides, e.g. `KML2OSM_START_ID=-5000` or `KML2OSM_BOUNDS__MAX_LAT=27`.
const ENV_PREFIX: &str = "KML2OSM";

const DEFAULTS: &str = r#"
start_id = -1000
input_extension = "kml"
max_key_chars = 16
max_value_chars = 80
zero_capacity_suffix = "append"
category_key = "amenity"
category_value = "air_defense_shelter"

[bounds]
min_lat = 21.8
max_lat = 26.5
min_lon = 118.2
max_lon = 122.0
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub start_id: i64,
    pub input_extension: String,
    pub bounds: Bounds,
    pub max_key_chars: usize,
    pub max_value_chars: usize,
    pub zero_capacity_suffix: ZeroCapacity,
    pub category_key: String,
    pub category_value: String,
}

/// Inclusive lat/lon box a node must fall in.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// Whether a present-but-zero capacity still gets a "(0)" suffix on the display name.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ZeroCapacity {
    Append,
    Suppress,
}

impl Settings {
    /// Defaults, then the optional TOML file, then `KML2OSM_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(File::from_str(DEFAULTS, FileFormat::Toml));
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load settings")?
            .try_deserialize()
            .context("Failed to deserialize settings")?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConvertError> {
        let b = &self.bounds;
        if !(b.min_lat < b.max_lat && b.min_lon < b.max_lon) {
            return Err(ConvertError::InvalidSettings(format!(
                "empty bounding box: lat [{}, {}], lon [{}, {}]",
                b.min_lat, b.max_lat, b.min_lon, b.max_lon
            )));
        }
        if self.start_id >= 0 {
            return Err(ConvertError::InvalidSettings(format!(
                "start id must be negative, got {}",
                self.start_id
            )));
        }
        if self.input_extension.trim_start_matches('.').is_empty() {
            return Err(ConvertError::InvalidSettings("empty input extension".into()));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            start_id: -1000,
            input_extension: "kml".into(),
            bounds: Bounds {
                min_lat: 21.8,
                max_lat: 26.5,
                min_lon: 118.2,
                max_lon: 122.0,
            },
            max_key_chars: 16,
            max_value_chars: 80,
            zero_capacity_suffix: ZeroCapacity::Append,
            category_key: "amenity".into(),
            category_value: "air_defense_shelter".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults_match_default_impl() {
        let loaded = Settings::load(None).unwrap();
        let default = Settings::default();
        assert_eq!(loaded.start_id, default.start_id);
        assert_eq!(loaded.bounds, default.bounds);
        assert_eq!(loaded.max_key_chars, 16);
        assert_eq!(loaded.max_value_chars, 80);
        assert_eq!(loaded.zero_capacity_suffix, ZeroCapacity::Append);
        assert_eq!(loaded.category_value, "air_defense_shelter");
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kml2osm.toml");
        std::fs::write(&path, "start_id = -5000\nzero_capacity_suffix = \"suppress\"\n").unwrap();
        let s = Settings::load(Some(&path)).unwrap();
        assert_eq!(s.start_id, -5000);
        assert_eq!(s.zero_capacity_suffix, ZeroCapacity::Suppress);
        assert_eq!(s.bounds.max_lon, 122.0);
    }

    #[test]
    fn bounds_inclusive_edges() {
        let b = Settings::default().bounds;
        assert!(b.contains(21.8, 118.2));
        assert!(b.contains(26.5, 122.0));
        assert!(!b.contains(26.51, 121.0));
        assert!(!b.contains(f64::NAN, 121.0));
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let mut s = Settings::default();
        assert!(s.validate().is_ok());
        s.start_id = 0;
        assert!(s.validate().is_err());
        let mut s = Settings::default();
        s.bounds.min_lat = 30.0;
        assert!(s.validate().is_err());
    }
}
