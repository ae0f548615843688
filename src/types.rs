//! Shared types used across satex.
//! Includes the supported `Product` families, the geographic `BoundingBox`,
//! output cell `Value`s and the per-file `ExtractionResult`.
use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Product families with a hardcoded extraction table.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
pub enum Product {
    /// MODIS Terra aerosol swath, 10 km (Deep Blue retrieval)
    #[value(name = "mod04-l2")]
    #[serde(rename = "MOD04_L2")]
    Mod04L2,
    /// MODIS Terra aerosol swath, 3 km (Dark Target retrieval)
    #[value(name = "mod04-3k")]
    #[serde(rename = "MOD04_3K")]
    Mod04_3K,
    /// MODIS MAIAC aerosol optical depth, 1 km sinusoidal tiles
    #[value(name = "mcd19a2")]
    #[serde(rename = "MCD19A2")]
    Mcd19A2,
    /// MODIS Aqua monthly atmosphere global product, 1 degree grid
    #[value(name = "myd08-m3")]
    #[serde(rename = "MYD08_M3")]
    Myd08M3,
    /// Sentinel-5P TROPOMI level 2 total ozone
    #[value(name = "s5p-o3")]
    #[serde(rename = "L2__O3____")]
    S5pO3,
}

impl Product {
    pub const ALL: [Product; 5] = [
        Product::Mod04L2,
        Product::Mod04_3K,
        Product::Mcd19A2,
        Product::Myd08M3,
        Product::S5pO3,
    ];

    /// Archive identifier of the product
    pub fn short_name(&self) -> &'static str {
        match self {
            Product::Mod04L2 => "MOD04_L2",
            Product::Mod04_3K => "MOD04_3K",
            Product::Mcd19A2 => "MCD19A2",
            Product::Myd08M3 => "MYD08_M3",
            Product::S5pO3 => "L2__O3____",
        }
    }

    /// File extension the extractor consumes
    pub fn extension(&self) -> &'static str {
        match self {
            Product::S5pO3 => "nc",
            _ => "hdf",
        }
    }

    /// Extension of downloaded archives that must be renamed before scanning
    pub fn archive_extension(&self) -> Option<&'static str> {
        match self {
            Product::S5pO3 => Some("zip"),
            _ => None,
        }
    }

    pub fn from_short_name(name: &str) -> Option<Product> {
        Product::ALL
            .into_iter()
            .find(|p| p.short_name().eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Geographic box in decimal degrees. Always normalized so that min <= max.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BoxFields")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

// Unchecked serde shape of a box
#[derive(Deserialize)]
struct BoxFields {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl TryFrom<BoxFields> for BoundingBox {
    type Error = Error;

    fn try_from(f: BoxFields) -> Result<Self> {
        BoundingBox::new(f.min_lat, f.max_lat, f.min_lon, f.max_lon)
    }
}

impl BoundingBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&min_lat) || !(-90.0..=90.0).contains(&max_lat) {
            return Err(Error::InvalidArgument {
                arg: "latitude",
                value: format!("{min_lat}..{max_lat}"),
            });
        }
        if !(-180.0..=180.0).contains(&min_lon) || !(-180.0..=180.0).contains(&max_lon) {
            return Err(Error::InvalidArgument {
                arg: "longitude",
                value: format!("{min_lon}..{max_lon}"),
            });
        }
        if min_lat > max_lat || min_lon > max_lon {
            return Err(Error::InvalidArgument {
                arg: "bbox",
                value: format!("min values must be <= max values ({min_lat}, {max_lat}, {min_lon}, {max_lon})"),
            });
        }
        Ok(BoundingBox {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    /// Build a box from two (lat, lon) corners given in any order.
    pub fn from_corners(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> Result<Self> {
        Self::new(
            lat_a.min(lat_b),
            lat_a.max(lat_b),
            lon_a.min(lon_b),
            lon_a.max(lon_b),
        )
    }

    /// Envelope of the first polygon ring of a GeoJSON FeatureCollection, Feature or Polygon.
    /// Positions are `[longitude, latitude]`.
    pub fn from_geojson(area: &serde_json::Value) -> Result<Self> {
        let geometry = if let Some(features) = area.get("features") {
            features.get(0).and_then(|f| f.get("geometry"))
        } else if let Some(geometry) = area.get("geometry") {
            Some(geometry)
        } else {
            Some(area)
        };
        let ring = geometry
            .and_then(|g| g.get("coordinates"))
            .and_then(|c| c.get(0))
            .and_then(|r| r.as_array())
            .ok_or_else(|| Error::Config("GeoJSON area has no polygon ring".to_string()))?;

        let mut lats = Vec::with_capacity(ring.len());
        let mut lons = Vec::with_capacity(ring.len());
        for position in ring {
            let lon = position.get(0).and_then(|v| v.as_f64());
            let lat = position.get(1).and_then(|v| v.as_f64());
            match (lon, lat) {
                (Some(lon), Some(lat)) => {
                    lons.push(lon);
                    lats.push(lat);
                }
                _ => {
                    return Err(Error::Config(format!(
                        "Invalid GeoJSON position: {position}"
                    )));
                }
            }
        }
        if lats.is_empty() {
            return Err(Error::Config("GeoJSON polygon ring is empty".to_string()));
        }

        let fold_min = |v: &[f64]| v.iter().copied().fold(f64::INFINITY, f64::min);
        let fold_max = |v: &[f64]| v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self::new(fold_min(&lats), fold_max(&lats), fold_min(&lons), fold_max(&lons))
    }

    /// Strict containment; points on the boundary are outside.
    #[inline]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.min_lat < lat && lat < self.max_lat && self.min_lon < lon && lon < self.max_lon
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "N: {}, S: {}, W: {}, E: {}",
            self.max_lat, self.min_lat, self.min_lon, self.max_lon
        )
    }
}

/// A single output cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    /// Single precision source value, printed at its own precision
    Float32(f32),
    Text(String),
    Time(NaiveDateTime),
    Missing,
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Time(t) => write!(f, "{}", t.format("%Y-%m-%dT%H:%M:%S%.f")),
            Value::Missing => Ok(()),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(t: NaiveDateTime) -> Self {
        Value::Time(t)
    }
}

/// One labeled output column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub label: String,
    pub values: Vec<Value>,
}

/// Rows extracted from one input file, stored column-major in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    row_count: usize,
    columns: Vec<Column>,
}

impl ExtractionResult {
    pub fn new(row_count: usize) -> Self {
        Self {
            row_count,
            columns: Vec::new(),
        }
    }

    /// Append a column; its length must equal the row count.
    pub fn push_column(&mut self, label: impl Into<String>, values: Vec<Value>) -> Result<()> {
        if values.len() != self.row_count {
            return Err(Error::DimensionMismatch {
                expected: vec![self.row_count],
                found: vec![values.len()],
            });
        }
        self.columns.push(Column {
            label: label.into(),
            values,
        });
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.label.as_str())
    }

    pub fn column(&self, label: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.values.as_slice())
    }
}
