//! Sentinel-5P TROPOMI level 2 total ozone (`L2__O3____`).
//!
//! Geolocation arrays are `(time, scanline, ground_pixel)`, so every row is a
//! `(time, scanline, pixel)` triple. Observation time is the product reference
//! time plus the per-scanline `delta_time` in milliseconds.
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use tracing::info;

use super::{Extractor, assemble};
use crate::core::decode::{VariableSpec, decode_table};
use crate::core::matcher::{PixelIndex, QualityFilter, match_pixels};
use crate::error::{Error, Result};
use crate::io::science::{ScienceFile, Variable};
use crate::types::{BoundingBox, Column, ExtractionResult, Product, Value};

const QA_FILL: f64 = 255.0;

pub const OZONE_TABLE: &[VariableSpec] = &[
    VariableSpec::new("longitude"),
    VariableSpec::new("latitude"),
    VariableSpec::new("qa_value").masked(QA_FILL),
    VariableSpec::new("ozone_total_vertical_column"),
    VariableSpec::new("ozone_total_vertical_column_precision"),
];

const TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
];

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Reference time of `delta_time`: its `units` (`milliseconds since ...`),
/// else the global `time_reference` attribute.
pub fn reference_time(file: &dyn ScienceFile, delta: &Variable) -> Result<NaiveDateTime> {
    if let Some(units) = delta.attribute("units") {
        if let Some((_, since)) = units.split_once("since") {
            if let Some(t) = parse_timestamp(since) {
                return Ok(t);
            }
        }
    }
    file.global_attribute("time_reference")
        .and_then(|s| parse_timestamp(&s))
        .ok_or_else(|| Error::Parse(format!("{}: no usable reference time", file.describe())))
}

// delta_time is either shaped like the geolocation arrays or, as GDAL exposes a
// `(time, scanline)` variable, a single layer of `(time, scanline)`.
fn delta_at(delta: &Variable, geo_shape: &[usize], p: &PixelIndex) -> Result<Option<f64>> {
    if delta.shape() == geo_shape {
        return Ok(delta.get(p.time, p.row, p.col));
    }
    if delta.layers() == 1 && delta.rows() == geo_shape[0] && delta.cols() == geo_shape[1] {
        return Ok(delta.get(0, p.time, p.row));
    }
    Err(Error::DimensionMismatch {
        expected: geo_shape.to_vec(),
        found: delta.shape(),
    })
}

#[derive(Debug, Clone, Default)]
pub struct OzoneExtractor {
    /// Optional threshold on the raw `qa_value` (0..100)
    min_quality: Option<f64>,
}

impl OzoneExtractor {
    pub fn new(min_quality: Option<f64>) -> Self {
        Self { min_quality }
    }

    fn time_column(
        &self,
        file: &dyn ScienceFile,
        geo_shape: &[usize],
        pixels: &[PixelIndex],
    ) -> Result<Column> {
        let delta = file.variable("delta_time")?;
        let reference = reference_time(file, &delta)?;
        let fill = delta.attribute_f64("_FillValue");

        let values = pixels
            .iter()
            .map(|p| -> Result<Value> {
                let ms = delta_at(&delta, geo_shape, p)?;
                Ok(match ms {
                    Some(ms) if ms.is_finite() && Some(ms) != fill => {
                        TimeDelta::try_milliseconds(ms as i64)
                            .and_then(|d| reference.checked_add_signed(d))
                            .map_or(Value::Missing, Value::Time)
                    }
                    _ => Value::Missing,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Column {
            label: "Time".to_string(),
            values,
        })
    }
}

impl Extractor for OzoneExtractor {
    fn product(&self) -> Product {
        Product::S5pO3
    }

    fn min_quality(&self) -> Option<f64> {
        self.min_quality
    }

    fn extract(&self, file: &dyn ScienceFile, bbox: &BoundingBox) -> Result<ExtractionResult> {
        let lat = file.variable("latitude")?;
        let lon = file.variable("longitude")?;
        // fill never passes the threshold
        let qa = match self.min_quality {
            Some(_) => Some(
                file.variable("qa_value")?
                    .data
                    .mapv(|v| if v == QA_FILL { f64::NAN } else { v }),
            ),
            None => None,
        };

        let filter = qa.as_ref().zip(self.min_quality).map(|(qa, min_quality)| QualityFilter {
            values: qa.view(),
            min_quality,
        });
        let pixels = match_pixels(lat.data.view(), lon.data.view(), bbox, filter)?;
        info!("{}: {} pixels inside {}", file.describe(), pixels.len(), bbox);

        let mut columns = vec![self.time_column(file, &lat.shape(), &pixels)?];
        columns.extend(decode_table(file, OZONE_TABLE, &pixels)?);
        assemble(pixels.len(), columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory::InMemoryFile;
    use ndarray::{Array3, array};

    fn var(name: &str, long_name: &str, units: &str, data: Array3<f64>) -> Variable {
        Variable::new(name, data)
            .with_attribute("long_name", long_name)
            .with_attribute("units", units)
    }

    // two time steps, two scanlines, two ground pixels
    fn ozone_file(delta: Variable) -> InMemoryFile {
        let lat = Array3::from_shape_fn((2, 2, 2), |(t, s, _)| 38.0 + 0.5 * s as f64 + 0.2 * t as f64);
        let lon = Array3::from_shape_fn((2, 2, 2), |(_, _, p)| -9.0 + 2.0 * p as f64);
        let qa = Array3::from_shape_fn((2, 2, 2), |(t, s, p)| if t + s + p == 0 { 255.0 } else { 100.0 - (t + s + p) as f64 * 10.0 });
        let ozone = Array3::from_shape_fn((2, 2, 2), |(t, s, p)| 0.1 + 0.01 * (4 * t + 2 * s + p) as f64);
        InMemoryFile::new("S5P_OFFL_L2__O3_____20210115.nc")
            .with_variable(var("latitude", "pixel center latitude", "degrees_north", lat))
            .with_variable(var("longitude", "pixel center longitude", "degrees_east", lon))
            .with_variable(var("qa_value", "data quality value", "1", qa).with_attribute("scale_factor", "0.01"))
            .with_variable(var("ozone_total_vertical_column", "total ozone column", "mol m-2", ozone.clone()))
            .with_variable(var(
                "ozone_total_vertical_column_precision",
                "total ozone column precision",
                "mol m-2",
                ozone.mapv(|v| v / 100.0),
            ))
            .with_variable(delta)
            .with_global("time_reference", "2021-01-15T00:00:00Z")
    }

    fn bbox() -> BoundingBox {
        BoundingBox::new(37.0, 39.0, -10.0, -8.0).unwrap()
    }

    #[test]
    fn rows_follow_time_scanline_pixel() {
        // GDAL layout of a (time, scanline) variable: one layer
        let delta = Variable::new("delta_time", array![[[1000.0, 2000.0], [61000.0, 62000.0]]])
            .with_attribute("units", "milliseconds since 2021-01-15 00:00:00");

        let result = OzoneExtractor::new(None).extract(&ozone_file(delta), &bbox()).unwrap();

        // only ground pixel 0 falls inside the box: longitudes -9 and -7
        assert_eq!(result.row_count(), 4);
        assert_eq!(
            result.labels().collect::<Vec<_>>(),
            vec![
                "Time",
                "pixel center longitude (degrees_east)",
                "pixel center latitude (degrees_north)",
                "data quality value (1)",
                "total ozone column (mol m-2)",
                "total ozone column precision (mol m-2)",
            ]
        );
        let times: Vec<String> = result.column("Time").unwrap().iter().map(|v| v.to_string()).collect();
        assert_eq!(
            times,
            vec![
                "2021-01-15T00:00:01",
                "2021-01-15T00:00:02",
                "2021-01-15T00:01:01",
                "2021-01-15T00:01:02",
            ]
        );
        let qa = result.column("data quality value (1)").unwrap();
        assert_eq!(qa[0], Value::Missing);
        let Value::Number(v) = qa[1] else {
            panic!("expected number");
        };
        assert!((v - 0.9).abs() < 1e-12);
    }

    #[test]
    fn delta_shaped_like_geolocation_and_global_reference() {
        let delta = Variable::new("delta_time", Array3::from_elem((2, 2, 2), 500.0));

        let result = OzoneExtractor::new(None).extract(&ozone_file(delta), &bbox()).unwrap();

        assert!(
            result
                .column("Time")
                .unwrap()
                .iter()
                .all(|v| v.to_string() == "2021-01-15T00:00:00.500")
        );
    }

    #[test]
    fn raw_qa_threshold() {
        let delta = Variable::new("delta_time", Array3::zeros((2, 2, 2)));

        let result = OzoneExtractor::new(Some(85.0))
            .extract(&ozone_file(delta), &bbox())
            .unwrap();

        // pixel 0: qa (t,s) = 255 (fill), 90, 90, 80
        assert_eq!(result.row_count(), 2);
        assert!(
            result
                .column("data quality value (1)")
                .unwrap()
                .iter()
                .all(|v| *v != Value::Missing)
        );
    }

    #[test]
    fn mismatched_delta_is_rejected() {
        let delta = Variable::new("delta_time", Array3::zeros((1, 5, 5)));
        let err = OzoneExtractor::new(None)
            .extract(&ozone_file(delta), &bbox())
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn reference_time_formats() {
        let file = InMemoryFile::new("f");
        let delta = Variable::new("delta_time", Array3::zeros((1, 1, 1)))
            .with_attribute("units", "milliseconds since 2019-06-30");
        assert_eq!(
            reference_time(&file, &delta).unwrap().to_string(),
            "2019-06-30 00:00:00"
        );
        let bare = Variable::new("delta_time", Array3::zeros((1, 1, 1)));
        assert!(matches!(reference_time(&file, &bare), Err(Error::Parse(_))));
    }
}
