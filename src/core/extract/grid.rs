//! Gridded MODIS products (MCD19A2 sinusoidal tiles, MYD08_M3 global grid).
//!
//! Pixel coordinates are not stored in these files; they are rebuilt from the
//! grid description and projected to latitude/longitude before matching.
use ndarray::Axis;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use super::{Extractor, assemble};
use crate::core::decode::{THREE_ORBITS, UnitSource, VariableSpec, decode_table};
use crate::core::matcher::match_pixels;
use crate::core::reproject::{CornerUnits, GridGeometry, GridProjection, derive_latlon};
use crate::error::{Error, Result};
use crate::io::science::ScienceFile;
use crate::types::{BoundingBox, Column, ExtractionResult, Product, Value};

pub const STRUCT_METADATA: &str = "StructMetadata.0";
pub const CORE_METADATA: &str = "CoreMetadata.0";
const RANGE_BEGIN: &str = "RANGEBEGINNINGDATE";
const RANGE_END: &str = "RANGEENDINGDATE";

static RANGE_BEGIN_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)OBJECT\s*=\s*RANGEBEGINNINGDATE\b.*?VALUE\s*=\s*"([^"]*)""#).expect("valid regex")
});
static RANGE_END_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)OBJECT\s*=\s*RANGEENDINGDATE\b.*?VALUE\s*=\s*"([^"]*)""#).expect("valid regex")
});

const MAIAC_FILL: f64 = -28672.0;
const MAIAC_UNIT: UnitSource = UnitSource::Attribute("unit");

pub const MCD19A2_TABLE: &[VariableSpec] = &[
    VariableSpec::new("Optical_Depth_047").unit(MAIAC_UNIT).scaled(MAIAC_FILL).sub_dimension(THREE_ORBITS),
    VariableSpec::new("Optical_Depth_055").unit(MAIAC_UNIT).scaled(MAIAC_FILL).sub_dimension(THREE_ORBITS),
    VariableSpec::new("AOD_Uncertainty").unit(MAIAC_UNIT).scaled(MAIAC_FILL).sub_dimension(THREE_ORBITS),
    VariableSpec::new("FineModeFraction").unit(MAIAC_UNIT).scaled(MAIAC_FILL).sub_dimension(THREE_ORBITS),
    VariableSpec::new("Column_WV").unit(MAIAC_UNIT).scaled(MAIAC_FILL).sub_dimension(THREE_ORBITS),
    VariableSpec::new("AOD_QA").unit(MAIAC_UNIT).sub_dimension(THREE_ORBITS),
    VariableSpec::new("AOD_MODEL").unit(MAIAC_UNIT).sub_dimension(THREE_ORBITS),
    VariableSpec::new("Injection_Height").unit(MAIAC_UNIT).sub_dimension(THREE_ORBITS),
];

const OZONE_FILL: f64 = -9999.0;

pub const MYD08_M3_TABLE: &[VariableSpec] = &[
    VariableSpec::new("Total_Ozone_Mean_Mean").scaled(OZONE_FILL),
    VariableSpec::new("Total_Ozone_Mean_Std").scaled(OZONE_FILL),
    VariableSpec::new("Total_Ozone_Mean_Min").scaled(OZONE_FILL),
    VariableSpec::new("Total_Ozone_Mean_Max").scaled(OZONE_FILL),
    VariableSpec::new("Total_Ozone_Std_Deviation_Mean").scaled(OZONE_FILL),
    VariableSpec::new("Total_Ozone_QA_Mean_Mean").scaled(OZONE_FILL),
    VariableSpec::new("Total_Ozone_QA_Mean_Std").scaled(OZONE_FILL),
    VariableSpec::new("Total_Ozone_QA_Mean_Min").scaled(OZONE_FILL),
    VariableSpec::new("Total_Ozone_QA_Mean_Max").scaled(OZONE_FILL),
    VariableSpec::new("Total_Ozone_QA_Std_Deviation_Mean").scaled(OZONE_FILL),
];

/// Grid product driven by a static variable table
#[derive(Debug, Clone)]
pub struct GridExtractor {
    product: Product,
    projection: GridProjection,
    corner_units: CornerUnits,
    table: &'static [VariableSpec],
}

impl GridExtractor {
    pub fn mcd19a2() -> Self {
        Self {
            product: Product::Mcd19A2,
            projection: GridProjection::modis_sinusoidal(),
            corner_units: CornerUnits::Meters,
            table: MCD19A2_TABLE,
        }
    }

    pub fn myd08_m3() -> Self {
        Self {
            product: Product::Myd08M3,
            projection: GridProjection::Geographic,
            corner_units: CornerUnits::PackedDms,
            table: MYD08_M3_TABLE,
        }
    }

    /// Grid geometry from `StructMetadata.0`, else from the geotransform of
    /// the first table variable.
    pub fn geometry(&self, file: &dyn ScienceFile) -> Result<GridGeometry> {
        if let Some(text) = file.global_attribute(STRUCT_METADATA) {
            return GridGeometry::from_struct_metadata(&text, self.corner_units);
        }
        let reference = self
            .table
            .first()
            .ok_or_else(|| Error::Parse(format!("{} has an empty variable table", self.product)))?;
        let var = file.variable(reference.source)?;
        let gt = var.geotransform.ok_or_else(|| {
            Error::Parse(format!(
                "{}: no {STRUCT_METADATA} and no geotransform on {}",
                file.describe(),
                reference.source
            ))
        })?;
        debug!("{}: grid geometry from geotransform {:?}", file.describe(), gt);
        GridGeometry::from_geotransform(gt, var.cols(), var.rows())
    }
}

fn range_date(file: &dyn ScienceFile, key: &str, pattern: &Regex) -> Result<String> {
    if let Some(value) = file.global_attribute(key) {
        return Ok(value.trim().to_string());
    }
    file.global_attribute(CORE_METADATA)
        .and_then(|text| pattern.captures(&text).map(|caps| caps[1].to_string()))
        .ok_or_else(|| Error::Parse(format!("{}: no {key} in core metadata", file.describe())))
}

/// `(start, end)` coverage dates of a grid file
pub fn coverage_dates(file: &dyn ScienceFile) -> Result<(String, String)> {
    Ok((
        range_date(file, RANGE_BEGIN, &RANGE_BEGIN_VALUE)?,
        range_date(file, RANGE_END, &RANGE_END_VALUE)?,
    ))
}

impl Extractor for GridExtractor {
    fn product(&self) -> Product {
        self.product
    }

    fn extract(&self, file: &dyn ScienceFile, bbox: &BoundingBox) -> Result<ExtractionResult> {
        let geometry = self.geometry(file)?;
        let (lat, lon) = derive_latlon(&geometry, self.projection);
        let pixels = match_pixels(
            lat.view().insert_axis(Axis(0)),
            lon.view().insert_axis(Axis(0)),
            bbox,
            None,
        )?;
        info!(
            "{}: {} of {}x{} grid pixels inside {}",
            file.describe(),
            pixels.len(),
            geometry.y_size,
            geometry.x_size,
            bbox
        );

        let (start, end) = coverage_dates(file)?;
        let n = pixels.len();
        let mut columns = vec![
            Column {
                label: "Start date".to_string(),
                values: vec![Value::Text(start); n],
            },
            Column {
                label: "End date".to_string(),
                values: vec![Value::Text(end); n],
            },
            Column {
                label: "Latitude".to_string(),
                values: pixels.iter().map(|p| Value::Number(lat[[p.row, p.col]])).collect(),
            },
            Column {
                label: "Longitude".to_string(),
                values: pixels.iter().map(|p| Value::Number(lon[[p.row, p.col]])).collect(),
            },
        ];
        columns.extend(decode_table(file, self.table, &pixels)?);
        assemble(n, columns)
    }
}
