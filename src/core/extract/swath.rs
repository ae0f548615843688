//! MODIS level 2 aerosol swaths (MOD04_L2, MOD04_3K).
//!
//! Geolocation comes straight from the `Latitude`/`Longitude` swath arrays and
//! pixels are further filtered on a per-product QA flag.
use tracing::info;

use super::{Extractor, assemble};
use crate::core::decode::{
    Epoch, LAND_SEA_FLAGS, QUALITY_FLAGS, SubDimension, Transform, UnitSource, VariableSpec,
    decode_table,
};
use crate::core::matcher::{QualityFilter, match_pixels};
use crate::error::Result;
use crate::io::science::ScienceFile;
use crate::types::{BoundingBox, ExtractionResult, Product};

const FILL: f64 = -9999.0;

const SCAN_START_TIME: VariableSpec = VariableSpec::new("Scan_Start_Time")
    .unit(UnitSource::Fixed("Time UTC+0"))
    .transform(Transform::TimeOffset(Epoch::TAI93));

pub const MOD04_L2_QA: &str = "Deep_Blue_Aerosol_Optical_Depth_550_Land_QA_Flag";

// Values are written as stored: no scaling, no flag labels
pub const MOD04_L2_TABLE: &[VariableSpec] = &[
    SCAN_START_TIME,
    VariableSpec::new("Latitude"),
    VariableSpec::new("Longitude"),
    VariableSpec::new("Deep_Blue_Aerosol_Optical_Depth_550_Land_Best_Estimate"),
    VariableSpec::new("Deep_Blue_Aerosol_Optical_Depth_550_Land_STD"),
    VariableSpec::new(MOD04_L2_QA),
    VariableSpec::new("Topographic_Altitude_Land"),
];

pub const MOD04_3K_QA: &str = "Land_Ocean_Quality_Flag";

const WAVELENGTHS: SubDimension = &[(0, "0.47 microns"), (1, "0.55 microns"), (2, "0.66 microns")];

pub const MOD04_3K_TABLE: &[VariableSpec] = &[
    SCAN_START_TIME,
    VariableSpec::new("Latitude"),
    VariableSpec::new("Longitude"),
    VariableSpec::new("Optical_Depth_Land_And_Ocean").scaled(FILL),
    VariableSpec::new("Image_Optical_Depth_Land_And_Ocean").scaled(FILL),
    VariableSpec::new("Corrected_Optical_Depth_Land")
        .scaled(FILL)
        .sub_dimension(WAVELENGTHS),
    VariableSpec::new("Corrected_Optical_Depth_Land_wav2p1").scaled(FILL),
    VariableSpec::new(MOD04_3K_QA).transform(Transform::FlagLabel(QUALITY_FLAGS)),
    VariableSpec::new("Land_sea_Flag").transform(Transform::FlagLabel(LAND_SEA_FLAGS)),
    VariableSpec::new("Topographic_Altitude_Land").scaled(FILL),
];

/// Swath product driven by a static variable table
#[derive(Debug, Clone)]
pub struct SwathExtractor {
    product: Product,
    table: &'static [VariableSpec],
    qa_variable: &'static str,
    min_quality: f64,
}

impl SwathExtractor {
    pub fn mod04_l2(min_quality: Option<f64>) -> Self {
        Self {
            product: Product::Mod04L2,
            table: MOD04_L2_TABLE,
            qa_variable: MOD04_L2_QA,
            min_quality: min_quality.unwrap_or(0.0),
        }
    }

    pub fn mod04_3k(min_quality: Option<f64>) -> Self {
        Self {
            product: Product::Mod04_3K,
            table: MOD04_3K_TABLE,
            qa_variable: MOD04_3K_QA,
            min_quality: min_quality.unwrap_or(0.0),
        }
    }
}

impl Extractor for SwathExtractor {
    fn product(&self) -> Product {
        self.product
    }

    fn min_quality(&self) -> Option<f64> {
        Some(self.min_quality)
    }

    fn extract(&self, file: &dyn ScienceFile, bbox: &BoundingBox) -> Result<ExtractionResult> {
        let lat = file.variable("Latitude")?;
        let lon = file.variable("Longitude")?;
        let qa = file.variable(self.qa_variable)?;

        let pixels = match_pixels(
            lat.data.view(),
            lon.data.view(),
            bbox,
            Some(QualityFilter {
                values: qa.data.view(),
                min_quality: self.min_quality,
            }),
        )?;
        info!(
            "{}: {} pixels inside {} with {} >= {}",
            file.describe(),
            pixels.len(),
            bbox,
            self.qa_variable,
            self.min_quality
        );

        let columns = decode_table(file, self.table, &pixels)?;
        assemble(pixels.len(), columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::io::memory::InMemoryFile;
    use crate::io::science::Variable;
    use crate::types::Value;
    use ndarray::{Array2, Array3, array};

    fn geo(name: &str, long_name: &str, units: &str, data: Array2<f64>) -> Variable {
        Variable::from_2d(name, data)
            .with_attribute("long_name", long_name)
            .with_attribute("units", units)
    }

    fn scaled(name: &str, data: Array2<f64>) -> Variable {
        geo(name, name, "None", data).with_attribute("scale_factor", "0.001")
    }

    fn mod04_l2_file() -> InMemoryFile {
        InMemoryFile::new("MOD04_L2.A2021015.1050.061.hdf")
            .with_variable(geo(
                "Scan_Start_Time",
                "Scan Start Time",
                "Seconds since 1993-1-1 00:00:00.0 0",
                array![[0.0, 60.0], [120.0, 180.0]],
            ))
            .with_variable(geo("Latitude", "Geodetic Latitude", "Degrees_north", array![[38.5, 38.6], [40.0, 38.7]]))
            .with_variable(geo("Longitude", "Geodetic Longitude", "Degrees_east", array![[-9.0, -8.9], [-9.0, -8.5]]))
            .with_variable(scaled(
                "Deep_Blue_Aerosol_Optical_Depth_550_Land_Best_Estimate",
                array![[120.0, -9999.0], [50.0, 80.0]],
            ))
            .with_variable(scaled(
                "Deep_Blue_Aerosol_Optical_Depth_550_Land_STD",
                array![[10.0, 20.0], [30.0, 40.0]],
            ))
            .with_variable(geo(MOD04_L2_QA, "Deep Blue QA", "None", array![[3.0, 0.0], [3.0, 1.0]]))
            .with_variable(
                geo("Topographic_Altitude_Land", "Altitude", "meters", array![[100.0, 200.0], [300.0, 400.0]])
                    .with_attribute("scale_factor", "1.0"),
            )
    }

    fn lisbon() -> BoundingBox {
        BoundingBox::from_corners(37.7, -9.5, 39.5, -7.7).unwrap()
    }

    #[test]
    fn mod04_l2_rows_and_labels() {
        let result = SwathExtractor::mod04_l2(None)
            .extract(&mod04_l2_file(), &lisbon())
            .unwrap();

        assert_eq!(result.row_count(), 3);
        assert_eq!(
            result.labels().collect::<Vec<_>>(),
            vec![
                "Scan Start Time (Time UTC+0)",
                "Geodetic Latitude (Degrees_north)",
                "Geodetic Longitude (Degrees_east)",
                "Deep_Blue_Aerosol_Optical_Depth_550_Land_Best_Estimate (None)",
                "Deep_Blue_Aerosol_Optical_Depth_550_Land_STD (None)",
                "Deep Blue QA (None)",
                "Altitude (meters)",
            ]
        );
        let times: Vec<String> = result
            .column("Scan Start Time (Time UTC+0)")
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(times, vec!["1993-01-01T00:00:00", "1993-01-01T00:01:00", "1993-01-01T00:03:00"]);
        // scale_factor is present but MOD04_L2 cells stay raw
        let aod = result
            .column("Deep_Blue_Aerosol_Optical_Depth_550_Land_Best_Estimate (None)")
            .unwrap();
        assert_eq!(aod, &[Value::Number(120.0), Value::Number(-9999.0), Value::Number(80.0)]);
        let qa: Vec<String> = result
            .column("Deep Blue QA (None)")
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(qa, vec!["3", "0", "1"]);
        let altitude = result.column("Altitude (meters)").unwrap();
        assert_eq!(altitude[2], Value::Number(400.0));
    }

    #[test]
    fn quality_override_filters_rows() {
        let result = SwathExtractor::mod04_l2(Some(2.0))
            .extract(&mod04_l2_file(), &lisbon())
            .unwrap();
        assert_eq!(result.row_count(), 1);
        assert_eq!(
            result.column("Geodetic Latitude (Degrees_north)").unwrap(),
            &[Value::Number(38.5)]
        );
    }

    #[test]
    fn no_match_is_empty_result() {
        let far = BoundingBox::new(-10.0, -5.0, 100.0, 110.0).unwrap();
        let result = SwathExtractor::mod04_l2(None)
            .extract(&mod04_l2_file(), &far)
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.columns().len(), MOD04_L2_TABLE.len());
    }

    #[test]
    fn missing_variable_is_reported() {
        let file = InMemoryFile::new("broken.hdf")
            .with_variable(geo("Latitude", "lat", "deg", array![[38.5]]))
            .with_variable(geo("Longitude", "lon", "deg", array![[-9.0]]));
        let err = SwathExtractor::mod04_3k(None)
            .extract(&file, &lisbon())
            .unwrap_err();
        assert!(matches!(err, Error::MissingVariable(name) if name == MOD04_3K_QA));
    }

    #[test]
    fn mod04_3k_expands_wavelengths() {
        let one = |name: &str, v: f64| scaled(name, array![[v]]);
        let file = InMemoryFile::new("MOD04_3K.hdf")
            .with_variable(geo("Scan_Start_Time", "Scan Start Time", "s", array![[0.0]]))
            .with_variable(geo("Latitude", "Geodetic Latitude", "Degrees_north", array![[38.5]]))
            .with_variable(geo("Longitude", "Geodetic Longitude", "Degrees_east", array![[-9.0]]))
            .with_variable(one("Optical_Depth_Land_And_Ocean", 100.0))
            .with_variable(one("Image_Optical_Depth_Land_And_Ocean", 200.0))
            .with_variable(
                Variable::new("Corrected_Optical_Depth_Land", Array3::from_elem((3, 1, 1), 300.0))
                    .with_attribute("long_name", "Corrected AOD")
                    .with_attribute("units", "None")
                    .with_attribute("scale_factor", "0.001"),
            )
            .with_variable(one("Corrected_Optical_Depth_Land_wav2p1", 400.0))
            .with_variable(geo(MOD04_3K_QA, "Quality", "None", array![[2.0]]))
            .with_variable(geo("Land_sea_Flag", "Land/Sea", "None", array![[1.0]]))
            .with_variable(one("Topographic_Altitude_Land", 5.0));

        let result = SwathExtractor::mod04_3k(None).extract(&file, &lisbon()).unwrap();

        assert_eq!(result.row_count(), 1);
        assert_eq!(result.columns().len(), MOD04_3K_TABLE.len() + 2);
        assert!(result.column("Corrected AOD (0.55 microns, None)").is_some());
        assert_eq!(
            result.column("Land/Sea (None)").unwrap(),
            &[Value::Text("1 (Land)".to_string())]
        );
        assert_eq!(
            result.column("Quality (None)").unwrap(),
            &[Value::Text("2 (Good)".to_string())]
        );
    }
}
