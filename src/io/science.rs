//! Format-neutral view of a self-describing scientific file (HDF4/HDF-EOS or netCDF).
//! Extractors only see this trait, so they run the same against GDAL-backed files
//! and in-memory fixtures.
use std::collections::HashMap;

use ndarray::{Array2, Array3, Axis};

use crate::error::{Error, Result};

/// Storage type of a variable before it was widened to `f64`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleType {
    #[default]
    Float64,
    /// Single precision; rendered from the `f32` value so no widening digits appear
    Float32,
    Integer,
}

/// A named array read from a file, always shaped `(layer, row, col)`.
///
/// 2-D variables have a single layer. For 3-D variables the leading dimension
/// (orbit, wavelength, time...) maps to layers.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub data: Array3<f64>,
    pub sample_type: SampleType,
    /// Affine geotransform of the variable's grid, when the reader knows one
    pub geotransform: Option<[f64; 6]>,
}

impl Variable {
    pub fn new(name: impl Into<String>, data: Array3<f64>) -> Self {
        Self {
            name: name.into(),
            attributes: HashMap::new(),
            data,
            sample_type: SampleType::default(),
            geotransform: None,
        }
    }

    pub fn from_2d(name: impl Into<String>, data: Array2<f64>) -> Self {
        Self::new(name, data.insert_axis(Axis(0)))
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_sample_type(mut self, sample_type: SampleType) -> Self {
        self.sample_type = sample_type;
        self
    }

    pub fn with_geotransform(mut self, geotransform: [f64; 6]) -> Self {
        self.geotransform = Some(geotransform);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }

    /// Numeric attribute. Tolerates the `{v}` / `v,` decorations some drivers add.
    pub fn attribute_f64(&self, key: &str) -> Option<f64> {
        let raw = self.attribute(key)?;
        raw.trim()
            .trim_matches(|c| c == '{' || c == '}')
            .split(',')
            .next()?
            .trim()
            .parse::<f64>()
            .ok()
    }

    /// Numeric attribute that must be present
    pub fn require_f64(&self, key: &str) -> Result<f64> {
        self.attribute_f64(key).ok_or_else(|| {
            Error::Parse(format!(
                "variable `{}` has no numeric `{}` attribute",
                self.name, key
            ))
        })
    }

    pub fn layers(&self) -> usize {
        self.data.dim().0
    }

    pub fn rows(&self) -> usize {
        self.data.dim().1
    }

    pub fn cols(&self) -> usize {
        self.data.dim().2
    }

    pub fn shape(&self) -> Vec<usize> {
        self.data.shape().to_vec()
    }

    /// Raw value at `(layer, row, col)`; `None` when out of bounds
    pub fn get(&self, layer: usize, row: usize, col: usize) -> Option<f64> {
        self.data.get((layer, row, col)).copied()
    }
}

/// Read-only access to a scientific data file
pub trait ScienceFile {
    /// Human readable identifier used in logs
    fn describe(&self) -> String;

    /// Load a variable with its attributes
    fn variable(&self, name: &str) -> Result<Variable>;

    /// File-level attribute (e.g. `CoreMetadata.0`, `time_reference`)
    fn global_attribute(&self, key: &str) -> Option<String>;

    fn has_variable(&self, name: &str) -> bool;
}
