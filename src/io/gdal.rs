use gdal::raster::GdalDataType;
use gdal::{Dataset, Metadata, errors::GdalError as GdalCrateError};
use ndarray::Array3;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::io::science::{SampleType, ScienceFile, Variable};

/// Errors encountered when using GDAL reader
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}x{2} values, got {3}")]
    DimensionMismatch(usize, usize, usize, usize),
}

/// One entry of the `SUBDATASETS` metadata domain
#[derive(Debug, Clone)]
struct Subdataset {
    name: String,
    desc: String,
}

impl Subdataset {
    /// HDF-EOS/netCDF names end with `:Var` or `/Var`; plain HDF4 SDS only
    /// carry the variable name in the description (`[203x135] Var (int16)`).
    fn refers_to(&self, variable: &str) -> bool {
        let name = self.name.trim_end_matches('"');
        name.ends_with(&format!(":{variable}"))
            || name.ends_with(&format!("/{variable}"))
            || self.desc.contains(&format!("] {variable} ("))
    }
}

/// HDF4/HDF-EOS and netCDF reader backed by GDAL subdatasets
pub struct GdalScienceFile {
    pub path: PathBuf,
    dataset: Dataset,
    subdatasets: Vec<Subdataset>,
    globals: HashMap<String, String>,
}

// Collect `key=value` metadata entries; netCDF keys come as `var#attr` or
// `NC_GLOBAL#attr` and are stored under both spellings, variable attributes first.
fn collect_metadata<M: Metadata>(source: &M, domain: &str, map: &mut HashMap<String, String>) {
    if let Some(entries) = source.metadata_domain(domain) {
        for entry in entries {
            if let Some((key, val)) = entry.split_once('=') {
                match key.rsplit_once('#') {
                    Some(("NC_GLOBAL", attr)) => {
                        map.entry(attr.to_string()).or_insert_with(|| val.to_string());
                    }
                    Some((_, attr)) => {
                        map.insert(attr.to_string(), val.to_string());
                    }
                    None => {}
                }
                map.insert(key.to_string(), val.to_string());
            }
        }
    }
}

fn sample_type_of(band_type: GdalDataType) -> SampleType {
    match band_type {
        GdalDataType::Float32 => SampleType::Float32,
        GdalDataType::Float64 | GdalDataType::Unknown => SampleType::Float64,
        _ => SampleType::Integer,
    }
}

fn parse_subdatasets(entries: Vec<String>) -> Vec<Subdataset> {
    let mut names: Vec<(usize, String)> = Vec::new();
    let mut descs: HashMap<usize, String> = HashMap::new();
    for entry in entries {
        let Some((key, val)) = entry.split_once('=') else {
            continue;
        };
        let mut parts = key.split('_');
        let (Some("SUBDATASET"), Some(idx), Some(kind)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let Ok(idx) = idx.parse::<usize>() else {
            continue;
        };
        match kind {
            "NAME" => names.push((idx, val.to_string())),
            "DESC" => {
                descs.insert(idx, val.to_string());
            }
            _ => {}
        }
    }
    names.sort_by_key(|(idx, _)| *idx);
    names
        .into_iter()
        .map(|(idx, name)| Subdataset {
            name,
            desc: descs.remove(&idx).unwrap_or_default(),
        })
        .collect()
}

impl GdalScienceFile {
    /// Open an HDF4 or netCDF container and index its subdatasets
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdalError> {
        let dataset = Dataset::open(path.as_ref())?;
        Self::from_dataset(path.as_ref(), dataset)
    }

    /// Index an already opened container
    pub fn from_dataset<P: AsRef<Path>>(path: P, dataset: Dataset) -> Result<Self, GdalError> {
        let subdatasets = parse_subdatasets(dataset.metadata_domain("SUBDATASETS").unwrap_or_default());
        if subdatasets.is_empty() && dataset.raster_count() as usize == 0 {
            return Err(GdalError::UnsupportedFormat(format!(
                "{} has neither subdatasets nor raster bands",
                path.as_ref().display()
            )));
        }
        let mut globals = HashMap::new();
        collect_metadata(&dataset, "", &mut globals);
        debug!(
            "Opened {:?}: {} subdatasets, {} global attributes",
            path.as_ref(),
            subdatasets.len(),
            globals.len()
        );
        Ok(GdalScienceFile {
            path: path.as_ref().to_path_buf(),
            dataset,
            subdatasets,
            globals,
        })
    }

    fn find_subdataset(&self, variable: &str) -> Option<&Subdataset> {
        self.subdatasets.iter().find(|s| s.refers_to(variable))
    }

    /// Read every band of a dataset into a `(band, row, col)` array
    fn read_bands(dataset: &Dataset) -> Result<Array3<f64>, GdalError> {
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat("No raster bands found".into()));
        }
        let window = (size_x, size_y);
        let mut values = Vec::with_capacity(bands * size_x * size_y);
        for index in 1..=bands {
            let band = dataset.rasterband(index)?;
            let buf = band.read_as::<f64>((0, 0), window, window, None)?;
            values.extend_from_slice(buf.data());
        }
        let found = values.len();
        Array3::from_shape_vec((bands, size_y, size_x), values)
            .map_err(|_| GdalError::DimensionMismatch(bands, size_y, size_x, found))
    }

    fn load(&self, variable: &str) -> Result<Variable, GdalError> {
        let sub = self
            .find_subdataset(variable)
            .ok_or_else(|| GdalError::UnsupportedFormat(format!("no subdataset for `{variable}`")))?;
        let dataset = Dataset::open(Path::new(&sub.name))?;
        let data = Self::read_bands(&dataset)?;

        let mut attributes = HashMap::new();
        collect_metadata(&dataset, "", &mut attributes);
        let mut sample_type = SampleType::Float64;
        if let Ok(band) = dataset.rasterband(1) {
            collect_metadata(&band, "", &mut attributes);
            sample_type = sample_type_of(band.band_type());
        }

        let mut var = Variable::new(variable, data).with_sample_type(sample_type);
        var.attributes = attributes;
        var.geotransform = dataset.geo_transform().ok();
        Ok(var)
    }
}

impl ScienceFile for GdalScienceFile {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn variable(&self, name: &str) -> crate::Result<Variable> {
        if !self.has_variable(name) {
            return Err(crate::Error::MissingVariable(name.to_string()));
        }
        Ok(self.load(name)?)
    }

    fn global_attribute(&self, key: &str) -> Option<String> {
        self.globals
            .get(key)
            .cloned()
            .or_else(|| self.dataset.metadata_item(key, ""))
    }

    fn has_variable(&self, name: &str) -> bool {
        self.find_subdataset(name).is_some()
    }
}
