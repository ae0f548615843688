#![doc = r#"
satex: bounding-box extraction of satellite atmosphere products.

This crate turns downloaded MODIS aerosol/ozone products (HDF4/HDF-EOS) and
Sentinel-5P TROPOMI ozone products (netCDF) into a flat delimited table: one row per
pixel inside a geographic box, one column per decoded variable. It powers the satex CLI
and can be embedded in your own Rust applications.

Supported products
------------------
| Product      | Geolocation                        | Quality filter (default)       |
|--------------|------------------------------------|--------------------------------|
| `MOD04_L2`   | swath `Latitude`/`Longitude`       | Deep Blue QA flag `>= 0`       |
| `MOD04_3K`   | swath `Latitude`/`Longitude`       | Land/Ocean quality flag `>= 0` |
| `MCD19A2`    | sinusoidal tile, reprojected       | none                           |
| `MYD08_M3`   | global 1 degree geographic grid    | none                           |
| `L2__O3____` | `(time, scanline, pixel)` arrays   | none (optional raw `qa_value`) |

Requirements
------------
- GDAL development headers and runtime, built with HDF4 and netCDF support.
- Rust 2024 edition toolchain.

Quick start: extract a download directory
-----------------------------------------
```rust,no_run
use std::path::Path;
use satex::{BoundingBox, ExtractionParams, Product, process_directory};

fn main() -> satex::Result<()> {
    let params = ExtractionParams {
        delete_after: false,
        continue_on_error: true,
        ..ExtractionParams::new(BoundingBox::from_corners(37.7, -9.5, 39.5, -7.7)?)
    };
    let extractor = params.extractor(Product::Mod04L2);

    let report = process_directory(
        Path::new("/data/mod04"),
        Path::new("/data/mod04/result.csv"),
        extractor.as_ref(),
        &params,
    )?;

    println!(
        "processed={} empty={} rows={} errors={}",
        report.processed, report.empty, report.rows_written, report.errors
    );
    Ok(())
}
```

Extract from any `ScienceFile`
------------------------------
Extractors only see the [`io::ScienceFile`] trait, so files can come from GDAL or be
assembled in memory:

```rust
use ndarray::array;
use satex::io::{InMemoryFile, Variable};
use satex::{BoundingBox, Product};

fn main() -> satex::Result<()> {
    let file = InMemoryFile::new("S5P_example.nc")
        .with_variable(Variable::new("latitude", array![[[38.5, 45.0]]]))
        .with_variable(Variable::new("longitude", array![[[-9.0, -9.0]]]))
        .with_variable(
            Variable::new("delta_time", array![[[0.0]]])
                .with_attribute("units", "milliseconds since 2021-01-15 00:00:00"),
        )
        .with_variable(Variable::new("qa_value", array![[[100.0, 100.0]]]).with_attribute("scale_factor", "0.01"))
        .with_variable(Variable::new("ozone_total_vertical_column", array![[[0.14, 0.15]]]))
        .with_variable(Variable::new("ozone_total_vertical_column_precision", array![[[0.001, 0.001]]]));

    let bbox = BoundingBox::new(37.7, 39.5, -9.5, -7.7)?;
    let result = Product::S5pO3.extractor(None).extract(&file, &bbox)?;

    assert_eq!(result.row_count(), 1);
    assert_eq!(result.labels().next(), Some("Time"));
    Ok(())
}
```

Month-chunked downloads
-----------------------
Remote archives are queried month by month. Implement [`api::Downloader`] for your
archive client and let [`api::download_and_process`] chunk the date range, download
each chunk and extract it:

```rust
use satex::split_by_month_str;

fn main() -> satex::Result<()> {
    let chunks = split_by_month_str("2021-01-15", "2021-03-10")?;
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[1], ("2021-02-01".to_string(), "2021-02-28".to_string()));
    Ok(())
}
```

Error handling
--------------
All public functions return `satex::Result<T>`; match on `satex::Error` to handle specific
cases, e.g. GDAL failures or variables missing from a file.

```rust,no_run
use std::path::Path;
use satex::{BoundingBox, Error, Product, extract_file};

fn main() {
    let bbox = BoundingBox::new(37.7, 39.5, -9.5, -7.7).expect("valid box");
    let extractor = Product::Mcd19A2.extractor(None);
    match extract_file(Path::new("/bad/path.hdf"), extractor.as_ref(), &bbox) {
        Ok(result) => println!("{} rows", result.row_count()),
        Err(Error::Gdal(e)) => eprintln!("GDAL error: {e}"),
        Err(Error::MissingVariable(name)) => eprintln!("not a MCD19A2 file: no {name}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`]: high-level, ergonomic entry points.
- [`core`]: matcher, grid reprojector, field decoder and per-product extractors.
- [`config`]: JSON configuration sections and credentials.
- [`types`]: `Product`, `BoundingBox`, `Value` and `ExtractionResult`.
- [`io`]: the `ScienceFile` abstraction, GDAL reader and delimited writer.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use core::params::ExtractionParams;
pub use error::{Error, Result};
pub use types::{BoundingBox, Column, ExtractionResult, Product, Value};

// Building blocks
pub use core::dates::{split_by_month, split_by_month_str};
pub use core::extract::{Extractor, extractor_for};
pub use core::matcher::{PixelIndex, QualityFilter, match_pixels};

// Readers and writers
pub use io::gdal::{GdalError, GdalScienceFile};
pub use io::writers::append_result;

// High-level API re-exports
pub use api::{
    BatchReport, DownloadOutcome, DownloadRequest, Downloader, download_and_process,
    extract_file, process_directory, process_directory_with, process_file,
};
