//! High-level, ergonomic library API: extract single files, run batches over
//! download directories and drive a downloader chunk by chunk. Prefer these
//! entrypoints over the low-level `core` modules when integrating satex.
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::Credentials;
use crate::core::dates::split_by_month;
use crate::core::extract::Extractor;
use crate::core::params::ExtractionParams;
use crate::error::{Error, Result};
use crate::io::gdal::GdalScienceFile;
use crate::io::science::ScienceFile;
use crate::io::writers::append_result;
use crate::types::{BoundingBox, ExtractionResult, Product};

/// Open a product file through GDAL
pub fn open_science_file(path: &Path) -> Result<Box<dyn ScienceFile>> {
    Ok(Box::new(GdalScienceFile::open(path)?))
}

/// Extract the rows of a single file inside `bbox`
pub fn extract_file(path: &Path, extractor: &dyn Extractor, bbox: &BoundingBox) -> Result<ExtractionResult> {
    let file = open_science_file(path)?;
    extractor.extract(file.as_ref(), bbox)
}

// A threshold in the params that the extractor does not apply would be silently ignored
fn check_quality(extractor: &dyn Extractor, params: &ExtractionParams) -> Result<()> {
    match params.min_quality {
        Some(wanted) if extractor.min_quality() != Some(wanted) => Err(Error::InvalidArgument {
            arg: "min_quality",
            value: format!(
                "{wanted} requested but the {} extractor applies {:?}; build it with ExtractionParams::extractor",
                extractor.product(),
                extractor.min_quality()
            ),
        }),
        _ => Ok(()),
    }
}

/// Extract a single file and append its rows to `output`. Returns the rows written.
pub fn process_file(
    path: &Path,
    output: &Path,
    extractor: &dyn Extractor,
    params: &ExtractionParams,
) -> Result<usize> {
    check_quality(extractor, params)?;
    let result = extract_file(path, extractor, &params.bbox)?;
    append_result(output, &params.separator, &result)
}

/// Outcome counters of a directory batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Files extracted successfully, including those with no matching pixel
    pub processed: usize,
    /// Successful files that had no matching pixel
    pub empty: usize,
    pub errors: usize,
    pub rows_written: usize,
    pub deleted: usize,
}

impl BatchReport {
    pub fn merge(&mut self, other: &BatchReport) {
        self.processed += other.processed;
        self.empty += other.empty;
        self.errors += other.errors;
        self.rows_written += other.rows_written;
        self.deleted += other.deleted;
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Rename downloaded archives of `product` (e.g. S5P `.zip`) to the extension
/// the reader expects. Returns the number of renamed files.
pub fn rename_archives(dir: &Path, product: Product) -> Result<usize> {
    let Some(archive) = product.archive_extension() else {
        return Ok(0);
    };
    let mut renamed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, archive) {
            let target = path.with_extension(product.extension());
            fs::rename(&path, &target)?;
            info!("Renamed {:?} to {:?}", path, target);
            renamed += 1;
        }
    }
    Ok(renamed)
}

/// Files of `dir` with the product's extension, sorted by name
pub fn list_product_files(dir: &Path, product: Product) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, product.extension()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Extract every product file of `dir` into `output` using the GDAL reader.
/// See [`process_directory_with`].
pub fn process_directory(
    dir: &Path,
    output: &Path,
    extractor: &dyn Extractor,
    params: &ExtractionParams,
) -> Result<BatchReport> {
    process_directory_with(dir, output, extractor, params, open_science_file)
}

/// Extract every product file of `dir` into `output`, opening files with `open`.
///
/// The extractor must apply `params.min_quality` when it is set.
/// Files are visited in name order. The first failure aborts the batch unless
/// `params.continue_on_error` is set, in which case it is logged and counted.
/// With `params.delete_after`, a file is removed only once its own rows have
/// been written.
pub fn process_directory_with<F>(
    dir: &Path,
    output: &Path,
    extractor: &dyn Extractor,
    params: &ExtractionParams,
    open: F,
) -> Result<BatchReport>
where
    F: Fn(&Path) -> Result<Box<dyn ScienceFile>>,
{
    check_quality(extractor, params)?;
    let product = extractor.product();
    rename_archives(dir, product)?;
    let files = list_product_files(dir, product)?;
    info!(
        "Processing {} {} files from {:?} (box {})",
        files.len(),
        product,
        dir,
        params.bbox
    );

    let mut report = BatchReport::default();
    for (i, path) in files.iter().enumerate() {
        info!("Processing file... {} (Path: {:?})", i + 1, path);
        let outcome = open(path).and_then(|file| {
            let result = extractor.extract(file.as_ref(), &params.bbox)?;
            append_result(output, &params.separator, &result)
        });

        match outcome {
            Ok(rows) => {
                report.processed += 1;
                report.rows_written += rows;
                if rows == 0 {
                    report.empty += 1;
                }
                info!("Processing finished for file... {} ({} rows)", i + 1, rows);
                if params.delete_after {
                    match fs::remove_file(path) {
                        Ok(()) => report.deleted += 1,
                        Err(e) if params.continue_on_error => {
                            warn!("Could not delete {:?}: {}", path, e);
                            report.errors += 1;
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            Err(e) => {
                report.errors += 1;
                if !params.continue_on_error {
                    return Err(e);
                }
                warn!("Skipping {:?}: {}", path, e);
            }
        }
    }

    info!("All results saved to {:?}: {:?}", output, report);
    Ok(report)
}

/// One download query
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub product: Product,
    pub bbox: BoundingBox,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub collection: Option<String>,
    pub platform_name: Option<String>,
    pub credentials: Credentials,
}

/// Files fetched for a request and the box the archive actually covered
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    pub files: Vec<PathBuf>,
    pub bbox: BoundingBox,
}

/// Fetches product files from a remote archive into a local directory
pub trait Downloader {
    fn download(&mut self, request: &DownloadRequest, destination: &Path) -> Result<DownloadOutcome>;
}

/// Download month by month and extract each chunk into `output`, opening files through GDAL.
/// See [`download_and_process_with`].
pub fn download_and_process<D: Downloader + ?Sized>(
    downloader: &mut D,
    request: &DownloadRequest,
    destination: &Path,
    output: &Path,
    extractor: &dyn Extractor,
    params: &ExtractionParams,
) -> Result<BatchReport> {
    download_and_process_with(
        downloader,
        request,
        destination,
        output,
        extractor,
        params,
        open_science_file,
    )
}

/// Split the request's date range by month; for every chunk download into
/// `destination` and extract it with the box reported by the downloader.
/// A chunk without results aborts the run with [`Error::Download`].
pub fn download_and_process_with<D, F>(
    downloader: &mut D,
    request: &DownloadRequest,
    destination: &Path,
    output: &Path,
    extractor: &dyn Extractor,
    params: &ExtractionParams,
    open: F,
) -> Result<BatchReport>
where
    D: Downloader + ?Sized,
    F: Fn(&Path) -> Result<Box<dyn ScienceFile>>,
{
    fs::create_dir_all(destination)?;
    let chunks = split_by_month(request.start, request.end)?;
    let mut total = BatchReport::default();

    for (i, &(start, end)) in chunks.iter().enumerate() {
        info!(
            "Start processing from {} to {}. Chunk: {}/{}",
            start,
            end,
            i + 1,
            chunks.len()
        );
        let chunk = DownloadRequest {
            start,
            end,
            ..request.clone()
        };
        let outcome = downloader.download(&chunk, destination)?;
        if outcome.files.is_empty() {
            return Err(Error::Download(format!(
                "no {} files found for {} to {} in {}",
                request.product, start, end, request.bbox
            )));
        }
        info!("Downloaded {} files covering {}", outcome.files.len(), outcome.bbox);

        let chunk_params = ExtractionParams {
            bbox: outcome.bbox,
            ..params.clone()
        };
        let report = process_directory_with(destination, output, extractor, &chunk_params, &open)?;
        total.merge(&report);
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory::InMemoryFile;
    use crate::types::Value;
    use tempfile::TempDir;

    /// Emits as many rows as the number written in the file; `bad` fails
    struct CountingExtractor(Product);

    impl Extractor for CountingExtractor {
        fn product(&self) -> Product {
            self.0
        }

        fn extract(&self, file: &dyn ScienceFile, _bbox: &BoundingBox) -> Result<ExtractionResult> {
            let content = file.global_attribute("content").unwrap_or_default();
            let rows: usize = content
                .trim()
                .parse()
                .map_err(|_| Error::Parse(format!("{}: unreadable", file.describe())))?;
            let mut result = ExtractionResult::new(rows);
            result.push_column("File", vec![Value::from(file.describe()); rows])?;
            result.push_column("Row", (0..rows).map(|r| Value::Number(r as f64)).collect())?;
            Ok(result)
        }
    }

    fn open_text(path: &Path) -> Result<Box<dyn ScienceFile>> {
        let content = fs::read_to_string(path)?;
        let name = path.file_name().unwrap_or_default().to_string_lossy().to_string();
        Ok(Box::new(InMemoryFile::new(name).with_global("content", content)))
    }

    fn params() -> ExtractionParams {
        ExtractionParams::new(BoundingBox::new(37.7, 39.5, -9.5, -7.7).unwrap())
    }

    fn populate(dir: &Path, files: &[(&str, &str)]) {
        for (name, content) in files {
            fs::write(dir.join(name), content).unwrap();
        }
    }

    #[test]
    fn batch_is_sorted_and_filters_extension() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), &[("b.hdf", "1"), ("a.hdf", "2"), ("notes.txt", "9"), ("c.HDF", "0")]);
        let output = dir.path().join("result.csv");

        let report = process_directory_with(
            dir.path(),
            &output,
            &CountingExtractor(Product::Mod04L2),
            &params(),
            open_text,
        )
        .unwrap();

        assert_eq!(
            report,
            BatchReport {
                processed: 3,
                empty: 1,
                errors: 0,
                rows_written: 3,
                deleted: 0,
            }
        );
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "File;Row\na.hdf;0\na.hdf;1\nb.hdf;0\n"
        );
    }

    #[test]
    fn fails_fast_without_continue_on_error() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), &[("a.hdf", "1"), ("b.hdf", "bad"), ("c.hdf", "1")]);
        let output = dir.path().join("result.csv");

        let err = process_directory_with(
            dir.path(),
            &output,
            &CountingExtractor(Product::Mod04L2),
            &params(),
            open_text,
        )
        .unwrap_err();

        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(fs::read_to_string(&output).unwrap(), "File;Row\na.hdf;0\n");
    }

    #[test]
    fn delete_after_keeps_failed_files() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), &[("a.hdf", "1"), ("b.hdf", "bad"), ("c.hdf", "0")]);
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("result.csv");
        let params = ExtractionParams {
            delete_after: true,
            continue_on_error: true,
            ..params()
        };

        let report = process_directory_with(
            dir.path(),
            &output,
            &CountingExtractor(Product::Myd08M3),
            &params,
            open_text,
        )
        .unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.errors, 1);
        assert_eq!(report.deleted, 2);
        assert!(!dir.path().join("a.hdf").exists());
        assert!(dir.path().join("b.hdf").exists());
        assert!(!dir.path().join("c.hdf").exists());
    }

    #[test]
    fn empty_batch_creates_no_output() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), &[("a.hdf", "0"), ("b.hdf", "0")]);
        let output = dir.path().join("result.csv");

        let report = process_directory_with(
            dir.path(),
            &output,
            &CountingExtractor(Product::Mcd19A2),
            &params(),
            open_text,
        )
        .unwrap();

        assert_eq!(report.empty, 2);
        assert_eq!(report.rows_written, 0);
        assert!(!output.exists());
    }

    #[test]
    fn quality_threshold_must_reach_the_extractor() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), &[("a.hdf", "1")]);
        let output = dir.path().join("result.csv");
        let params = ExtractionParams {
            min_quality: Some(2.0),
            ..params()
        };

        let ignored = crate::core::extract::extractor_for(Product::Mod04L2, None);
        let err = process_directory_with(dir.path(), &output, ignored.as_ref(), &params, open_text)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "min_quality", .. }));
        assert!(!output.exists());

        let custom = process_directory_with(
            dir.path(),
            &output,
            &CountingExtractor(Product::Mod04L2),
            &params,
            open_text,
        );
        assert!(custom.is_err());

        let applied = params.extractor(Product::Mod04L2);
        assert_eq!(applied.min_quality(), Some(2.0));
    }

    #[test]
    fn archives_are_renamed_before_scanning() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), &[("S5P_1.zip", "1"), ("S5P_2.nc", "1"), ("other.hdf", "5")]);
        let output = dir.path().join("o3.csv");
        let params = ExtractionParams {
            separator: ",".to_string(),
            ..params()
        };

        let report = process_directory_with(
            dir.path(),
            &output,
            &CountingExtractor(Product::S5pO3),
            &params,
            open_text,
        )
        .unwrap();

        assert_eq!(report.processed, 2);
        assert!(dir.path().join("S5P_1.nc").exists());
        assert!(!dir.path().join("S5P_1.zip").exists());
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "File,Row\nS5P_1.nc,0\nS5P_2.nc,0\n"
        );
    }

    /// Writes one file per chunk named after the chunk start
    struct FakeDownloader {
        requests: Vec<(NaiveDate, NaiveDate)>,
        empty_after: usize,
    }

    impl Downloader for FakeDownloader {
        fn download(&mut self, request: &DownloadRequest, destination: &Path) -> Result<DownloadOutcome> {
            self.requests.push((request.start, request.end));
            if self.requests.len() > self.empty_after {
                return Ok(DownloadOutcome {
                    files: Vec::new(),
                    bbox: request.bbox,
                });
            }
            let path = destination.join(format!("{}.hdf", request.start));
            fs::write(&path, "1")?;
            Ok(DownloadOutcome {
                files: vec![path],
                bbox: request.bbox,
            })
        }
    }

    fn request() -> DownloadRequest {
        DownloadRequest {
            product: Product::Mod04L2,
            bbox: params().bbox,
            start: NaiveDate::from_ymd_opt(2021, 1, 15).unwrap(),
            end: NaiveDate::from_ymd_opt(2021, 3, 10).unwrap(),
            collection: Some("61".to_string()),
            platform_name: None,
            credentials: Credentials::default(),
        }
    }

    #[test]
    fn download_runs_month_chunks() {
        let download_dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("result.csv");
        let mut downloader = FakeDownloader {
            requests: Vec::new(),
            empty_after: usize::MAX,
        };
        let params = ExtractionParams {
            delete_after: true,
            ..params()
        };

        let report = download_and_process_with(
            &mut downloader,
            &request(),
            download_dir.path(),
            &output,
            &CountingExtractor(Product::Mod04L2),
            &params,
            open_text,
        )
        .unwrap();

        assert_eq!(downloader.requests.len(), 3);
        assert_eq!(
            downloader.requests[1],
            (
                NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2021, 2, 28).unwrap()
            )
        );
        assert_eq!(report.processed, 3);
        assert_eq!(report.deleted, 3);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "File;Row\n2021-01-15.hdf;0\n2021-02-01.hdf;0\n2021-03-01.hdf;0\n"
        );
    }

    #[test]
    fn zero_download_results_is_an_error() {
        let download_dir = TempDir::new().unwrap();
        let output = download_dir.path().join("result.csv");
        let mut downloader = FakeDownloader {
            requests: Vec::new(),
            empty_after: 1,
        };

        let err = download_and_process_with(
            &mut downloader,
            &request(),
            download_dir.path(),
            &output,
            &CountingExtractor(Product::Mod04L2),
            &params(),
            open_text,
        )
        .unwrap_err();

        assert!(matches!(err, Error::Download(_)));
        assert_eq!(downloader.requests.len(), 2);
    }
}
