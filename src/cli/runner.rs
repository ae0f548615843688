use tracing::info;
use tracing_subscriber::EnvFilter;

use satex::api::process_directory;
use satex::config::Config;
use satex::core::dates::split_by_month_str;
use satex::{BoundingBox, ExtractionParams, Product};

use super::args::CliArgs;
use super::errors::AppError;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Parse `LAT1,LON1,LAT2,LON2` into a normalized box
fn parse_bbox(value: &str) -> Result<BoundingBox, AppError> {
    let invalid = || AppError::InvalidBbox {
        value: value.to_string(),
    };
    let parts = value
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;
    let [lat_a, lon_a, lat_b, lon_b] = parts[..] else {
        return Err(invalid());
    };
    Ok(BoundingBox::from_corners(lat_a, lon_a, lat_b, lon_b)?)
}

fn load_config(args: &CliArgs) -> Result<Option<Config>, AppError> {
    match (&args.config, &args.section) {
        (Some(path), Some(section)) => Ok(Some(Config::load(path, section)?)),
        (Some(_), None) => Err(AppError::MissingArgument {
            arg: "--section".to_string(),
        }),
        _ => Ok(None),
    }
}

fn resolve_product(args: &CliArgs, config: Option<&Config>) -> Result<Product, AppError> {
    if let Some(product) = args.product {
        return Ok(product);
    }
    let Some(config) = config else {
        return Err(AppError::MissingArgument {
            arg: "--product".to_string(),
        });
    };
    match config.defaults().product_type.as_deref() {
        Some(name) => Product::from_short_name(name).ok_or_else(|| AppError::UnsupportedProduct {
            section: config.name.clone(),
            product: name.to_string(),
        }),
        None => Err(AppError::MissingArgument {
            arg: "--product".to_string(),
        }),
    }
}

fn resolve_bbox(args: &CliArgs, config: Option<&Config>) -> Result<BoundingBox, AppError> {
    match (&args.bbox, config) {
        (Some(value), _) => parse_bbox(value),
        (None, Some(config)) => Ok(config.bbox()?),
        (None, None) => Err(AppError::MissingArgument {
            arg: "--bbox".to_string(),
        }),
    }
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.log);

    if let Some(range) = &args.split_months {
        let [start, end] = range.as_slice() else {
            return Err(AppError::MissingArgument {
                arg: "--split-months START END".to_string(),
            }
            .into());
        };
        for (from, to) in split_by_month_str(start, end)? {
            println!("{from} {to}");
        }
        return Ok(());
    }

    let config = load_config(&args)?;
    let product = resolve_product(&args, config.as_ref())?;
    let bbox = resolve_bbox(&args, config.as_ref())?;
    let input_dir = args.input_dir.clone().ok_or(AppError::MissingArgument {
        arg: "--input-dir".to_string(),
    })?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| input_dir.join("result.csv"));

    let params = ExtractionParams {
        bbox,
        separator: args.separator.clone(),
        delete_after: args.delete_after,
        continue_on_error: args.continue_on_error,
        min_quality: args.min_quality,
    };

    info!("Starting {} extraction from directory: {:?}", product, input_dir);
    info!("Bounding box: {}", bbox);
    info!("Output file: {:?}", output);

    let extractor = params.extractor(product);
    let report = process_directory(&input_dir, &output, extractor.as_ref(), &params)?;

    info!("Batch processing complete!");
    info!("Processed: {}", report.processed);
    info!("Without matches: {}", report.empty);
    info!("Rows written: {}", report.rows_written);
    info!("Deleted: {}", report.deleted);
    info!("Errors: {}", report.errors);

    Ok(())
}
