use clap::Parser;
use std::path::PathBuf;

use satex::Product;

#[derive(Parser)]
#[command(name = "satex", version, about = "Satellite product extraction CLI")]
pub struct CliArgs {
    /// Product family of the input files
    #[arg(short, long, value_enum)]
    pub product: Option<Product>,

    /// Directory containing the downloaded product files
    #[arg(short, long)]
    pub input_dir: Option<PathBuf>,

    /// Output table (default: <input-dir>/result.csv). Rows are appended.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Bounding box as two corners: LAT1,LON1,LAT2,LON2
    #[arg(long, allow_hyphen_values = true)]
    pub bbox: Option<String>,

    /// JSON config file providing default box and product
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Section of the config file to use
    #[arg(long, requires = "config")]
    pub section: Option<String>,

    /// Field separator of the output table
    #[arg(long, default_value = ";")]
    pub separator: String,

    /// Delete each input file once its rows are written
    #[arg(long, default_value_t = false)]
    pub delete_after: bool,

    /// Keep going when a file fails; failures are logged and counted
    #[arg(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// Minimum quality flag, overriding the product default
    #[arg(long, allow_hyphen_values = true)]
    pub min_quality: Option<f64>,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    pub log: bool,

    /// Print the month chunks of START END (YYYY-MM-DD) and exit
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    pub split_months: Option<Vec<String>>,
}
