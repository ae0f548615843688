use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid bounding box: {value}. Expected LAT1,LON1,LAT2,LON2")]
    InvalidBbox { value: String },

    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Config section `{section}` names unsupported product `{product}`")]
    UnsupportedProduct { section: String, product: String },

    #[error(transparent)]
    Satex(#[from] satex::Error),
}
