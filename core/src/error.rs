use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{url} is not a valid object-store path - {reason}")]
    InvalidStorePath { url: String, reason: String },

    #[error("The dashboard configuration could not be decoded")]
    InvalidConfiguration { source: prost::DecodeError },

    #[error("The dashboard configuration is invalid - {reason}")]
    ConfigValidationError { reason: String },
}
