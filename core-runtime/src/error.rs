use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A setting is missing or out of range.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required bridge was not injected and has no platform default.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
