use thiserror::Error;

/// Failures raised while talking to the generation provider.
///
/// `Api` carries the upstream HTTP status and whatever message the provider
/// attached, so callers can log something actionable. `Malformed` means the
/// provider answered 200 but the body did not have the shape we expect.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request to generation provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Generation provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        ProviderError::Malformed(message.into())
    }
}

/// Failures raised by the conversation store and the record codec on top of it.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt conversation record: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Unsupported conversation record version {0}")]
    UnsupportedVersion(u64),

    #[error("Store path unusable: {0}")]
    BadPath(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
pub type StoreResult<T> = Result<T, StoreError>;
