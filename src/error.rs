//! Error taxonomy shared by the library components.
//!
//! Low-level components (token store, content cache) never let these cross
//! their public boundary for expected failures; they log and return an empty
//! result instead. The dispatcher exposes them through `try_execute` only.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration value `{0}`")]
    Missing(&'static str),

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("authorization failed: {0}")]
    AuthExchange(String),

    #[error("authorization callback carried an unexpected state value")]
    StateMismatch,

    #[error("no login is in progress")]
    NoPendingLogin,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<keyring::Error> for Error {
    fn from(err: keyring::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
