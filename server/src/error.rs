use thiserror::Error;

/// Failures while loading startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("version file has no usable `version` entry")]
    MissingVersion,

    #[error("invalid item type `{0}` in base inventory")]
    InvalidInventory(String),
}

/// Failures of the network server itself.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind: {0}")]
    Bind(#[from] std::io::Error),
}
