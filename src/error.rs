use thiserror::Error;

/// Failure retrieving one candidate URL.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("malformed sitemap: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("record rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Hard failure of one import item, or a batch-level contract violation.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import batch is empty")]
    EmptyBatch,
    #[error("no resolvable URL for {identifier}: no code, name or usable image reference")]
    NoCandidateUrl { identifier: String },
    #[error("all {attempts} candidate URLs failed for {identifier}; last error: {last_error}")]
    AllCandidatesFailed {
        identifier: String,
        attempts: usize,
        last_error: String,
    },
    #[error("no product name found at {source_url} and none supplied")]
    MissingName { source_url: String },
    #[error("catalog store failed: {0}")]
    Store(#[from] StoreError),
    #[error("processing panicked: {0}")]
    Panicked(String),
}
