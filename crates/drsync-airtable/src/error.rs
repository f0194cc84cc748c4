use thiserror::Error;

/// Errors returned by the record store client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status. `body` is kept whole so
    /// it can be written to the diagnostics directory.
    #[error("store rejected request with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// HTTP 429 from the store.
    #[error("store rate limit reached")]
    RateLimited,

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid store API URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
