use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("no page is loaded")]
    NoPage,

    #[error("unknown element handle {0}")]
    UnknownElement(usize),

    #[error("authentication failed after trying {} login page(s): {}", attempted.len(), attempted.join(", "))]
    AuthenticationFailed { attempted: Vec<String> },

    #[error("no export download arrived within {timeout_secs}s and the page held no inline CSV")]
    DownloadMissing { timeout_secs: u64 },

    #[error("timed out after {timeout_secs}s waiting for {what}")]
    Timeout { what: String, timeout_secs: u64 },
}
