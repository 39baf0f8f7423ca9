use thiserror::Error;

/// A page could not be fetched through any transport.
///
/// Never fatal to a run: the orchestrator treats a failed page as zero
/// results and moves on.
#[derive(Debug, Error)]
#[error("{url}: all {attempts} attempts failed, last error: {last_error}")]
pub struct FetchError {
    pub url: String,
    pub attempts: u32,
    pub last_error: String,
}

/// Datastore-level failures. `Conflict` is success-adjacent: it means the
/// row already exists and the caller should count a duplicate.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique key conflict: {0}")]
    Conflict(String),

    #[error("store api error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("store transport error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
}
