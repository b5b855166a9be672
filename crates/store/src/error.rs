#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Artifact not found: {key}")]
    NotFound { key: String },

    /// Any transport or service failure of the backing store.
    #[error("Artifact store unavailable: {0}")]
    Unavailable(String),

    #[error("Artifact codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
