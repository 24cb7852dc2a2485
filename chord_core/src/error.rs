use thiserror::Error;

/// Typed error surface for everything below the node's public `store`/`get`
/// API (which instead returns `bool`/`Option` per the spec — no exception
/// crosses that boundary).
#[derive(Debug, Error)]
pub enum ChordError {
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("request timed out")]
    Timeout,

    #[error("peer unreachable")]
    PeerUnreachable,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid signature")]
    Signature,

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<tokio::time::error::Elapsed> for ChordError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ChordError::Timeout
    }
}
