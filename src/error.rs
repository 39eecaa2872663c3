//! Failure taxonomy for the ingest pipeline.

use thiserror::Error;

/// What can go wrong while accepting a batch.
///
/// Missing fields on individual records are not represented here: the batch
/// processor counts and skips those without failing the batch.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The caller's shared-secret credential was missing or wrong. Detected
    /// before any transaction starts; no storage state is touched.
    #[error("Invalid API key")]
    Unauthorized,

    /// The batch envelope itself has the wrong shape. Also detected before
    /// any transaction starts.
    #[error("{0}")]
    MalformedRequest(String),

    /// A transaction or query error against the store. The whole batch was
    /// rolled back when this is returned from an ingest.
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// The storage file or snapshot directory is not usable.
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] std::io::Error),
}
