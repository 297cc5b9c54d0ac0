use thiserror::Error;

use crate::model::photo::PhotoId;

/// Failures of the image ingestion pipeline. None of these leaves a partial
/// record behind; the caller decides whether to surface or skip.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("`{filename}` is not an image (declared type: {declared})")]
    UnsupportedType { filename: String, declared: String },
    #[error("failed to decode `{filename}`: {source}")]
    Decode {
        filename: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to re-encode `{filename}`: {source}")]
    Encode {
        filename: String,
        #[source]
        source: image::ImageError,
    },
    #[error("encoded payload of `{filename}` is {size} bytes, over the {limit} byte ceiling")]
    PayloadTooLarge {
        filename: String,
        size: usize,
        limit: usize,
    },
    #[error("ingest task failed: `{0}`")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The record no longer exists. Benign on update/delete paths, another
    /// client removed it first.
    #[error("record not found")]
    NotFound,
    #[error("database error: `{0}`")]
    Database(#[from] sqlx::Error),
}

/// Outcome of a bulk delete where some individual deletes failed. The ids that
/// could not be removed are listed with their causes; every other delete in
/// the batch was still issued and completed.
#[derive(Debug, Error)]
#[error("{}/{attempted} deletes failed", failed.len())]
pub struct BatchDeleteError {
    pub attempted: usize,
    pub failed: Vec<(PhotoId, StoreError)>,
}

impl BatchDeleteError {
    pub fn failed_ids(&self) -> Vec<PhotoId> {
        self.failed.iter().map(|(id, _)| *id).collect()
    }
}

/// Per-file failure of the upload path, ingestion or persistence.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no client identity available")]
    NoIdentity,
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
