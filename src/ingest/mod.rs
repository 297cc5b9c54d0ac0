//! Image ingestion: decode, downscale and re-encode raw image files into
//! bounded-size inline payloads.

use futures::future;
use tokio::task;

use crate::config::IngestOptions;
use crate::error::IngestError;

mod encode;

pub use encode::{EncodedPayload, encode_payload, target_dimensions};

/// One raw file handed to the pipeline: the original (unsanitized) file name
/// and its bytes. The name doubles as the declared-media-type source.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Runs the pipeline for one file on the blocking pool. No references to the
/// input are retained after completion.
pub async fn ingest(
    source: SourceFile,
    options: &IngestOptions,
) -> Result<EncodedPayload, IngestError> {
    let options = options.clone();

    task::spawn_blocking(move || encode_payload(&source.filename, &source.bytes, &options)).await?
}

/// Ingests a batch concurrently. Each file succeeds or fails on its own; one
/// corrupt file never aborts its siblings. Results come back in input order,
/// paired with the source file name.
pub async fn ingest_all(
    sources: Vec<SourceFile>,
    options: &IngestOptions,
) -> Vec<(String, Result<EncodedPayload, IngestError>)> {
    let pipelines = sources.into_iter().map(|source| {
        let filename = source.filename.clone();
        let pending = ingest(source, options);
        async move { (filename, pending.await) }
    });

    future::join_all(pipelines).await
}
