use std::env;

use thiserror::Error;

/// Limits of the ingestion pipeline.
///
/// The defaults come from the tool's purpose as a proofing aid rather than an
/// archive: previews are clamped to 800 px on the longer edge and re-encoded
/// as JPEG at quality 60, and the final payload must stay under the backing
/// store's per-record ceiling of about 1 MB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Longer-edge clamp in pixels. Images already within it are not upscaled.
    pub max_edge: u32,
    /// JPEG quality on the 0-100 scale.
    pub quality: u8,
    /// Ceiling for the encoded payload string, in bytes.
    pub max_payload_bytes: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_edge: 800,
            quality: 60,
            max_payload_bytes: 1_000_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable `{0}`")]
    MissingVar(&'static str),
}

/// Construction-time configuration for a [`crate::Client`]. Nothing here is
/// read from ambient state after the client is built.
#[derive(Debug, Clone)]
pub struct Config {
    /// sqlx connection URL of the backing store.
    pub database_url: String,
    /// Application/tenant identifier; becomes part of the collection
    /// namespace and is fixed for the process lifetime.
    pub app_id: String,
    pub ingest: IngestOptions,
}

impl Config {
    pub fn new(database_url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            app_id: app_id.into(),
            ingest: IngestOptions::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("PROOFBOX_DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("PROOFBOX_DATABASE_URL"))?;
        let app_id = env::var("PROOFBOX_APP_ID").unwrap_or_else(|_| "default-app-id".to_string());

        Ok(Self::new(database_url, app_id))
    }

    pub fn with_ingest(mut self, ingest: IngestOptions) -> Self {
        self.ingest = ingest;
        self
    }
}
