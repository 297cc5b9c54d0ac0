//! Shared photo proofing: one uploader adds bounded-size photo payloads to a
//! namespaced collection, viewers flip a per-photo selection flag, and every
//! participant converges on the same ordered view through a live
//! full-snapshot feed.
//!
//! The pieces compose as a loop: [`ingest`] turns raw files into inline
//! payloads, [`repo::PhotosRepository`] persists records and bumps a revision
//! on every write, [`sync::subscribe`] re-reads and re-delivers the whole
//! collection on each revision, and [`selection::SelectionBoard`] derives the
//! selected subset, count and exportable name list from the latest snapshot.

use std::str::FromStr;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{info, warn};

pub mod config;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod model;
pub mod repo;
pub mod selection;
pub mod sync;

pub use config::{Config, ConfigError, IngestOptions};
pub use error::{BatchDeleteError, IngestError, StoreError, UploadError};
pub use identity::{ClientIdentity, IdentityError, IdentitySlot};
pub use ingest::{EncodedPayload, SourceFile};
pub use model::photo::{NewPhoto, PhotoId, PhotoRecord};
pub use repo::{Namespace, PhotosRepository};
pub use selection::SelectionBoard;
pub use sync::{FeedHandle, FeedState, Snapshot};

/// Per-file outcome of [`Client::upload`].
#[derive(Debug)]
pub struct UploadOutcome {
    pub filename: String,
    pub result: Result<PhotoRecord, UploadError>,
}

/// Explicitly constructed handle to the shared collection: the pool, the
/// namespaced repository and the identity slot, with a defined
/// connect/close lifecycle. There are no ambient globals; everything a
/// component needs is passed in from here.
pub struct Client {
    config: Config,
    repo: PhotosRepository,
    identity: IdentitySlot,
}

impl Client {
    /// Opens the backing store, applies migrations and scopes the repository
    /// to the configured application namespace.
    pub async fn connect(config: Config) -> Result<Self, StoreError> {
        let connection_options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(connection_options)
            .await?;

        sqlx::migrate!().run(&pool).await.map_err(sqlx::Error::from)?;

        info!("Connected photo store for application `{}`", config.app_id);

        let namespace = Namespace::for_app(&config.app_id);
        let repo = PhotosRepository::new(pool, namespace);

        Ok(Self {
            config,
            repo,
            identity: IdentitySlot::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &PhotosRepository {
        &self.repo
    }

    /// The identity slot filled by the external sign-in bootstrap.
    pub fn identity(&self) -> &IdentitySlot {
        &self.identity
    }

    /// Subscribes an independent live feed; see [`sync::subscribe`].
    pub fn subscribe<S, E>(&self, on_snapshot: S, on_error: E) -> FeedHandle
    where
        S: FnMut(Snapshot) + Send + 'static,
        E: FnOnce(StoreError) + Send + 'static,
    {
        sync::subscribe(&self.repo, on_snapshot, on_error)
    }

    /// A selection board wired to its own feed subscription.
    pub fn selection<E>(&self, on_error: E) -> (SelectionBoard, FeedHandle)
    where
        E: FnOnce(StoreError) + Send + 'static,
    {
        selection::attach(&self.repo, on_error)
    }

    /// Ingests the given files concurrently and inserts one record per
    /// successful pipeline run. Files fail independently; the outcome list
    /// preserves input order. Requires the identity slot to be set.
    pub async fn upload(
        &self,
        sources: Vec<SourceFile>,
    ) -> Result<Vec<UploadOutcome>, UploadError> {
        let Some(owner) = self.identity.get() else {
            return Err(UploadError::NoIdentity);
        };

        let encoded = ingest::ingest_all(sources, &self.config.ingest).await;

        let mut outcomes = Vec::with_capacity(encoded.len());
        for (filename, result) in encoded {
            let result = match result {
                Ok(payload) => self
                    .repo
                    .insert_photo(NewPhoto::new(
                        filename.clone(),
                        payload.data_uri,
                        owner.as_str(),
                    ))
                    .await
                    .map_err(UploadError::from),
                Err(error) => {
                    warn!("Skipping `{filename}`: {error}");
                    Err(UploadError::from(error))
                }
            };

            outcomes.push(UploadOutcome { filename, result });
        }

        Ok(outcomes)
    }

    /// Shuts the pool down. Feeds subscribed to this client error out on
    /// their next load and report through their error callbacks.
    pub async fn close(&self) {
        self.repo.close().await;
    }
}
