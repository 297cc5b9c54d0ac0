use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::{StreamExt, stream};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{BatchDeleteError, StoreError};
use crate::model::photo::{NewPhoto, PhotoId, PhotoRecord};

/// Individual deletes in flight at once during a bulk clear.
const DELETE_CONCURRENCY: usize = 8;

/// Collection path of one application's shared photos. Composed of a static
/// prefix and the runtime application id, fixed at client construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace(String);

impl Namespace {
    pub fn for_app(app_id: &str) -> Self {
        Self(format!("artifacts/{app_id}/public/data/photos"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw row shape of the `photos` table. `created_at` stays in unix seconds
/// here; [`PhotoRecord`] carries the decoded timestamp.
#[derive(sqlx::FromRow)]
struct PhotoRow {
    id: i64,
    filename: String,
    payload: String,
    selected: bool,
    created_at: Option<i64>,
    owner_id: String,
}

impl From<PhotoRow> for PhotoRecord {
    fn from(row: PhotoRow) -> Self {
        PhotoRecord {
            id: row.id,
            filename: row.filename,
            payload: row.payload,
            selected: row.selected,
            created_at: row
                .created_at
                .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok()),
            owner_id: row.owner_id,
        }
    }
}

/// Typed facade over the namespaced photo collection.
///
/// Cheap to clone; every clone shares the pool and the revision channel. The
/// store assigns ids and creation timestamps, writers never do. After every
/// committed write the revision is bumped so that live feeds reload.
#[derive(Debug, Clone)]
pub struct PhotosRepository {
    pool: SqlitePool,
    namespace: Namespace,
    revision: Arc<watch::Sender<u64>>,
}

impl PhotosRepository {
    pub fn new(pool: SqlitePool, namespace: Namespace) -> Self {
        let (revision, _) = watch::channel(0);

        Self {
            pool,
            namespace,
            revision: Arc::new(revision),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Inserts a new record in a single atomic write. The stored row, with
    /// its assigned id and creation timestamp, is returned.
    pub async fn insert_photo(&self, photo: NewPhoto) -> Result<PhotoRecord, StoreError> {
        let row: PhotoRow = sqlx::query_as(
            "insert into photos (namespace, filename, payload, selected, created_at, owner_id) \
             values ($1, $2, $3, 0, unixepoch(), $4) \
             returning id, filename, payload, selected, created_at, owner_id",
        )
        .bind(self.namespace.as_str())
        .bind(&photo.filename)
        .bind(&photo.payload)
        .bind(&photo.owner_id)
        .fetch_one(&self.pool)
        .await?;

        info!("Inserted photo {} (`{}`)", row.id, row.filename);
        self.bump_revision();

        Ok(row.into())
    }

    /// Partial update of exactly the `selected` column. Fails with
    /// [`StoreError::NotFound`] when the record is gone; callers on the
    /// toggle path treat that as benign.
    pub async fn set_selected(&self, id: PhotoId, selected: bool) -> Result<(), StoreError> {
        let result = sqlx::query("update photos set selected = $2 where id = $1 and namespace = $3")
            .bind(id)
            .bind(selected)
            .bind(self.namespace.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        debug!("Photo {id} selected = {selected}");
        self.bump_revision();

        Ok(())
    }

    /// Idempotent delete; removing an id that no longer exists succeeds.
    pub async fn delete_photo(&self, id: PhotoId) -> Result<(), StoreError> {
        let result = sqlx::query("delete from photos where id = $1 and namespace = $2")
            .bind(id)
            .bind(self.namespace.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!("Deleted photo {id}");
            self.bump_revision();
        }

        Ok(())
    }

    /// Best-effort bulk delete: individual deletes fan out with bounded
    /// concurrency, and failures are aggregated instead of aborting the
    /// siblings. Not a transaction; partial completion is a normal outcome.
    pub async fn delete_photos(&self, ids: &[PhotoId]) -> Result<u64, BatchDeleteError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let deleted = run_batch_deletes(ids, |id| self.delete_photo(id)).await?;
        info!("Cleared {deleted} photos from `{}`", self.namespace);

        Ok(deleted)
    }

    /// Full read of the namespaced collection, in store order.
    pub async fn load_all(&self) -> Result<Vec<PhotoRecord>, StoreError> {
        let rows: Vec<PhotoRow> = sqlx::query_as(
            "select id, filename, payload, selected, created_at, owner_id \
             from photos where namespace = $1",
        )
        .bind(self.namespace.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PhotoRecord::from).collect())
    }

    /// Subscription primitive: a receiver over the write revision counter.
    /// Every call yields an independent receiver; feeds reload the collection
    /// whenever the revision moves.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

async fn run_batch_deletes<F, Fut>(ids: &[PhotoId], delete: F) -> Result<u64, BatchDeleteError>
where
    F: Fn(PhotoId) -> Fut,
    Fut: Future<Output = Result<(), StoreError>>,
{
    let deletes = ids.iter().copied().map(|id| {
        let pending = delete(id);
        async move { (id, pending.await) }
    });

    let failed: Vec<(PhotoId, StoreError)> = stream::iter(deletes)
        .buffer_unordered(DELETE_CONCURRENCY)
        .filter_map(|(id, result)| async move { result.err().map(|error| (id, error)) })
        .collect()
        .await;

    if failed.is_empty() {
        Ok(ids.len() as u64)
    } else {
        Err(BatchDeleteError {
            attempted: ids.len(),
            failed,
        })
    }
}
