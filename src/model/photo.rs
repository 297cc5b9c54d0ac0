use serde::Serialize;
use time::OffsetDateTime;

use time::serde::timestamp;

pub type PhotoId = i64;

/// A single photo in the shared collection: metadata, the inline encoded
/// preview payload and the selection flag.
///
/// `id` and `created_at` are assigned by the store on insert. `created_at` is
/// `None` only for rows the store has not stamped yet; such rows sort as the
/// oldest in the derived feed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub id: PhotoId,
    pub filename: String,
    pub payload: String,
    pub selected: bool,
    #[serde(with = "timestamp::option")]
    pub created_at: Option<OffsetDateTime>,
    pub owner_id: String,
}

impl PhotoRecord {
    pub fn id(&self) -> PhotoId {
        self.id
    }

    /// Creation time as unix seconds, with unstamped rows pinned to zero so
    /// they never jump ahead of acknowledged rows.
    pub fn created_at_seconds(&self) -> i64 {
        self.created_at
            .map(OffsetDateTime::unix_timestamp)
            .unwrap_or(0)
    }
}

/// Insert body for a new photo. Everything else on [`PhotoRecord`] is filled
/// in by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub filename: String,
    pub payload: String,
    pub owner_id: String,
}

impl NewPhoto {
    pub fn new(
        filename: impl Into<String>,
        payload: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            payload: payload.into(),
            owner_id: owner_id.into(),
        }
    }
}
