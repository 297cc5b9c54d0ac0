//! Selection aggregation: pure derivations over the feed's latest snapshot,
//! plus the toggle write path.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::StoreError;
use crate::model::photo::{PhotoId, PhotoRecord};
use crate::repo::PhotosRepository;
use crate::sync::{self, FeedHandle, Snapshot};

/// Derives the selected subset, count and exportable name list from the most
/// recent feed snapshot. Holds no state of its own beyond that cache.
#[derive(Clone)]
pub struct SelectionBoard {
    repo: PhotosRepository,
    snapshot: Arc<Mutex<Snapshot>>,
}

impl SelectionBoard {
    pub fn new(repo: PhotosRepository) -> Self {
        Self {
            repo,
            snapshot: Arc::new(Mutex::new(Snapshot::empty())),
        }
    }

    /// Installs the latest feed snapshot as the derivation input.
    pub fn apply(&self, snapshot: Snapshot) {
        *self.snapshot.lock().expect("selection mutex poisoned") = snapshot;
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
            .lock()
            .expect("selection mutex poisoned")
            .clone()
    }

    pub fn selected_count(&self) -> usize {
        self.snapshot
            .lock()
            .expect("selection mutex poisoned")
            .selected_count
    }

    /// Selected records in feed order.
    pub fn selected_subset(&self) -> Vec<PhotoRecord> {
        self.snapshot
            .lock()
            .expect("selection mutex poisoned")
            .records
            .iter()
            .filter(|record| record.selected)
            .cloned()
            .collect()
    }

    /// Ordered file names of the selected records. An empty list means
    /// nothing is selected; it is not an error.
    pub fn export_name_list(&self) -> Vec<String> {
        self.selected_subset()
            .into_iter()
            .map(|record| record.filename)
            .collect()
    }

    pub fn has_selection(&self) -> bool {
        self.selected_count() > 0
    }

    /// Flips a record's selection, using the value known to the latest
    /// snapshot as the base. Two clients toggling at once can observe the
    /// same base and cancel each other out; there is no version guard.
    /// A record missing from the snapshot or already deleted in the store is
    /// a benign no-op.
    pub async fn toggle(&self, id: PhotoId) -> Result<(), StoreError> {
        let current = self
            .snapshot
            .lock()
            .expect("selection mutex poisoned")
            .records
            .iter()
            .find(|record| record.id == id)
            .map(|record| record.selected);

        let Some(current) = current else {
            debug!("Toggle of {id} ignored, not in the current snapshot");
            return Ok(());
        };

        match self.repo.set_selected(id, !current).await {
            Err(StoreError::NotFound) => {
                debug!("Toggle of {id} ignored, already deleted");
                Ok(())
            }
            other => other,
        }
    }
}

/// Wires a board to its own feed subscription: every delivered snapshot is
/// applied before the next one is computed. Returns the board and the feed's
/// teardown handle.
pub fn attach<E>(repo: &PhotosRepository, on_error: E) -> (SelectionBoard, FeedHandle)
where
    E: FnOnce(StoreError) + Send + 'static,
{
    let board = SelectionBoard::new(repo.clone());
    let feed_board = board.clone();

    let handle = sync::subscribe(
        repo,
        move |snapshot| feed_board.apply(snapshot),
        on_error,
    );

    (board, handle)
}
