use std::cmp::Reverse;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::StoreError;
use crate::model::photo::PhotoRecord;
use crate::repo::PhotosRepository;

/// One complete, authoritative view of the collection: the derived order plus
/// the selection count, computed together so consumers never pair a list with
/// a count from a different moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub records: Vec<PhotoRecord>,
    pub selected_count: usize,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            selected_count: 0,
        }
    }

    /// Normalizes a raw collection read: newest first, with unstamped rows
    /// (no creation timestamp yet) sorting as the oldest.
    pub fn from_records(mut records: Vec<PhotoRecord>) -> Self {
        records.sort_by_key(|record| Reverse(record.created_at_seconds()));
        let selected_count = records.iter().filter(|record| record.selected).count();

        Self {
            records,
            selected_count,
        }
    }
}

/// Lifecycle of one subscription. There is no buffering state in between:
/// every delivery is a full snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Connecting,
    Streaming,
    Error,
    Closed,
}

struct Callbacks {
    on_snapshot: Box<dyn FnMut(Snapshot) + Send>,
    on_error: Box<dyn FnOnce(StoreError) + Send>,
}

struct FeedInner {
    state: FeedState,
    /// Taken on teardown or error; once `None`, nothing fires again.
    callbacks: Option<Callbacks>,
}

struct FeedShared {
    inner: Mutex<FeedInner>,
}

impl FeedShared {
    fn new(callbacks: Callbacks) -> Self {
        Self {
            inner: Mutex::new(FeedInner {
                state: FeedState::Connecting,
                callbacks: Some(callbacks),
            }),
        }
    }

    /// Returns false once the subscription is torn down.
    fn deliver_snapshot(&self, snapshot: Snapshot) -> bool {
        let mut guard = self.inner.lock().expect("feed mutex poisoned");
        let inner = &mut *guard;

        match inner.callbacks.as_mut() {
            Some(callbacks) => {
                inner.state = FeedState::Streaming;
                (callbacks.on_snapshot)(snapshot);
                true
            }
            None => false,
        }
    }

    /// Delivers a transport error exactly once and ends the feed.
    fn deliver_error(&self, error: StoreError) {
        let mut guard = self.inner.lock().expect("feed mutex poisoned");
        let inner = &mut *guard;

        if let Some(callbacks) = inner.callbacks.take() {
            inner.state = FeedState::Error;
            (callbacks.on_error)(error);
        }
    }
}

/// Live subscription to the photo collection.
///
/// Each call spawns an independent feed task: it loads the full collection,
/// normalizes and sorts it, and delivers one atomic [`Snapshot`] to
/// `on_snapshot` - once immediately and again after every committed write.
/// Any load failure moves the feed to [`FeedState::Error`], reaches
/// `on_error` exactly once and ends the task; reconnecting means subscribing
/// again. Callbacks run on the feed task and must not call back into the
/// returned handle.
pub fn subscribe<S, E>(repo: &PhotosRepository, on_snapshot: S, on_error: E) -> FeedHandle
where
    S: FnMut(Snapshot) + Send + 'static,
    E: FnOnce(StoreError) + Send + 'static,
{
    let shared = Arc::new(FeedShared::new(Callbacks {
        on_snapshot: Box::new(on_snapshot),
        on_error: Box::new(on_error),
    }));

    let mut revisions = repo.watch();
    let repo = repo.clone();
    let task_shared = Arc::clone(&shared);

    let task = tokio::spawn(async move {
        loop {
            match repo.load_all().await {
                Ok(records) => {
                    let snapshot = Snapshot::from_records(records);
                    debug!(
                        "Delivering snapshot: {} records, {} selected",
                        snapshot.records.len(),
                        snapshot.selected_count
                    );
                    if !task_shared.deliver_snapshot(snapshot) {
                        break;
                    }
                }
                Err(err) => {
                    error!("Photo feed lost its source: {err}");
                    task_shared.deliver_error(err);
                    break;
                }
            }

            if revisions.changed().await.is_err() {
                break;
            }
        }
    });

    FeedHandle { shared, task }
}

/// Teardown handle of one subscription.
pub struct FeedHandle {
    shared: Arc<FeedShared>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    pub fn state(&self) -> FeedState {
        self.shared.inner.lock().expect("feed mutex poisoned").state
    }

    /// Idempotent teardown. An in-flight delivery finishes before this
    /// returns; afterwards no callback runs again.
    pub fn unsubscribe(&self) {
        {
            let mut guard = self.shared.inner.lock().expect("feed mutex poisoned");
            let inner = &mut *guard;
            if inner.callbacks.take().is_some() {
                inner.state = FeedState::Closed;
            }
        }

        self.task.abort();
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
