//! Debounced persistence of transform edits.
//!
//! Every edit lands in the in-memory model immediately. The store only sees
//! a layer's edits once that layer has been quiet for the debounce window;
//! edits inside the window are merged field by field, later values winning.
//! Layers debounce independently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use sizesnapper_common::error::{SnapperError, SnapperResult};
use sizesnapper_project_model::TransformUpdate;
use sizesnapper_store::ProjectStore;

/// A write that reached the store and failed.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistFailure {
    pub image_id: String,
    pub update: TransformUpdate,
    pub message: String,
}

struct PendingWrite {
    ticket: u64,
    update: TransformUpdate,
    handle: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingWrite>>>;
type FailureLog = Arc<Mutex<Vec<PersistFailure>>>;

/// Per-layer timer registry for transform writes.
///
/// Dropping the scheduler cancels every pending timer. A write already
/// handed to the store is left to finish.
pub struct PersistScheduler {
    store: Arc<dyn ProjectStore>,
    window: Duration,
    pending: PendingMap,
    failures: FailureLog,
    next_ticket: AtomicU64,
}

impl PersistScheduler {
    pub fn new(store: Arc<dyn ProjectStore>, window: Duration) -> Self {
        Self {
            store,
            window,
            pending: Arc::default(),
            failures: Arc::default(),
            next_ticket: AtomicU64::new(0),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Queue `update` for `image_id`, restarting that layer's timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, image_id: &str, update: TransformUpdate) -> SnapperResult<()> {
        if update.is_empty() {
            return Ok(());
        }
        let runtime = Handle::try_current()
            .map_err(|e| SnapperError::store(format!("cannot schedule write: {e}")))?;

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let mut pending = lock(&self.pending);
        let merged = match pending.remove(image_id) {
            Some(previous) => {
                previous.handle.abort();
                previous.update.merge(update)
            }
            None => update,
        };

        let handle = runtime.spawn(fire_after(
            self.window,
            image_id.to_string(),
            ticket,
            Arc::clone(&self.store),
            Arc::clone(&self.pending),
            Arc::clone(&self.failures),
        ));
        pending.insert(
            image_id.to_string(),
            PendingWrite {
                ticket,
                update: merged,
                handle,
            },
        );
        tracing::trace!(image = image_id, ticket, "Scheduled transform write");
        Ok(())
    }

    /// Number of layers with a write waiting on its timer.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// The merged update waiting for `image_id`, if any.
    pub fn pending_update(&self, image_id: &str) -> Option<TransformUpdate> {
        lock(&self.pending).get(image_id).map(|w| w.update)
    }

    /// Cancel the timer for one layer, discarding its pending update.
    pub fn cancel(&self, image_id: &str) -> bool {
        match lock(&self.pending).remove(image_id) {
            Some(write) => {
                write.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every timer. Returns how many pending writes were discarded.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<PendingWrite> = lock(&self.pending).drain().map(|(_, w)| w).collect();
        for write in &drained {
            write.handle.abort();
        }
        if !drained.is_empty() {
            tracing::debug!(cancelled = drained.len(), "Cancelled pending transform writes");
        }
        drained.len()
    }

    /// Write every pending update now instead of waiting for its timer.
    ///
    /// Returns how many writes succeeded; failures are recorded.
    pub async fn flush_all(&self) -> usize {
        let drained: Vec<(String, TransformUpdate)> = {
            let mut pending = lock(&self.pending);
            pending
                .drain()
                .map(|(id, write)| {
                    write.handle.abort();
                    (id, write.update)
                })
                .collect()
        };

        let mut written = 0;
        for (image_id, update) in drained {
            if persist(self.store.as_ref(), &self.failures, &image_id, update).await {
                written += 1;
            }
        }
        written
    }

    /// Take the failures recorded so far.
    pub fn drain_failures(&self) -> Vec<PersistFailure> {
        std::mem::take(&mut *lock(&self.failures))
    }
}

impl Drop for PersistScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn fire_after(
    window: Duration,
    image_id: String,
    ticket: u64,
    store: Arc<dyn ProjectStore>,
    pending: PendingMap,
    failures: FailureLog,
) {
    tokio::time::sleep(window).await;

    let update = {
        let mut pending = lock(&pending);
        match pending.get(&image_id) {
            Some(write) if write.ticket == ticket => pending.remove(&image_id).map(|w| w.update),
            _ => None,
        }
    };
    if let Some(update) = update {
        persist(store.as_ref(), &failures, &image_id, update).await;
    }
}

async fn persist(
    store: &dyn ProjectStore,
    failures: &FailureLog,
    image_id: &str,
    update: TransformUpdate,
) -> bool {
    match store.patch_transform(image_id, &update).await {
        Ok(()) => {
            tracing::debug!(image = image_id, update = ?update, "Persisted transform");
            true
        }
        Err(err) => {
            tracing::warn!(image = image_id, error = %err, "Failed to persist transform");
            lock(failures).push(PersistFailure {
                image_id: image_id.to_string(),
                update,
                message: err.to_string(),
            });
            false
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
