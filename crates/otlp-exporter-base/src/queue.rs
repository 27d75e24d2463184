//! Bounded tracking of in-flight export operations.
//!
//! The queue does not buffer work: it admits an operation only while fewer
//! than `limit` operations are running, spawns it, and forgets it as soon as
//! it settles. [`BoundedQueue::await_all`] is the flush primitive.

use crate::error::ExportError;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

type TrackedOperation = Shared<BoxFuture<'static, Result<(), Arc<ExportError>>>>;

#[derive(Default)]
struct QueueState {
    next_id: u64,
    reserved: usize,
    in_flight: HashMap<u64, TrackedOperation>,
}

impl QueueState {
    fn occupied(&self) -> usize {
        self.in_flight.len() + self.reserved
    }
}

/// Tracks up to `limit` concurrently running operations.
///
/// Operations are spawned onto the current tokio runtime and removed from the
/// queue when they complete, whether or not anybody waits for them. A panic
/// inside an operation settles it with [`ExportError::Unknown`].
pub struct BoundedQueue {
    limit: usize,
    state: Arc<Mutex<QueueState>>,
}

impl BoundedQueue {
    /// Creates a queue admitting at most `limit` operations at once.
    ///
    /// A limit of zero rejects every operation.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            state: Arc::new(Mutex::new(QueueState::default())),
        }
    }

    /// Returns the configured capacity.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of operations currently admitted (running or reserved).
    pub fn len(&self) -> usize {
        self.state.lock().occupied()
    }

    /// Returns `true` if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` when no further operation can be admitted.
    pub fn has_reached_limit(&self) -> bool {
        self.len() >= self.limit
    }

    /// Reserves capacity for one operation, or returns `None` when full.
    ///
    /// Reserving before building an operation avoids doing the work for an
    /// operation that would be rejected. Dropping the slot unused releases it.
    pub fn try_reserve(&self) -> Option<QueueSlot<'_>> {
        let mut state = self.state.lock();
        if state.occupied() >= self.limit {
            return None;
        }
        state.reserved += 1;
        Some(QueueSlot {
            queue: self,
            used: false,
        })
    }

    /// Admits and spawns `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::QueueFull`] if the queue is at capacity; the
    /// operation is dropped without being polled.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn push<F>(&self, operation: F) -> Result<(), ExportError>
    where
        F: Future<Output = Result<(), ExportError>> + Send + 'static,
    {
        let slot = self
            .try_reserve()
            .ok_or(ExportError::QueueFull { limit: self.limit })?;
        slot.push(operation);
        Ok(())
    }

    /// Waits for every operation in flight at the time of the call to settle.
    ///
    /// Operations admitted while waiting are not waited for. When this
    /// returns, none of the awaited operations remain in the queue, on
    /// success as well as on failure.
    ///
    /// # Errors
    ///
    /// Returns the first failure among the awaited operations, wrapped in
    /// [`ExportError::InFlight`].
    pub async fn await_all(&self) -> Result<(), ExportError> {
        let (ids, operations): (Vec<u64>, Vec<TrackedOperation>) = {
            let state = self.state.lock();
            state
                .in_flight
                .iter()
                .map(|(id, operation)| (*id, operation.clone()))
                .unzip()
        };

        if operations.is_empty() {
            return Ok(());
        }

        tracing::debug!(count = operations.len(), "Waiting for in-flight operations");
        let results = join_all(operations).await;

        {
            let mut state = self.state.lock();
            for id in &ids {
                state.in_flight.remove(id);
            }
        }

        match results.into_iter().find_map(Result::err) {
            Some(error) => Err(ExportError::InFlight(error)),
            None => Ok(()),
        }
    }

    fn spawn<F>(&self, operation: F)
    where
        F: Future<Output = Result<(), ExportError>> + Send + 'static,
    {
        let tracked: TrackedOperation = AssertUnwindSafe(operation)
            .catch_unwind()
            .map(|outcome| match outcome {
                Ok(result) => result.map_err(Arc::new),
                Err(_) => {
                    tracing::error!("Queued operation panicked");
                    Err(Arc::new(ExportError::Unknown))
                }
            })
            .boxed()
            .shared();

        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.reserved -= 1;
            state.in_flight.insert(id, tracked.clone());
            id
        };

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            if let Err(error) = tracked.await {
                tracing::debug!(error = %error, "Queued operation failed");
            }
            // Already gone if await_all collected it first.
            state.lock().in_flight.remove(&id);
        });
    }
}

/// Capacity reserved in a [`BoundedQueue`] for one operation.
#[must_use = "a reserved slot is released again when dropped unused"]
pub struct QueueSlot<'a> {
    queue: &'a BoundedQueue,
    used: bool,
}

impl QueueSlot<'_> {
    /// Spawns `operation` in the reserved slot.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn push<F>(mut self, operation: F)
    where
        F: Future<Output = Result<(), ExportError>> + Send + 'static,
    {
        self.used = true;
        self.queue.spawn(operation);
    }
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        if !self.used {
            self.queue.state.lock().reserved -= 1;
        }
    }
}
