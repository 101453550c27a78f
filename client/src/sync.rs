//! Cached task list kept in step with the server.
//!
//! [`TaskSync`] reads the list through a [`QueryCache`] and exposes the
//! mutation entry points. A successful mutation never patches the cached
//! list; it invalidates the `tasks` query and, if the list has been read,
//! re-fetches it, so the list only ever shows what the server returned.
//!
//! Mutations are not serialized against each other. When two of them race
//! on the same task, the list fetch that resolves last is what the cache
//! ends up holding. A fetch that was already in flight when a mutation
//! invalidated the list never overwrites it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::{CreateTaskRequest, Task, TaskId, TaskStatus, UpdateTaskRequest};
use tracing::debug;

use crate::api::{HttpTaskApi, TaskApi};
use crate::cache::{QueryCache, QueryEntry, QueryKey};
use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::observer::{MutationKind, SyncObserver, TracingObserver};

/// Point-in-time view of the task list and pending mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListState {
    /// Last successfully fetched list; empty until the first load.
    pub tasks: Vec<Task>,
    pub is_loading: bool,
    /// Set when the most recent list fetch failed.
    pub error: Option<TransportError>,
    pub is_creating: bool,
    pub is_updating: bool,
    pub is_deleting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskUpdate {
    pub id: TaskId,
    pub updates: UpdateTaskRequest,
}

type SuccessFn<T> = Box<dyn FnOnce(&T) + Send>;
type ErrorFn = Box<dyn FnOnce(&TransportError) + Send>;

/// Per-call callbacks for a mutation. Exactly one of them runs, after the
/// cached list has been invalidated.
pub struct MutationCallbacks<T> {
    on_success: Option<SuccessFn<T>>,
    on_error: Option<ErrorFn>,
}

impl<T> Default for MutationCallbacks<T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }
}

impl<T> MutationCallbacks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl FnOnce(&T) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&TransportError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    fn succeed(self, value: &T) {
        if let Some(f) = self.on_success {
            f(value);
        }
    }

    fn fail(self, error: &TransportError) {
        if let Some(f) = self.on_error {
            f(error);
        }
    }
}

struct Inner {
    api: Arc<dyn TaskApi>,
    observer: Arc<dyn SyncObserver>,
    cache: Mutex<QueryCache<QueryKey, Vec<Task>>>,
    active: AtomicBool,
    creating: AtomicUsize,
    updating: AtomicUsize,
    deleting: AtomicUsize,
}

impl Inner {
    fn lock_cache(&self) -> MutexGuard<'_, QueryCache<QueryKey, Vec<Task>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Counts a mutation as in flight until dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A `tasks` fetch registered with the cache. Dropping it unresolved
/// releases the loading flag.
struct PendingFetch<'a> {
    inner: &'a Inner,
    generation: u64,
    resolved: bool,
}

impl<'a> PendingFetch<'a> {
    fn begin(inner: &'a Inner) -> Self {
        let generation = inner.lock_cache().begin_fetch(QueryKey::Tasks);
        Self {
            inner,
            generation,
            resolved: false,
        }
    }

    /// Returns false when the list was invalidated while this fetch was
    /// in flight and the result was dropped.
    fn resolve(mut self, result: Result<Vec<Task>, TransportError>) -> bool {
        self.resolved = true;
        self.inner
            .lock_cache()
            .resolve(QueryKey::Tasks, self.generation, result)
    }
}

impl Drop for PendingFetch<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.inner.lock_cache().abandon_fetch(&QueryKey::Tasks);
        }
    }
}

/// Shared handle over the cached task list. Clones share the same cache.
#[derive(Clone)]
pub struct TaskSync {
    inner: Arc<Inner>,
}

impl TaskSync {
    pub fn new(api: Arc<dyn TaskApi>) -> Self {
        Self::with_observer(api, Arc::new(TracingObserver))
    }

    pub fn with_observer(api: Arc<dyn TaskApi>, observer: Arc<dyn SyncObserver>) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                observer,
                cache: Mutex::new(QueryCache::new()),
                active: AtomicBool::new(false),
                creating: AtomicUsize::new(0),
                updating: AtomicUsize::new(0),
                deleting: AtomicUsize::new(0),
            }),
        }
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self::new(Arc::new(HttpTaskApi::new(config)))
    }

    /// Current state without touching the network.
    pub fn snapshot(&self) -> TaskListState {
        let cache = self.inner.lock_cache();
        let entry = cache.get(&QueryKey::Tasks);

        TaskListState {
            tasks: entry.and_then(|e| e.data.clone()).unwrap_or_default(),
            is_loading: entry.is_some_and(QueryEntry::is_fetching),
            error: entry.and_then(|e| e.error.clone()),
            is_creating: self.is_creating(),
            is_updating: self.is_updating(),
            is_deleting: self.is_deleting(),
        }
    }

    /// Reads the list, fetching it first if it was never loaded or has
    /// been invalidated. Fetch failures land in [`TaskListState::error`].
    pub async fn tasks(&self) -> TaskListState {
        self.inner.active.store(true, Ordering::SeqCst);
        let needs_fetch = self.inner.lock_cache().needs_fetch(&QueryKey::Tasks);
        if needs_fetch {
            // The outcome is recorded in the cache.
            let _ = self.fetch().await;
        }
        self.snapshot()
    }

    /// Fetches the list regardless of staleness.
    pub async fn refetch(&self) -> Result<Vec<Task>, TransportError> {
        self.inner.active.store(true, Ordering::SeqCst);
        self.fetch().await
    }

    /// Marks the list stale and re-fetches it if it has been read.
    pub async fn invalidate(&self) {
        self.inner.lock_cache().invalidate(&QueryKey::Tasks);
        self.inner.observer.invalidated(QueryKey::Tasks);

        if self.inner.active.load(Ordering::SeqCst) {
            let _ = self.fetch().await;
        }
    }

    pub async fn create_task(
        &self,
        request: CreateTaskRequest,
        callbacks: MutationCallbacks<Task>,
    ) -> Result<Task, TransportError> {
        self.mutate(
            MutationKind::Create,
            &self.inner.creating,
            self.inner.api.create(&request),
            callbacks,
        )
        .await
    }

    pub async fn update_task(
        &self,
        update: TaskUpdate,
        callbacks: MutationCallbacks<Task>,
    ) -> Result<Task, TransportError> {
        self.mutate(
            MutationKind::Update,
            &self.inner.updating,
            self.inner.api.update(&update.id, &update.updates),
            callbacks,
        )
        .await
    }

    pub async fn delete_task(
        &self,
        id: TaskId,
        callbacks: MutationCallbacks<()>,
    ) -> Result<(), TransportError> {
        self.mutate(
            MutationKind::Delete,
            &self.inner.deleting,
            self.inner.api.delete(&id),
            callbacks,
        )
        .await
    }

    /// Sets the completion state and nothing else.
    pub async fn toggle_complete(
        &self,
        id: TaskId,
        status: TaskStatus,
        callbacks: MutationCallbacks<Task>,
    ) -> Result<Task, TransportError> {
        let update = TaskUpdate {
            id,
            updates: UpdateTaskRequest::status_only(status),
        };
        self.update_task(update, callbacks).await
    }

    pub fn is_creating(&self) -> bool {
        self.inner.creating.load(Ordering::SeqCst) > 0
    }

    pub fn is_updating(&self) -> bool {
        self.inner.updating.load(Ordering::SeqCst) > 0
    }

    pub fn is_deleting(&self) -> bool {
        self.inner.deleting.load(Ordering::SeqCst) > 0
    }

    async fn fetch(&self) -> Result<Vec<Task>, TransportError> {
        let pending = PendingFetch::begin(&self.inner);
        self.inner.observer.fetch_started();

        let result = self.inner.api.list().await;
        match &result {
            Ok(tasks) => self.inner.observer.fetch_succeeded(tasks.len()),
            Err(err) => self.inner.observer.fetch_failed(err),
        }

        if !pending.resolve(result.clone()) {
            debug!(target: "client::sync", "dropped task list fetched before invalidation");
        }
        result
    }

    async fn mutate<T, F>(
        &self,
        kind: MutationKind,
        counter: &AtomicUsize,
        call: F,
        callbacks: MutationCallbacks<T>,
    ) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        let in_flight = InFlight::enter(counter);
        self.inner.observer.mutation_started(kind);

        match call.await {
            Ok(value) => {
                self.inner.observer.mutation_succeeded(kind);
                self.invalidate().await;
                drop(in_flight);
                callbacks.succeed(&value);
                Ok(value)
            }
            Err(err) => {
                self.inner.observer.mutation_failed(kind, &err);
                drop(in_flight);
                callbacks.fail(&err);
                Err(err)
            }
        }
    }
}
