//! Client-side synchronization for a remote task API.
//!
//! [`HttpTaskApi`] speaks the REST contract. [`TaskSync`] wraps any
//! [`TaskApi`] with a query cache that is invalidated and re-fetched after
//! every successful mutation.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod observer;
pub mod sync;

pub use api::{HttpTaskApi, TaskApi};
pub use cache::{QueryCache, QueryEntry, QueryKey};
pub use config::ClientConfig;
pub use error::{ConfigError, Operation, TransportError, TransportErrorKind};
pub use observer::{MutationKind, SyncObserver, TracingObserver};
pub use sync::{MutationCallbacks, TaskListState, TaskSync, TaskUpdate};

pub use shared::{CreateTaskRequest, Task, TaskId, TaskStatus, UpdateTaskRequest};
