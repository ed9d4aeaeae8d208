//! Client side of the task manager: the URL-driven task list and the REST API it reads.

pub mod api;
pub mod controller;
pub mod error;
pub mod location;
pub mod notify;
pub mod pagination;
pub mod query_state;

pub use api::{HttpClientOptions, HttpTaskClient, ProfileApi, TaskApi};
pub use controller::{ListEvent, ListSnapshot, LoadStatus, TaskListController};
pub use error::ClientError;
pub use location::{MemoryLocation, QueryStore};
pub use notify::{LogNotifier, Notifier};
pub use pagination::{Pagination, DEFAULT_PAGE_SIZE};
pub use query_state::QueryState;
