//! Task list controller: keeps the rendered page in step with the URL query.
//!
//! Every query change bumps a generation counter, cancels the fetch started
//! for the previous generation and spawns a new one. A completion is applied
//! only if its generation is still current, so a slow response for an old
//! query can never overwrite the page for a newer one.

use std::{num::NonZeroU32, sync::Arc};

use shared::{
    domain::{SortColumn, TaskStatus, UserId},
    protocol::{TaskPage, TaskSummary},
};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    api::TaskApi,
    error::ClientError,
    location::QueryStore,
    notify::{LogNotifier, Notifier},
    pagination::Pagination,
    query_state::QueryState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Ready,
    // `page` keeps the last good one, if any.
    Failed,
}

#[derive(Debug, Clone)]
pub enum ListEvent {
    Loading {
        generation: u64,
        query: QueryState,
    },
    Loaded {
        generation: u64,
        query: QueryState,
        page: Arc<TaskPage>,
    },
    FetchFailed {
        generation: u64,
        query: QueryState,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct ListSnapshot {
    pub query: QueryState,
    pub status: LoadStatus,
    /// Last successfully fetched page. Only matches `query` when `status` is `Ready`.
    pub page: Option<Arc<TaskPage>>,
    pub last_error: Option<String>,
}

impl ListSnapshot {
    /// True until a page has been loaded for the current query.
    pub fn is_loading(&self) -> bool {
        matches!(self.status, LoadStatus::Idle | LoadStatus::Loading)
    }

    pub fn rows(&self) -> &[TaskSummary] {
        self.page
            .as_deref()
            .map(|page| page.tasks.as_slice())
            .unwrap_or_default()
    }

    pub fn total_count(&self) -> u64 {
        self.page.as_deref().map_or(0, |page| page.task_count)
    }

    pub fn pagination(&self, page_size: u32) -> Pagination {
        Pagination::new(self.total_count(), page_size, self.query.page())
    }
}

struct ControllerState {
    query: QueryState,
    generation: u64,
    status: LoadStatus,
    page: Option<Arc<TaskPage>>,
    last_error: Option<String>,
    inflight: Option<CancellationToken>,
}

pub struct TaskListController {
    user_id: UserId,
    api: Arc<dyn TaskApi>,
    location: Arc<dyn QueryStore>,
    notifier: Arc<dyn Notifier>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ListEvent>,
}

impl TaskListController {
    pub fn new(
        user_id: UserId,
        api: Arc<dyn TaskApi>,
        location: Arc<dyn QueryStore>,
    ) -> Arc<Self> {
        Self::new_with_notifier(user_id, api, location, Arc::new(LogNotifier))
    }

    pub fn new_with_notifier(
        user_id: UserId,
        api: Arc<dyn TaskApi>,
        location: Arc<dyn QueryStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        let query = QueryState::parse(&location.read());
        Arc::new(Self {
            user_id,
            api,
            location,
            notifier,
            inner: Mutex::new(ControllerState {
                query,
                generation: 0,
                status: LoadStatus::Idle,
                page: None,
                last_error: None,
                inflight: None,
            }),
            events,
        })
    }

    /// Reads the URL and fetches the first page for it.
    pub async fn start(self: &Arc<Self>) {
        let mut guard = self.inner.lock().await;
        guard.query = QueryState::parse(&self.location.read());
        info!(user_id = %self.user_id, query = %guard.query, "task list started");
        self.begin_fetch(&mut guard);
    }

    pub async fn set_status_filter(self: &Arc<Self>, status: Option<TaskStatus>) -> QueryState {
        self.update_query(|query| query.with_status(status)).await
    }

    pub async fn set_sort_column(self: &Arc<Self>, column: SortColumn) -> QueryState {
        self.update_query(|query| query.with_sort_column(column)).await
    }

    pub async fn set_page(self: &Arc<Self>, page: NonZeroU32) -> QueryState {
        self.update_query(|query| query.with_page(page)).await
    }

    /// Fetches the current query again, e.g. after a task was created or edited.
    pub async fn refresh(self: &Arc<Self>) {
        let mut guard = self.inner.lock().await;
        self.begin_fetch(&mut guard);
    }

    /// Re-reads the URL after back/forward navigation. Fetches only when the
    /// query actually changed; the URL is not written back.
    pub async fn sync_from_location(self: &Arc<Self>) -> QueryState {
        let mut guard = self.inner.lock().await;
        let next = QueryState::parse(&self.location.read());
        if next != guard.query || guard.status == LoadStatus::Idle {
            debug!(from = %guard.query, to = %next, "query changed by navigation");
            guard.query = next;
            self.begin_fetch(&mut guard);
        }
        guard.query.clone()
    }

    pub async fn query(&self) -> QueryState {
        self.inner.lock().await.query.clone()
    }

    pub async fn snapshot(&self) -> ListSnapshot {
        let guard = self.inner.lock().await;
        ListSnapshot {
            query: guard.query.clone(),
            status: guard.status,
            page: guard.page.clone(),
            last_error: guard.last_error.clone(),
        }
    }

    pub async fn settled(&self) -> ListSnapshot {
        let mut events = self.events.subscribe();
        loop {
            let snapshot = self.snapshot().await;
            if snapshot.status != LoadStatus::Loading {
                return snapshot;
            }
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return self.snapshot().await,
            }
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    async fn update_query(
        self: &Arc<Self>,
        change: impl FnOnce(&QueryState) -> QueryState,
    ) -> QueryState {
        let mut guard = self.inner.lock().await;
        let next = change(&guard.query);
        if next == guard.query {
            debug!(query = %next, "query unchanged; skipping fetch");
            return next;
        }
        self.location.write(&next.to_query_string());
        guard.query = next.clone();
        self.begin_fetch(&mut guard);
        next
    }

    fn begin_fetch(self: &Arc<Self>, state: &mut ControllerState) {
        if let Some(previous) = state.inflight.take() {
            previous.cancel();
        }
        state.generation += 1;
        state.status = LoadStatus::Loading;

        let generation = state.generation;
        let query = state.query.clone();
        let cancel = CancellationToken::new();
        state.inflight = Some(cancel.clone());

        debug!(generation, query = %query, "queued task fetch");
        let _ = self.events.send(ListEvent::Loading {
            generation,
            query: query.clone(),
        });

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(generation, "task fetch cancelled");
                    return;
                }
                outcome = controller.api.fetch_tasks(&controller.user_id, &query) => outcome,
            };
            controller.complete_fetch(generation, query, outcome).await;
        });
    }

    async fn complete_fetch(
        &self,
        generation: u64,
        query: QueryState,
        outcome: Result<TaskPage, ClientError>,
    ) {
        let failure = {
            let mut guard = self.inner.lock().await;
            if generation != guard.generation {
                debug!(
                    generation,
                    current = guard.generation,
                    "discarding result for superseded query"
                );
                return;
            }
            guard.inflight = None;

            match outcome {
                Ok(page) => {
                    let page = Arc::new(page);
                    debug!(
                        generation,
                        rows = page.tasks.len(),
                        total = page.task_count,
                        "task page loaded"
                    );
                    guard.status = LoadStatus::Ready;
                    guard.page = Some(Arc::clone(&page));
                    guard.last_error = None;
                    let _ = self.events.send(ListEvent::Loaded {
                        generation,
                        query,
                        page,
                    });
                    None
                }
                Err(err) => {
                    let message = err.user_message();
                    warn!(generation, query = %query, error = %err, "task fetch failed");
                    guard.status = LoadStatus::Failed;
                    guard.last_error = Some(message.clone());
                    let _ = self.events.send(ListEvent::FetchFailed {
                        generation,
                        query,
                        message: message.clone(),
                    });
                    Some(message)
                }
            }
        };

        if let Some(message) = failure {
            self.notifier.error(&message);
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
