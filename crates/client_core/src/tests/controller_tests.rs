use super::*;
use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    domain::{Priority, TaskId},
    protocol::{NewTask, Task, TaskUpdate},
};
use tokio::{sync::oneshot, time::timeout};

use crate::location::MemoryLocation;

enum Reply {
    Page(TaskPage),
    Fail(u16, &'static str),
    Gate(oneshot::Receiver<TaskPage>),
}

/// Answers fetches from a per-query queue of replies; an empty queue never answers.
#[derive(Default)]
struct ScriptedTaskApi {
    calls: Mutex<Vec<String>>,
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
}

impl ScriptedTaskApi {
    async fn script(&self, query: &str, reply: Reply) {
        self.replies
            .lock()
            .await
            .entry(query.to_string())
            .or_default()
            .push_back(reply);
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl TaskApi for ScriptedTaskApi {
    async fn fetch_tasks(
        &self,
        _user_id: &UserId,
        query: &QueryState,
    ) -> Result<TaskPage, ClientError> {
        let key = query.to_query_string();
        self.calls.lock().await.push(key.clone());
        let reply = self
            .replies
            .lock()
            .await
            .get_mut(&key)
            .and_then(VecDeque::pop_front);

        match reply {
            Some(Reply::Page(page)) => Ok(page),
            Some(Reply::Fail(status, message)) => Err(ClientError::server(status, message)),
            Some(Reply::Gate(rx)) => rx.await.map_err(|_| ClientError::server(499, "gate dropped")),
            None => std::future::pending().await,
        }
    }

    async fn get_task(&self, _task_id: &TaskId) -> Result<Task, ClientError> {
        Err(ClientError::Validation(vec!["not scripted".into()]))
    }

    async fn create_task(&self, _task: &NewTask) -> Result<TaskId, ClientError> {
        Err(ClientError::Validation(vec!["not scripted".into()]))
    }

    async fn update_task(
        &self,
        _task_id: &TaskId,
        _update: &TaskUpdate,
    ) -> Result<(), ClientError> {
        Err(ClientError::Validation(vec!["not scripted".into()]))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    errors: std::sync::Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("notifier lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, _message: &str) {}

    fn error(&self, message: &str) {
        self.errors
            .lock()
            .expect("notifier lock")
            .push(message.to_string());
    }
}

fn page_of(names: &[&str], task_count: u64) -> TaskPage {
    let created_at: DateTime<Utc> = "2024-06-01T10:00:00Z".parse().expect("timestamp");
    TaskPage {
        tasks: names
            .iter()
            .enumerate()
            .map(|(i, name)| TaskSummary {
                id: TaskId::new(format!("t-{i}")),
                name: name.to_string(),
                priority: Priority::Urgent,
                category: None,
                status: TaskStatus::Open,
                due: None,
                created_at,
            })
            .collect(),
        task_count,
    }
}

struct Harness {
    api: Arc<ScriptedTaskApi>,
    location: Arc<MemoryLocation>,
    notifier: Arc<RecordingNotifier>,
    controller: Arc<TaskListController>,
}

fn harness(initial_query: &str) -> Harness {
    let api = Arc::new(ScriptedTaskApi::default());
    let location = Arc::new(MemoryLocation::with_query(initial_query));
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = TaskListController::new_with_notifier(
        UserId::new("u-1"),
        api.clone(),
        location.clone(),
        notifier.clone(),
    );
    Harness {
        api,
        location,
        notifier,
        controller,
    }
}

async fn settled(controller: &TaskListController) -> ListSnapshot {
    timeout(Duration::from_secs(2), controller.settled())
        .await
        .expect("controller settles")
}

fn page(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).expect("non-zero page")
}

#[tokio::test]
async fn start_fetches_page_for_url_query() {
    let h = harness("?status=open&page=2");
    h.api
        .script("status=open&page=2", Reply::Page(page_of(&["a", "b"], 6)))
        .await;

    h.controller.start().await;
    let snapshot = settled(&h.controller).await;

    assert_eq!(snapshot.status, LoadStatus::Ready);
    assert_eq!(snapshot.rows().len(), 2);
    assert_eq!(snapshot.total_count(), 6);
    assert_eq!(snapshot.query.status(), Some(TaskStatus::Open));
    assert_eq!(h.api.calls().await, vec!["status=open&page=2"]);
}

#[tokio::test]
async fn reports_loading_until_first_page_arrives() {
    let h = harness("");
    let (tx, rx) = oneshot::channel();
    h.api.script("", Reply::Gate(rx)).await;

    assert_eq!(h.controller.snapshot().await.status, LoadStatus::Idle);
    h.controller.start().await;
    let loading = h.controller.snapshot().await;
    assert!(loading.is_loading());
    assert!(loading.rows().is_empty());

    tx.send(page_of(&["first"], 1)).expect("release fetch");
    let snapshot = settled(&h.controller).await;
    assert!(!snapshot.is_loading());
    assert_eq!(snapshot.rows()[0].name, "first");
}

#[tokio::test]
async fn sorting_same_column_twice_toggles_direction_and_mirrors_url() {
    let h = harness("");
    h.api.script("", Reply::Page(page_of(&[], 0))).await;
    h.api
        .script(
            "orderBy=priority&sortDirection=asc",
            Reply::Page(page_of(&["asc"], 1)),
        )
        .await;
    h.api
        .script(
            "orderBy=priority&sortDirection=desc",
            Reply::Page(page_of(&["desc"], 1)),
        )
        .await;
    h.controller.start().await;
    settled(&h.controller).await;

    let first = h.controller.set_sort_column(SortColumn::Priority).await;
    assert_eq!(first.to_query_string(), "orderBy=priority&sortDirection=asc");
    assert_eq!(h.location.read(), "orderBy=priority&sortDirection=asc");
    settled(&h.controller).await;

    let second = h.controller.set_sort_column(SortColumn::Priority).await;
    assert_eq!(second.to_query_string(), "orderBy=priority&sortDirection=desc");
    assert_eq!(h.location.read(), "orderBy=priority&sortDirection=desc");

    let snapshot = settled(&h.controller).await;
    assert_eq!(snapshot.rows()[0].name, "desc");
    assert_eq!(h.location.history_len(), 3);

    let third = h.controller.set_sort_column(SortColumn::Priority).await;
    assert_eq!(third.to_query_string(), "orderBy=priority&sortDirection=asc");
}

#[tokio::test]
async fn sorting_keeps_the_current_page() {
    let h = harness("page=3");
    let query = h.controller.set_sort_column(SortColumn::Name).await;
    assert_eq!(query.page(), 3);
    assert_eq!(h.location.read(), "orderBy=name&sortDirection=asc&page=3");
}

#[tokio::test]
async fn clearing_status_filter_removes_key_from_url() {
    let h = harness("status=done&page=2");
    h.api
        .script("status=done&page=2", Reply::Page(page_of(&["done"], 1)))
        .await;
    h.api.script("page=2", Reply::Page(page_of(&["any"], 5))).await;
    h.controller.start().await;
    settled(&h.controller).await;

    h.controller.set_status_filter(None).await;
    settled(&h.controller).await;

    assert_eq!(h.location.read(), "page=2");
    assert_eq!(h.api.calls().await, vec!["status=done&page=2", "page=2"]);
}

#[tokio::test]
async fn unchanged_query_does_not_refetch_or_touch_url() {
    let h = harness("status=open");
    h.api
        .script("status=open", Reply::Page(page_of(&["a"], 1)))
        .await;
    h.controller.start().await;
    settled(&h.controller).await;

    h.controller.set_status_filter(Some(TaskStatus::Open)).await;
    let snapshot = settled(&h.controller).await;

    assert_eq!(snapshot.status, LoadStatus::Ready);
    assert_eq!(h.api.calls().await.len(), 1);
    assert_eq!(h.location.history_len(), 1);
}

#[tokio::test]
async fn out_of_range_page_is_sent_to_server_unchanged() {
    let h = harness("");
    h.api.script("", Reply::Page(page_of(&["a"], 9))).await;
    h.api.script("page=50", Reply::Page(page_of(&[], 9))).await;
    h.controller.start().await;
    settled(&h.controller).await;

    h.controller.set_page(page(50)).await;
    let snapshot = settled(&h.controller).await;

    assert_eq!(h.api.calls().await, vec!["", "page=50"]);
    assert_eq!(snapshot.query.page(), 50);
    assert!(snapshot.rows().is_empty());
    assert!(snapshot.pagination(4).is_out_of_range());
}

#[tokio::test]
async fn malformed_page_in_url_reads_as_first_page() {
    let h = harness("page=abc");
    h.api.script("", Reply::Page(page_of(&["a"], 1))).await;

    h.controller.start().await;
    let snapshot = settled(&h.controller).await;

    assert_eq!(snapshot.query.page(), 1);
    assert_eq!(snapshot.status, LoadStatus::Ready);
    assert_eq!(h.api.calls().await, vec![""]);
}

#[tokio::test]
async fn latest_query_wins_when_older_response_arrives_late() {
    let h = harness("");
    h.api.script("", Reply::Page(page_of(&["initial"], 1))).await;
    let (a_tx, a_rx) = oneshot::channel();
    let (b_tx, b_rx) = oneshot::channel();
    h.api
        .script("orderBy=name&sortDirection=asc", Reply::Gate(a_rx))
        .await;
    h.api
        .script(
            "status=done&orderBy=name&sortDirection=asc",
            Reply::Gate(b_rx),
        )
        .await;
    h.controller.start().await;
    settled(&h.controller).await;

    h.controller.set_sort_column(SortColumn::Name).await;
    tokio::task::yield_now().await;
    h.controller.set_status_filter(Some(TaskStatus::Done)).await;

    b_tx.send(page_of(&["from B"], 1)).expect("release B");
    let snapshot = settled(&h.controller).await;
    assert_eq!(snapshot.rows()[0].name, "from B");

    let _ = a_tx.send(page_of(&["from A"], 1));
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.status, LoadStatus::Ready);
    assert_eq!(snapshot.rows()[0].name, "from B");
    assert_eq!(
        snapshot.query.to_query_string(),
        "status=done&orderBy=name&sortDirection=asc"
    );
}

#[tokio::test]
async fn completion_for_superseded_generation_is_discarded() {
    let h = harness("");
    h.controller.start().await;
    let first_query = h.controller.query().await;
    h.controller.set_sort_column(SortColumn::Due).await;
    let second_query = h.controller.query().await;

    h.controller
        .complete_fetch(1, first_query, Ok(page_of(&["stale"], 1)))
        .await;
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.status, LoadStatus::Loading);
    assert!(snapshot.page.is_none());

    h.controller
        .complete_fetch(2, second_query, Ok(page_of(&["fresh"], 1)))
        .await;
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.status, LoadStatus::Ready);
    assert_eq!(snapshot.rows()[0].name, "fresh");
}

#[tokio::test]
async fn failed_fetch_keeps_last_good_page_and_notifies() {
    let h = harness("");
    h.api.script("", Reply::Page(page_of(&["kept"], 1))).await;
    h.api
        .script("status=done", Reply::Fail(500, "Database unavailable"))
        .await;
    h.controller.start().await;
    settled(&h.controller).await;

    h.controller.set_status_filter(Some(TaskStatus::Done)).await;
    let snapshot = settled(&h.controller).await;

    assert_eq!(snapshot.status, LoadStatus::Failed);
    assert_eq!(snapshot.rows()[0].name, "kept");
    assert_eq!(snapshot.last_error.as_deref(), Some("Database unavailable"));
    assert_eq!(h.notifier.errors(), vec!["Database unavailable"]);
    assert_eq!(h.api.calls().await.len(), 2);
}

#[tokio::test]
async fn failed_first_fetch_leaves_empty_view() {
    let h = harness("");
    h.api.script("", Reply::Fail(401, "Unauthorized")).await;

    h.controller.start().await;
    let snapshot = settled(&h.controller).await;

    assert_eq!(snapshot.status, LoadStatus::Failed);
    assert!(snapshot.rows().is_empty());
    assert_eq!(snapshot.total_count(), 0);
    assert_eq!(h.notifier.errors(), vec!["Unauthorized"]);
}

#[tokio::test]
async fn back_navigation_restores_previous_view() {
    let h = harness("");
    h.api.script("", Reply::Page(page_of(&["all"], 1))).await;
    h.api.script("", Reply::Page(page_of(&["all again"], 1))).await;
    h.api
        .script(
            "orderBy=name&sortDirection=asc",
            Reply::Page(page_of(&["sorted"], 1)),
        )
        .await;
    h.controller.start().await;
    settled(&h.controller).await;
    h.controller.set_sort_column(SortColumn::Name).await;
    settled(&h.controller).await;

    assert!(h.location.back());
    let query = h.controller.sync_from_location().await;
    assert!(query.is_empty());
    let snapshot = settled(&h.controller).await;
    assert_eq!(snapshot.rows()[0].name, "all again");

    h.controller.sync_from_location().await;
    assert_eq!(h.api.calls().await.len(), 3);
}

#[tokio::test]
async fn refresh_refetches_current_query() {
    let h = harness("status=open");
    h.api
        .script("status=open", Reply::Page(page_of(&["before"], 1)))
        .await;
    h.api
        .script("status=open", Reply::Page(page_of(&["before", "after"], 2)))
        .await;
    h.controller.start().await;
    settled(&h.controller).await;

    h.controller.refresh().await;
    let snapshot = settled(&h.controller).await;

    assert_eq!(snapshot.total_count(), 2);
    assert_eq!(h.api.calls().await, vec!["status=open", "status=open"]);
}

#[tokio::test]
async fn emits_loading_then_loaded_events() {
    let h = harness("");
    h.api.script("", Reply::Page(page_of(&["a"], 1))).await;
    let mut events = h.controller.subscribe_events();

    h.controller.start().await;

    let first = timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("event")
        .expect("open channel");
    assert!(matches!(first, ListEvent::Loading { generation: 1, .. }));

    let second = timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("event")
        .expect("open channel");
    match second {
        ListEvent::Loaded {
            generation, page, ..
        } => {
            assert_eq!(generation, 1);
            assert_eq!(page.task_count, 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
