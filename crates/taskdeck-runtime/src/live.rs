//! Subscribe-and-refetch lists.
//!
//! A [`LiveList`] owns one fetch closure and, optionally, one realtime
//! subscription. Each change notice or [`LiveList::refresh`] call starts a new
//! fetch that replaces any fetch still in flight. Notices carry no data; they
//! only say "look again".
//!
//! ```text
//! notice ─┐
//!         ├──► gen += 1 ──► fetch() ──► watch::Sender<LiveState<T>>
//! refresh ┘        (previous fetch dropped)
//! ```
//!
//! Dropping the list aborts its task, which drops the subscription and
//! deregisters it from the backend.

use crate::backend::{ChangeFilter, ChangeNotice, RealtimeBackend, Subscription};
use crate::error::ServiceError;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Fetch<T> = Pin<Box<dyn Future<Output = Result<Vec<T>, ServiceError>> + Send>>;

/// Opens a change subscription for a live list.
///
/// Returns `None` when the backend cannot deliver changes; the list then
/// re-fetches only when asked.
pub fn watch_changes<R>(
    realtime: &R,
    topic: &str,
    filter: ChangeFilter,
) -> Option<Subscription<ChangeNotice>>
where
    R: RealtimeBackend + ?Sized,
{
    match realtime.subscribe_changes(topic, filter) {
        Ok(subscription) => Some(subscription),
        Err(e) => {
            warn!(topic, error = %e, "realtime unavailable, list refreshes on demand only");
            None
        }
    }
}

/// Published state of a live list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    /// Error from the latest fetch. Items from the previous success are kept.
    pub error: Option<ServiceError>,
    pub generation: u64,
}

impl<T> LiveState<T> {
    fn initial() -> Self {
        Self {
            items: Vec::new(),
            loading: true,
            error: None,
            generation: 1,
        }
    }
}

/// A list kept current by re-fetching on change notices.
pub struct LiveList<T> {
    state_rx: watch::Receiver<LiveState<T>>,
    refresh_tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl<T> LiveList<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Starts the list with an initial fetch.
    ///
    /// With `changes = None` the list only re-fetches on [`refresh`](Self::refresh).
    pub fn spawn<F, Fut>(fetch: F, changes: Option<Subscription<ChangeNotice>>) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, ServiceError>> + Send + 'static,
    {
        let (state_tx, state_rx) = watch::channel(LiveState::initial());
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(fetch, changes, refresh_rx, state_tx));
        Self {
            state_rx,
            refresh_tx,
            task,
        }
    }

    #[must_use]
    pub fn state(&self) -> LiveState<T> {
        self.state_rx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LiveState<T>> {
        self.state_rx.clone()
    }

    /// Requests a re-fetch.
    pub fn refresh(&self) {
        if self.refresh_tx.send(()).is_err() {
            debug!("live list task is gone, refresh ignored");
        }
    }

    /// Waits for the first settled state.
    pub async fn ready(&self) -> LiveState<T> {
        self.settled_after(0).await
    }

    /// Waits for a settled state newer than `generation`.
    pub async fn settled_after(&self, generation: u64) -> LiveState<T> {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|s| !s.loading && s.generation > generation)
            .await
            .map(|state| state.clone());
        match settled {
            Ok(state) => state,
            Err(_) => rx.borrow().clone(),
        }
    }
}

impl<T> Drop for LiveList<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<T, F, Fut>(
    fetch: F,
    changes: Option<Subscription<ChangeNotice>>,
    mut refresh_rx: mpsc::UnboundedReceiver<()>,
    state_tx: watch::Sender<LiveState<T>>,
) where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>, ServiceError>> + Send + 'static,
{
    let mut generation: u64 = 1;
    let mut pending: Option<Fetch<T>> = Some(Box::pin(fetch()));
    let mut changes_open = changes.is_some();
    let mut changes = changes.unwrap_or_else(Subscription::closed);

    loop {
        let restart = tokio::select! {
            notice = changes.recv(), if changes_open => match notice {
                Some(notice) => {
                    debug!(table = %notice.table, kind = ?notice.kind, "change notice");
                    true
                }
                None => {
                    changes_open = false;
                    false
                }
            },
            cmd = refresh_rx.recv() => match cmd {
                Some(()) => true,
                None => break,
            },
            result = next_fetch(&mut pending) => {
                pending = None;
                state_tx.send_modify(|state| {
                    state.loading = false;
                    state.generation = generation;
                    match result {
                        Ok(items) => {
                            debug!(generation, count = items.len(), "live list fetched");
                            state.items = items;
                            state.error = None;
                        }
                        Err(e) => {
                            debug!(generation, error = %e, "live list fetch failed");
                            state.error = Some(e);
                        }
                    }
                });
                false
            }
        };

        if restart {
            generation += 1;
            debug!(generation, superseded = pending.is_some(), "live list re-fetch");
            state_tx.send_modify(|state| {
                state.loading = true;
                state.generation = generation;
            });
            pending = Some(Box::pin(fetch()));
        }
    }
}

async fn next_fetch<T>(pending: &mut Option<Fetch<T>>) -> Result<Vec<T>, ServiceError> {
    match pending.as_mut() {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChangeKind, Listeners, Table};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counter_list(calls: Arc<AtomicU32>) -> impl Fn() -> Fetch<u32> + Send + 'static {
        move || {
            let calls = Arc::clone(&calls);
            Box::pin(async move { Ok(vec![calls.fetch_add(1, Ordering::SeqCst) + 1]) })
        }
    }

    #[tokio::test]
    async fn initial_fetch_settles() {
        let calls = Arc::new(AtomicU32::new(0));
        let list = LiveList::spawn(counter_list(Arc::clone(&calls)), None);
        let state = list.ready().await;
        assert_eq!(state.items, vec![1]);
        assert!(state.error.is_none());
        assert_eq!(state.generation, 1);
    }

    #[tokio::test]
    async fn notice_triggers_refetch() {
        let calls = Arc::new(AtomicU32::new(0));
        let listeners: Listeners<ChangeNotice> = Listeners::new();
        let list = LiveList::spawn(counter_list(Arc::clone(&calls)), Some(listeners.subscribe()));
        let first = list.ready().await;

        listeners.emit(&ChangeNotice {
            table: Table::Projects,
            kind: ChangeKind::Insert,
            record: json!({}),
        });
        let state = list.settled_after(first.generation).await;
        assert_eq!(state.items, vec![2]);
    }

    #[tokio::test]
    async fn error_keeps_previous_items() {
        let fail = Arc::new(AtomicU32::new(0));
        let flag = Arc::clone(&fail);
        let list = LiveList::spawn(
            move || {
                let flag = Arc::clone(&flag);
                async move {
                    if flag.load(Ordering::SeqCst) == 0 {
                        Ok(vec!["a"])
                    } else {
                        Err(ServiceError::Validation("boom".into()))
                    }
                }
            },
            None,
        );
        let first = list.ready().await;
        fail.store(1, Ordering::SeqCst);
        list.refresh();
        let state = list.settled_after(first.generation).await;
        assert_eq!(state.items, vec!["a"]);
        assert_eq!(state.error, Some(ServiceError::Validation("boom".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_supersedes_slow_fetch() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let list = LiveList::spawn(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    // The second fetch is slow and gets replaced by the third.
                    if n == 2 {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                    }
                    Ok(vec![n])
                }
            },
            None,
        );
        let first = list.ready().await;
        list.refresh();
        tokio::task::yield_now().await;
        list.refresh();
        let state = list.settled_after(first.generation).await;
        assert_eq!(state.items, vec![3]);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(list.state().items, vec![3]);
    }

    struct NoRealtime;

    impl RealtimeBackend for NoRealtime {
        fn subscribe_changes(
            &self,
            _topic: &str,
            _filter: ChangeFilter,
        ) -> Result<Subscription<ChangeNotice>, crate::error::BackendError> {
            Err(crate::error::BackendError::Unsupported("realtime subscriptions"))
        }
    }

    #[tokio::test]
    async fn unsupported_realtime_falls_back_to_refresh() {
        assert!(watch_changes(&NoRealtime, "projects", ChangeFilter::table(Table::Projects)).is_none());

        let calls = Arc::new(AtomicU32::new(0));
        let list = LiveList::spawn(counter_list(Arc::clone(&calls)), None);
        let first = list.ready().await;
        list.refresh();
        assert_eq!(list.settled_after(first.generation).await.items, vec![2]);
    }

    #[tokio::test]
    async fn drop_unsubscribes() {
        let listeners: Listeners<ChangeNotice> = Listeners::new();
        let list = LiveList::spawn(|| async { Ok(Vec::<u8>::new()) }, Some(listeners.subscribe()));
        list.ready().await;
        assert_eq!(listeners.len(), 1);

        drop(list);
        for _ in 0..100 {
            if listeners.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(listeners.is_empty());
    }
}
