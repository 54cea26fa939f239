//! Single-flight query worker with request dedup, LRU cache and staleness filter.
//!
//! Board changes are turned into [`QueryQueueEntry`] values and submitted
//! here. One worker task drains the queue and is the only issuer of backend
//! queries. Identical signatures share one round trip, results are cached,
//! and the UI event stream only sees results whose position is still on the
//! board.

use std::collections::HashMap;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use posdb_core::position::{self, PositionError};
use posdb_core::{QueryCacheEntry, QueryResponse, NULL_MOVE};

use crate::cache::QueryCache;
use crate::error::{ClientError, QueryError};
use crate::eval::EvalProvider;
use crate::proxy::DatabaseProxy;

/// One board state to query. Equality and hashing use the signature only.
#[derive(Debug, Clone)]
pub struct QueryQueueEntry {
    pub query_fen: String,
    pub current_fen: String,
    pub san: String,
    pub query_eval: bool,
    signature: String,
}

impl QueryQueueEntry {
    pub fn new(query_fen: &str, current_fen: &str, san: &str, query_eval: bool) -> Self {
        let signature = format!(
            "{query_fen}${san}${}",
            if query_eval { "True" } else { "False" }
        );
        Self {
            query_fen: query_fen.to_string(),
            current_fen: current_fen.to_string(),
            san: san.to_string(),
            query_eval,
            signature,
        }
    }

    /// Board showing `fen` with no move leading to it.
    pub fn for_position(fen: &str, query_eval: bool) -> Self {
        Self::new(fen, fen, NULL_MOVE, query_eval)
    }

    /// Board reached by playing `san` from `prev_fen`.
    pub fn for_move(prev_fen: &str, san: &str, query_eval: bool) -> Result<Self, PositionError> {
        let current = position::play_san(prev_fen, san)?;
        Ok(Self::new(prev_fen, &current, san, query_eval))
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    fn san_for_query(&self) -> Option<&str> {
        (self.san != NULL_MOVE).then_some(self.san.as_str())
    }
}

impl PartialEq for QueryQueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature
    }
}

impl Eq for QueryQueueEntry {}

impl Hash for QueryQueueEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature.hash(state);
    }
}

pub type QueryOutcome = Result<Arc<QueryCacheEntry>, QueryError>;

/// Result delivered on the UI event stream.
#[derive(Debug, Clone)]
pub struct QueryEvent {
    pub entry: QueryQueueEntry,
    pub outcome: QueryOutcome,
}

/// Issuer of position queries.
pub trait QueryBackend: Send + Sync {
    fn query<'a>(
        &'a self,
        fen: &'a str,
        san: Option<&'a str>,
    ) -> BoxFuture<'a, Result<QueryResponse, ClientError>>;
}

impl QueryBackend for DatabaseProxy {
    fn query<'a>(
        &'a self,
        fen: &'a str,
        san: Option<&'a str>,
    ) -> BoxFuture<'a, Result<QueryResponse, ClientError>> {
        Box::pin(DatabaseProxy::query(self, fen, san))
    }
}

struct State {
    cache: QueryCache,
    /// Signature -> waiters. Present while the signature is queued or in flight.
    pending: HashMap<String, Vec<oneshot::Sender<QueryOutcome>>>,
    current_fen: Option<String>,
    /// Bumped by every reset; work tagged with an older value is discarded.
    generation: u64,
}

struct Shared {
    state: Mutex<State>,
    events: mpsc::UnboundedSender<QueryEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit_if_fresh(&self, state: &State, entry: &QueryQueueEntry, outcome: &QueryOutcome) {
        if state.current_fen.as_deref() == Some(entry.current_fen.as_str()) {
            let _ = self.events.send(QueryEvent {
                entry: entry.clone(),
                outcome: outcome.clone(),
            });
        } else {
            debug!(signature = entry.signature(), "Dropping stale result");
        }
    }
}

enum Submitted {
    Ready(QueryOutcome),
    Waiting(oneshot::Receiver<QueryOutcome>),
    Queued,
}

pub struct QueryScheduler {
    shared: Arc<Shared>,
    queue: mpsc::UnboundedSender<(u64, QueryQueueEntry)>,
    worker: JoinHandle<()>,
}

impl QueryScheduler {
    /// Start the worker. The receiver is the UI event stream.
    pub fn new(
        backend: Arc<dyn QueryBackend>,
        eval: Arc<dyn EvalProvider>,
        cache_size: usize,
    ) -> (Self, mpsc::UnboundedReceiver<QueryEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                cache: QueryCache::new(cache_size),
                pending: HashMap::new(),
                current_fen: None,
                generation: 0,
            }),
            events: events_tx,
        });

        let worker = tokio::spawn(run_worker(shared.clone(), backend, eval, queue_rx));

        (
            Self {
                shared,
                queue: queue_tx,
                worker,
            },
            events_rx,
        )
    }

    /// FEN currently on the board; results for other positions are not emitted.
    pub fn set_current_fen(&self, fen: &str) {
        self.shared.lock().current_fen = Some(fen.to_string());
    }

    /// Queue `entry`; the result only arrives on the event stream.
    pub fn schedule(&self, entry: QueryQueueEntry) {
        self.submit(entry, false);
    }

    /// Queue `entry` and resolve with its result. The request is registered
    /// before this returns, so concurrent calls for one signature share it.
    pub fn query(&self, entry: QueryQueueEntry) -> impl Future<Output = QueryOutcome> + Send {
        let submitted = self.submit(entry, true);
        async move {
            match submitted {
                Submitted::Ready(outcome) => outcome,
                Submitted::Waiting(rx) => rx.await.unwrap_or(Err(QueryError::Reset)),
                Submitted::Queued => Err(QueryError::Stopped),
            }
        }
    }

    fn submit(&self, entry: QueryQueueEntry, wait: bool) -> Submitted {
        let mut state = self.shared.lock();

        if let Some(cached) = state.cache.get(entry.signature()) {
            debug!(signature = entry.signature(), "Query cache hit");
            let outcome = Ok(cached);
            self.shared.emit_if_fresh(&state, &entry, &outcome);
            return Submitted::Ready(outcome);
        }

        let (tx, rx) = if wait {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let signature = entry.signature().to_string();
        let already_pending = state.pending.contains_key(&signature);
        let waiters = state.pending.entry(signature.clone()).or_default();
        waiters.extend(tx);

        if already_pending {
            debug!(signature = %signature, "Query already pending");
        } else if self.queue.send((state.generation, entry)).is_err() {
            state.pending.remove(&signature);
            return Submitted::Ready(Err(QueryError::Stopped));
        }

        match rx {
            Some(rx) => Submitted::Waiting(rx),
            None => Submitted::Queued,
        }
    }

    /// Drop queued and in-flight work and purge the cache. Waiters of dropped
    /// work resolve with [`QueryError::Reset`].
    pub fn reset(&self) {
        let mut state = self.shared.lock();
        state.generation += 1;
        state.pending.clear();
        state.cache.clear();
        debug!(generation = state.generation, "Query queue and cache reset");
    }

    pub fn cached(&self, signature: &str) -> Option<Arc<QueryCacheEntry>> {
        self.shared.lock().cache.get(signature)
    }

    pub fn is_cached(&self, signature: &str) -> bool {
        self.shared.lock().cache.contains(signature)
    }

    /// Stop accepting work and wait for the worker to drain.
    pub async fn shutdown(self) {
        drop(self.queue);
        let _ = self.worker.await;
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    backend: Arc<dyn QueryBackend>,
    eval: Arc<dyn EvalProvider>,
    mut queue: mpsc::UnboundedReceiver<(u64, QueryQueueEntry)>,
) {
    while let Some((generation, entry)) = queue.recv().await {
        if shared.lock().generation != generation {
            debug!(signature = entry.signature(), "Skipping query queued before reset");
            continue;
        }

        let outcome = execute(backend.as_ref(), eval.as_ref(), &entry).await;

        let mut state = shared.lock();
        if state.generation != generation {
            debug!(signature = entry.signature(), "Discarding result of query started before reset");
            continue;
        }

        if let Ok(cached) = &outcome {
            state
                .cache
                .insert(entry.signature().to_string(), cached.clone());
        }
        let waiters = state.pending.remove(entry.signature()).unwrap_or_default();
        shared.emit_if_fresh(&state, &entry, &outcome);
        drop(state);

        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
    debug!("Query worker stopped");
}

async fn execute(
    backend: &dyn QueryBackend,
    eval: &dyn EvalProvider,
    entry: &QueryQueueEntry,
) -> QueryOutcome {
    let stats = backend
        .query(&entry.query_fen, entry.san_for_query())
        .await
        .map_err(|e| {
            warn!(signature = entry.signature(), error = %e, "Query failed");
            QueryError::from(e)
        })?;

    let scores = if entry.query_eval {
        eval.evaluate(&entry.current_fen).await.unwrap_or_else(|e| {
            warn!(fen = %entry.current_fen, error = %e, "Evaluation unavailable");
            HashMap::new()
        })
    } else {
        HashMap::new()
    };

    Ok(Arc::new(QueryCacheEntry::new(stats, scores)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::NoEval;
    use posdb_core::STARTING_FEN;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

    /// Backend that blocks every query until the test releases a permit.
    struct GatedBackend {
        calls: AtomicUsize,
        gate: Semaphore,
        fail: bool,
    }

    impl GatedBackend {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Semaphore::new(0),
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl QueryBackend for GatedBackend {
        fn query<'a>(
            &'a self,
            fen: &'a str,
            _san: Option<&'a str>,
        ) -> BoxFuture<'a, Result<QueryResponse, ClientError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if let Ok(permit) = self.gate.acquire().await {
                    permit.forget();
                }
                if self.fail {
                    return Err(ClientError::Backend("no database open".to_string()));
                }
                Ok(serde_json::from_value(serde_json::json!({
                    "results": [{"position": {"fen": fen}}]
                }))
                .unwrap())
            })
        }
    }

    fn scheduler(
        backend: Arc<GatedBackend>,
    ) -> (QueryScheduler, mpsc::UnboundedReceiver<QueryEvent>) {
        QueryScheduler::new(backend, Arc::new(NoEval), 128)
    }

    #[test]
    fn test_signature() {
        let entry = QueryQueueEntry::for_move(STARTING_FEN, "e4", true).unwrap();
        assert_eq!(entry.signature(), format!("{STARTING_FEN}$e4$True"));
        assert_eq!(entry.current_fen, AFTER_E4);

        let root = QueryQueueEntry::for_position(STARTING_FEN, false);
        assert_eq!(root.signature(), format!("{STARTING_FEN}$--$False"));
        assert_eq!(root.san_for_query(), None);
    }

    #[test]
    fn test_equality_by_signature() {
        let a = QueryQueueEntry::new("fen", "x", "e4", false);
        let b = QueryQueueEntry::new("fen", "y", "e4", false);
        let c = QueryQueueEntry::new("fen", "x", "e4", true);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_identical_requests_share_one_round_trip() {
        let backend = GatedBackend::new(false);
        let (scheduler, mut events) = scheduler(backend.clone());
        scheduler.set_current_fen(STARTING_FEN);

        let entry = QueryQueueEntry::for_position(STARTING_FEN, false);
        let first = scheduler.query(entry.clone());
        let second = scheduler.query(entry.clone());
        scheduler.schedule(entry.clone());
        backend.gate.add_permits(10);

        let (a, b) = tokio::join!(first, second);
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(backend.calls(), 1);

        let event = events.recv().await.unwrap();
        assert_eq!(event.entry, entry);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_round_trip() {
        let backend = GatedBackend::new(false);
        backend.gate.add_permits(10);
        let (scheduler, _events) = scheduler(backend.clone());

        let entry = QueryQueueEntry::for_position(STARTING_FEN, false);
        scheduler.query(entry.clone()).await.unwrap();
        assert!(scheduler.is_cached(entry.signature()));
        scheduler.query(entry).await.unwrap();
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_result_cached_not_emitted() {
        let backend = GatedBackend::new(false);
        let (scheduler, mut events) = scheduler(backend.clone());
        scheduler.set_current_fen(STARTING_FEN);

        let entry = QueryQueueEntry::for_position(STARTING_FEN, false);
        let pending = scheduler.query(entry.clone());
        // The user navigated away before the result arrived
        scheduler.set_current_fen(AFTER_E4);
        backend.gate.add_permits(1);

        assert!(pending.await.is_ok());
        assert!(events.try_recv().is_err());
        assert!(scheduler.is_cached(entry.signature()));
    }

    #[tokio::test]
    async fn test_reset_discards_in_flight_result() {
        let backend = GatedBackend::new(false);
        let (scheduler, _events) = scheduler(backend.clone());

        let first = QueryQueueEntry::for_position(STARTING_FEN, false);
        let pending = scheduler.query(first.clone());
        scheduler.reset();
        assert_eq!(pending.await.unwrap_err(), QueryError::Reset);

        let second = QueryQueueEntry::for_position(AFTER_E4, false);
        let next = scheduler.query(second.clone());
        backend.gate.add_permits(10);
        next.await.unwrap();

        assert!(!scheduler.is_cached(first.signature()));
        assert!(scheduler.is_cached(second.signature()));
    }

    #[tokio::test]
    async fn test_failure_delivered_and_not_cached() {
        let backend = GatedBackend::new(true);
        backend.gate.add_permits(10);
        let (scheduler, mut events) = scheduler(backend.clone());
        scheduler.set_current_fen(STARTING_FEN);

        let entry = QueryQueueEntry::for_position(STARTING_FEN, false);
        let err = scheduler.query(entry.clone()).await.unwrap_err();
        assert_eq!(err, QueryError::Backend("no database open".to_string()));
        assert!(!scheduler.is_cached(entry.signature()));

        let event = events.recv().await.unwrap();
        assert!(event.outcome.is_err());

        scheduler.query(entry).await.unwrap_err();
        assert_eq!(backend.calls(), 2);
    }
}
