//! Keyed request/response correlation with coalescing and replay.
//!
//! # Architecture
//!
//! ```text
//! get(A) ─┐                                   ┌─► waiter A
//! get(A) ─┼─► in-flight[key(A)] ── 1 send ──► ├─► waiter A'
//! get(B) ─┘   in-flight[key(B)] ── 1 send     └─► ...
//!
//! closed:  get(C) ─► pending queue ──(open)──► get(C) replayed
//! ```
//!
//! All bookkeeping in [`Transport::get`] happens before the returned future
//! is first polled, so two calls for the same key in the same tick always
//! coalesce onto one send.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use metrics::counter;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use tile_common::{
    CanonicalKey, DefaultKeyStrategy, KeyStrategy, Request, ResponseEnvelope,
};

use crate::connection::Connection;
use crate::error::TransportError;

type Outcome = Result<Resolved, TransportError>;
type Waiter = oneshot::Sender<Outcome>;

/// A successful response together with the URL its payload lives at.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub url: String,
    pub response: Arc<ResponseEnvelope>,
}

/// One in-flight key: everybody waiting on its single send.
struct PendingFuture {
    waiters: Vec<Waiter>,
}

/// A request issued while the connection was closed.
struct QueuedRequest {
    request: Request,
    waiter: Waiter,
}

#[derive(Default)]
struct TransportState {
    in_flight: HashMap<CanonicalKey, PendingFuture>,
    queue: VecDeque<QueuedRequest>,
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    coalesced: AtomicU64,
    queued: AtomicU64,
    replayed: AtomicU64,
    resolved: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

/// Snapshot of transport activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Physical sends
    pub sent: u64,
    /// Requests attached to an existing in-flight send
    pub coalesced: u64,
    /// Requests parked while disconnected
    pub queued: u64,
    /// Queued requests re-issued after reconnect
    pub replayed: u64,
    /// Responses with `success: true`
    pub resolved: u64,
    /// Responses with `success: false`
    pub failed: u64,
    /// Waiters rejected because the connection dropped
    pub rejected: u64,
}

impl TransportStats {
    /// Fraction of logical requests served by another request's send.
    pub fn coalescing_ratio(&self) -> f64 {
        let total = self.sent + self.coalesced;
        if total == 0 {
            0.0
        } else {
            self.coalesced as f64 / total as f64
        }
    }
}

struct Inner {
    connection: Arc<dyn Connection>,
    keys: Arc<dyn KeyStrategy>,
    base_url: String,
    state: Mutex<TransportState>,
    counters: Counters,
}

/// Cloneable handle to a layer's transport.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

impl Transport {
    /// Create a transport over `connection` using the default key strategy.
    pub fn new(connection: Arc<dyn Connection>, base_url: impl Into<String>) -> Self {
        Self::with_key_strategy(connection, base_url, Arc::new(DefaultKeyStrategy))
    }

    pub fn with_key_strategy(
        connection: Arc<dyn Connection>,
        base_url: impl Into<String>,
        keys: Arc<dyn KeyStrategy>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                connection,
                keys,
                base_url: base_url.into(),
                state: Mutex::new(TransportState::default()),
                counters: Counters::default(),
            }),
        }
    }

    /// The strategy used to key requests and responses.
    pub fn key_strategy(&self) -> Arc<dyn KeyStrategy> {
        self.inner.keys.clone()
    }

    /// Issue a request.
    ///
    /// Coalesces onto an existing in-flight request with the same key, sends
    /// it otherwise, or parks it on the pending queue while disconnected.
    pub fn get(&self, request: Request) -> ResponseFuture {
        let (tx, rx) = oneshot::channel();
        self.dispatch(request, tx);
        ResponseFuture { rx }
    }

    fn dispatch(&self, request: Request, waiter: Waiter) {
        let key = match self.inner.keys.request_key(&request) {
            Ok(key) => key,
            Err(e) => {
                let _ = waiter.send(Err(e.into()));
                return;
            }
        };

        let mut state = self.state();

        if let Some(pending) = state.in_flight.get_mut(&key) {
            pending.waiters.push(waiter);
            self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
            counter!("tile_transport_coalesced_total").increment(1);
            debug!(
                key = %key,
                waiters = pending.waiters.len(),
                "Coalescing request onto in-flight send"
            );
            return;
        }

        if !self.inner.connection.is_open() {
            self.enqueue(&mut state, &key, request, waiter);
            return;
        }

        let frame = match request.to_wire() {
            Ok(frame) => frame,
            Err(e) => {
                let _ = waiter.send(Err(e.into()));
                return;
            }
        };

        match self.inner.connection.send(frame) {
            Ok(()) => {
                state.in_flight.insert(
                    key.clone(),
                    PendingFuture {
                        waiters: vec![waiter],
                    },
                );
                self.inner.counters.sent.fetch_add(1, Ordering::Relaxed);
                counter!("tile_transport_sent_total").increment(1);
                debug!(key = %key, in_flight = state.in_flight.len(), "Request sent");
            }
            Err(TransportError::NotConnected) => {
                self.enqueue(&mut state, &key, request, waiter);
            }
            Err(e) => {
                let _ = waiter.send(Err(e));
            }
        }
    }

    fn enqueue(
        &self,
        state: &mut TransportState,
        key: &CanonicalKey,
        request: Request,
        waiter: Waiter,
    ) {
        state.queue.push_back(QueuedRequest { request, waiter });
        self.inner.counters.queued.fetch_add(1, Ordering::Relaxed);
        counter!("tile_transport_queued_total").increment(1);
        debug!(key = %key, queued = state.queue.len(), "Connection closed, queueing request");
    }

    /// The connection (re)opened: replay the pending queue in FIFO order.
    ///
    /// Returns the number of requests replayed.
    pub fn handle_open(&self) -> usize {
        let queued: Vec<QueuedRequest> = self.state().queue.drain(..).collect();
        let count = queued.len();

        for entry in queued {
            self.dispatch(entry.request, entry.waiter);
        }

        self.inner
            .counters
            .replayed
            .fetch_add(count as u64, Ordering::Relaxed);
        info!(replayed = count, "Connection open");
        count
    }

    /// A frame arrived: settle the pending future its echoed fields key to.
    pub fn handle_message(&self, text: &str) {
        let envelope = match ResponseEnvelope::from_json(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable response frame");
                return;
            }
        };

        let key = match self.inner.keys.response_key(&envelope) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Dropping response with unusable key fields");
                return;
            }
        };

        let Some(pending) = self.state().in_flight.remove(&key) else {
            debug!(key = %key, "No pending request for response, dropping");
            return;
        };

        let outcome = if envelope.success {
            self.inner.counters.resolved.fetch_add(1, Ordering::Relaxed);
            Ok(Resolved {
                url: resolution_url(&self.inner.base_url, &envelope),
                response: Arc::new(envelope),
            })
        } else {
            self.inner.counters.failed.fetch_add(1, Ordering::Relaxed);
            let detail = envelope
                .error
                .unwrap_or_else(|| "unspecified service error".to_string());
            warn!(key = %key, error = %detail, "Request failed");
            Err(TransportError::RequestFailed(detail))
        };

        debug!(key = %key, waiters = pending.waiters.len(), "Settling request");
        for waiter in pending.waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    /// The connection closed: reject everything in flight.
    ///
    /// Queued requests are untouched; they replay on the next open.
    /// Returns the number of waiters rejected.
    pub fn handle_close(&self) -> usize {
        let drained: Vec<PendingFuture> = self
            .state()
            .in_flight
            .drain()
            .map(|(_, pending)| pending)
            .collect();

        let mut rejected = 0;
        for pending in drained {
            for waiter in pending.waiters {
                let _ = waiter.send(Err(TransportError::ConnectionLost));
                rejected += 1;
            }
        }

        self.inner
            .counters
            .rejected
            .fetch_add(rejected as u64, Ordering::Relaxed);
        counter!("tile_transport_rejected_total").increment(rejected as u64);
        warn!(rejected, "Connection lost");
        rejected
    }

    /// Number of keys with a send outstanding.
    pub fn in_flight_len(&self) -> usize {
        self.state().in_flight.len()
    }

    /// Whether a send is outstanding for `key`.
    pub fn is_in_flight(&self, key: &CanonicalKey) -> bool {
        self.state().in_flight.contains_key(key)
    }

    /// Number of requests waiting for the connection.
    pub fn queued_len(&self) -> usize {
        self.state().queue.len()
    }

    /// Get current statistics.
    pub fn stats(&self) -> TransportStats {
        let c = &self.inner.counters;
        TransportStats {
            sent: c.sent.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            queued: c.queued.load(Ordering::Relaxed),
            replayed: c.replayed.load(Ordering::Relaxed),
            resolved: c.resolved.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
        }
    }

    fn state(&self) -> MutexGuard<'_, TransportState> {
        // State is plain bookkeeping; a panic mid-update leaves nothing torn.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `{base}/{endpoint|kind}/{index}/{store}[/{z}/{x}/{y}]`
fn resolution_url(base_url: &str, envelope: &ResponseEnvelope) -> String {
    let route = envelope
        .endpoint
        .as_deref()
        .unwrap_or_else(|| envelope.kind.as_str());
    let mut url = format!(
        "{}/{}/{}/{}",
        base_url.trim_end_matches('/'),
        route.trim_matches('/'),
        envelope.index,
        envelope.store
    );
    if let Some(coord) = envelope.coord {
        url.push('/');
        url.push_str(&coord.cache_key());
    }
    url
}

/// Settles once the matching response arrives, or the connection drops.
#[must_use = "futures do nothing unless polled"]
pub struct ResponseFuture {
    rx: oneshot::Receiver<Outcome>,
}

impl Future for ResponseFuture {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // The transport went away with this request still parked.
            Poll::Ready(Err(_)) => Poll::Ready(Err(TransportError::ConnectionLost)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tile_common::{HeatmapParams, TileCoord, TileParams};
    use tokio_test::{assert_pending, assert_ready, task};

    #[derive(Default)]
    struct RecordingConnection {
        open: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    impl RecordingConnection {
        fn opened() -> Arc<Self> {
            let conn = Arc::new(Self::default());
            conn.open.store(true, Ordering::SeqCst);
            conn
        }

        fn closed() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Connection for RecordingConnection {
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn send(&self, text: String) -> Result<(), TransportError> {
            if !self.is_open() {
                return Err(TransportError::NotConnected);
            }
            self.sent.lock().unwrap().push(text);
            Ok(())
        }
    }

    fn tile(x: u32) -> Request {
        Request::tile(
            "trips",
            "es",
            TileCoord::new(2, x, 1),
            Some(TileParams::Heatmap(HeatmapParams {
                x_field: "lon".to_string(),
                y_field: "lat".to_string(),
                resolution: 64,
                value_field: None,
                filters: vec![],
            })),
        )
    }

    fn success(request: &Request) -> String {
        ResponseEnvelope::success_for(request, Some(serde_json::json!([1.0, 2.0])))
            .to_json()
            .unwrap()
    }

    #[tokio::test]
    async fn test_identical_requests_coalesce_into_one_send() {
        let conn = RecordingConnection::opened();
        let transport = Transport::new(conn.clone(), "http://agg");

        let futures: Vec<_> = (0..5).map(|_| transport.get(tile(1))).collect();
        assert_eq!(conn.sent().len(), 1);
        assert_eq!(transport.in_flight_len(), 1);

        transport.handle_message(&success(&tile(1)));
        assert_eq!(transport.in_flight_len(), 0);

        let mut responses = Vec::new();
        for future in futures {
            responses.push(future.await.unwrap());
        }
        for resolved in &responses[1..] {
            assert!(Arc::ptr_eq(&resolved.response, &responses[0].response));
            assert_eq!(resolved.url, responses[0].url);
        }

        let stats = transport.stats();
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.coalesced, 4);
        assert!((stats.coalescing_ratio() - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_distinct_requests_send_separately() {
        let conn = RecordingConnection::opened();
        let transport = Transport::new(conn.clone(), "http://agg");

        let _a = transport.get(tile(0));
        let _b = transport.get(tile(1));
        assert_eq!(conn.sent().len(), 2);
        assert_eq!(transport.in_flight_len(), 2);
    }

    #[tokio::test]
    async fn test_closed_connection_queues_then_replays_once() {
        let conn = RecordingConnection::closed();
        let transport = Transport::new(conn.clone(), "http://agg");

        let mut future = task::spawn(transport.get(tile(2)));
        let mut duplicate = task::spawn(transport.get(tile(2)));
        assert!(conn.sent().is_empty());
        assert_eq!(transport.queued_len(), 2);
        assert_eq!(transport.in_flight_len(), 0);
        assert_pending!(future.poll());

        conn.open.store(true, Ordering::SeqCst);
        assert_eq!(transport.handle_open(), 2);
        assert_eq!(conn.sent().len(), 1);
        assert_eq!(transport.queued_len(), 0);
        assert_pending!(future.poll());

        transport.handle_message(&success(&tile(2)));
        let resolved = assert_ready!(future.poll()).unwrap();
        assert_eq!(resolved.url, "http://agg/tile/trips/es/2/2/1");
        assert!(assert_ready!(duplicate.poll()).is_ok());
    }

    #[tokio::test]
    async fn test_close_rejects_every_in_flight_request() {
        let conn = RecordingConnection::opened();
        let transport = Transport::new(conn.clone(), "http://agg");

        let a = transport.get(tile(0));
        let b = transport.get(tile(1));
        let b2 = transport.get(tile(1));

        conn.open.store(false, Ordering::SeqCst);
        assert_eq!(transport.handle_close(), 3);
        assert_eq!(transport.in_flight_len(), 0);

        assert_eq!(a.await.unwrap_err(), TransportError::ConnectionLost);
        assert_eq!(b.await.unwrap_err(), TransportError::ConnectionLost);
        assert_eq!(b2.await.unwrap_err(), TransportError::ConnectionLost);
    }

    #[tokio::test]
    async fn test_close_keeps_queued_requests() {
        let conn = RecordingConnection::closed();
        let transport = Transport::new(conn.clone(), "http://agg");

        let _queued = transport.get(tile(0));
        assert_eq!(transport.handle_close(), 0);
        assert_eq!(transport.queued_len(), 1);
    }

    #[tokio::test]
    async fn test_failed_response_rejects_all_coalesced_callers() {
        let conn = RecordingConnection::opened();
        let transport = Transport::new(conn.clone(), "http://agg");

        let a = transport.get(tile(3));
        let b = transport.get(tile(3));
        let failure = ResponseEnvelope::failure_for(&tile(3), "index not found")
            .to_json()
            .unwrap();
        transport.handle_message(&failure);

        let expected = TransportError::RequestFailed("index not found".to_string());
        assert_eq!(a.await.unwrap_err(), expected);
        assert_eq!(b.await.unwrap_err(), expected);
        assert_eq!(transport.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_settled_key_is_sent_again() {
        let conn = RecordingConnection::opened();
        let transport = Transport::new(conn.clone(), "http://agg");

        let first = transport.get(tile(0));
        transport.handle_message(&success(&tile(0)));
        first.await.unwrap();

        let _second = transport.get(tile(0));
        assert_eq!(conn.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_unmatched_and_malformed_frames_are_dropped() {
        let conn = RecordingConnection::opened();
        let transport = Transport::new(conn.clone(), "http://agg");

        let mut pending = task::spawn(transport.get(tile(0)));
        transport.handle_message("not json");
        transport.handle_message(&success(&tile(1)));
        assert_eq!(transport.in_flight_len(), 1);
        assert_pending!(pending.poll());
    }

    #[tokio::test]
    async fn test_invalid_params_rejected_without_send() {
        let conn = RecordingConnection::opened();
        let transport = Transport::new(conn.clone(), "http://agg");

        let bad = Request::tile(
            "trips",
            "es",
            TileCoord::new(0, 0, 0),
            Some(TileParams::Heatmap(HeatmapParams {
                x_field: String::new(),
                y_field: "lat".to_string(),
                resolution: 64,
                value_field: None,
                filters: vec![],
            })),
        );
        assert!(matches!(
            transport.get(bad).await,
            Err(TransportError::Protocol(_))
        ));
        assert!(conn.sent().is_empty());
    }

    #[test]
    fn test_resolution_url_uses_endpoint() {
        let mut envelope = ResponseEnvelope::success_for(&tile(1), None);
        envelope.endpoint = Some("/heatmap/".to_string());
        assert_eq!(
            resolution_url("http://agg/", &envelope),
            "http://agg/heatmap/trips/es/2/1/1"
        );

        let meta = ResponseEnvelope::success_for(&Request::meta("trips", "es"), None);
        assert_eq!(resolution_url("http://agg", &meta), "http://agg/meta/trips/es");
    }
}
