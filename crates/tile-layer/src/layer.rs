//! The layer: one cache, one extrema tracker and one draw backend, driven by
//! host tile lifecycle calls and fetch completion events.
//!
//! The layer is single-owner and synchronous; only fetches run as tasks.
//! Each fetch task reports back through the layer's event channel, and the
//! owner applies the result with [`TileLayer::handle_event`] (or lets
//! [`TileLayer::run_until_idle`] do it).

use std::collections::HashMap;
use std::sync::Arc;

use renderer::{BindingContext, RenderBackend, TileHandle};
use tile_cache::{
    DecodedPayload, EntryState, Extrema, ExtremaStrategy, ExtremaTracker, Lookup, PayloadFormat,
    TileCache,
};
use tile_common::{
    canonicalize, consumer_key, CanonicalKey, ConsumerId, ProtocolError, RawTileCoord, Request,
    TileCoord,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use transport::{ResponseFuture, Transport, TransportError};

use crate::config::LayerConfig;
use crate::error::TileError;
use crate::loader::PayloadLoader;
use crate::meta::LayerMeta;

/// Completion of a fetch task.
#[derive(Debug)]
pub enum LayerEvent {
    Settled {
        key: CanonicalKey,
        request: Request,
        result: Result<DecodedPayload, TileError>,
    },
}

/// What [`TileLayer::load_tile`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Payload was cached; the tile is drawn.
    Drawn,
    /// Another tile already fetches the same key.
    Waiting,
    /// A fetch was issued.
    Fetching,
    /// Row outside the world; nothing to draw.
    OutOfRange,
}

/// What applying one [`LayerEvent`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub key: CanonicalKey,
    /// Tiles drawn while applying the event.
    pub redrawn: u64,
    /// The extrema moved and every resolved tile was redrawn.
    pub full_redraw: bool,
    /// The entry was evicted before its payload arrived.
    pub discarded: bool,
    /// The connection dropped mid-fetch and the request was issued again.
    pub refetched: bool,
}

/// Totals of a [`TileLayer::run_until_idle`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdleReport {
    pub resolved: usize,
    pub failed: usize,
    pub discarded: usize,
    pub refetched: usize,
    pub full_redraws: usize,
    pub draws: u64,
}

struct TileSlot {
    consumer: ConsumerId,
    key: CanonicalKey,
}

pub struct TileLayer<B, S> {
    config: LayerConfig,
    transport: Transport,
    loader: Arc<dyn PayloadLoader>,
    cache: TileCache<Arc<DecodedPayload>>,
    extrema: ExtremaTracker<S>,
    backend: B,
    ctx: BindingContext,
    /// Host tiles; `None` while created but not bound to a coordinate.
    tiles: HashMap<TileHandle, Option<TileSlot>>,
    handles: HashMap<ConsumerId, TileHandle>,
    next_handle: u64,
    zoom: Option<u32>,
    events_tx: mpsc::UnboundedSender<LayerEvent>,
    events_rx: mpsc::UnboundedReceiver<LayerEvent>,
    outstanding: usize,
    meta: Option<LayerMeta>,
}

impl<B: RenderBackend, S: ExtremaStrategy> TileLayer<B, S> {
    pub fn new(
        config: LayerConfig,
        transport: Transport,
        loader: Arc<dyn PayloadLoader>,
        backend: B,
        strategy: S,
    ) -> Self {
        let ctx = BindingContext::new(config.ramp, config.transform).with_opacity(config.opacity);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            config,
            transport,
            loader,
            cache: TileCache::new(),
            extrema: ExtremaTracker::new(strategy),
            backend,
            ctx,
            tiles: HashMap::new(),
            handles: HashMap::new(),
            next_handle: 0,
            zoom: None,
            events_tx,
            events_rx,
            outstanding: 0,
            meta: None,
        }
    }

    /// Allocate a host tile slot.
    pub fn create_tile(&mut self) -> TileHandle {
        self.next_handle += 1;
        let handle = TileHandle(self.next_handle);
        self.tiles.insert(handle, None);
        handle
    }

    /// Canonical coordinate a host coordinate is fetched under.
    pub fn adjust_coordinate(&self, raw: &RawTileCoord) -> Option<TileCoord> {
        canonicalize(raw)
    }

    /// Bind `handle` to `raw` and draw it, now or once its payload arrives.
    ///
    /// Rebinding a handle to a different coordinate releases the old one.
    /// Must be called inside a tokio runtime when a fetch is needed.
    pub fn load_tile(
        &mut self,
        handle: TileHandle,
        raw: RawTileCoord,
    ) -> Result<LoadOutcome, TileError> {
        let consumer = consumer_key(&raw);
        let rebinding = match self.tiles.get(&handle) {
            None => return Err(TileError::UnknownTile(handle)),
            Some(Some(slot)) => slot.consumer != consumer,
            Some(None) => false,
        };
        if rebinding {
            self.unbind(handle);
        }
        if let Some(previous) = self.handles.get(&consumer).copied() {
            if previous != handle {
                self.unbind(previous);
                self.backend.clear_tile(previous);
            }
        }

        let Some(coord) = self.adjust_coordinate(&raw) else {
            debug!(tile = %handle, coord = %raw, "Tile outside the world");
            self.backend.clear_tile(handle);
            return Ok(LoadOutcome::OutOfRange);
        };

        let request = self.request_for(coord);
        let key = self.transport.key_strategy().request_key(&request)?;

        self.handles.insert(consumer.clone(), handle);
        self.tiles.insert(
            handle,
            Some(TileSlot {
                consumer: consumer.clone(),
                key: key.clone(),
            }),
        );

        match self.cache.request(consumer, key.clone()) {
            Lookup::Ready(payload) => {
                let extrema = self.extrema.current();
                self.backend
                    .render_tile(&mut self.ctx, handle, &payload, &extrema)?;
                Ok(LoadOutcome::Drawn)
            }
            Lookup::Pending => Ok(LoadOutcome::Waiting),
            Lookup::Fetch => {
                self.spawn_fetch(key, request);
                Ok(LoadOutcome::Fetching)
            }
        }
    }

    /// Unbind `handle` from its coordinate but keep the slot.
    pub fn unload_tile(&mut self, handle: TileHandle) {
        self.unbind(handle);
        self.backend.clear_tile(handle);
    }

    /// Destroy a host tile slot. Returns false for unknown handles.
    pub fn remove_tile(&mut self, handle: TileHandle) -> bool {
        self.unbind(handle);
        self.backend.clear_tile(handle);
        self.tiles.remove(&handle).is_some()
    }

    /// Switch zoom level. The value range of one zoom says nothing about the
    /// next, so a change resets the extrema. Returns whether it changed.
    pub fn set_zoom(&mut self, zoom: u32) -> bool {
        if self.zoom == Some(zoom) {
            return false;
        }
        info!(from = ?self.zoom, to = zoom, "Zoom changed, resetting extrema");
        self.zoom = Some(zoom);
        self.extrema.reset();
        true
    }

    /// Apply a fetch completion: resolve the entry, widen the extrema and
    /// redraw what depends on them.
    ///
    /// A fetch cut off by a dropped connection is issued again while its
    /// entry is still Pending; the transport queues it until reconnect.
    /// Any other failure leaves the entry Pending with no retry.
    pub fn handle_event(&mut self, event: LayerEvent) -> Result<RenderOutcome, TileError> {
        let LayerEvent::Settled {
            key,
            request,
            result,
        } = event;
        self.outstanding = self.outstanding.saturating_sub(1);
        self.ctx.begin_frame();

        let payload = match result {
            Ok(payload) => Arc::new(payload),
            Err(TileError::Transport(TransportError::ConnectionLost)) => {
                // Still wanted: queue it again so it replays on reconnect.
                let refetched = self.cache.state(&key) == Some(EntryState::Pending);
                if refetched {
                    debug!(key = %key, "Connection lost mid-fetch, requesting again");
                    self.spawn_fetch(key.clone(), request);
                }
                return Ok(RenderOutcome {
                    key,
                    redrawn: 0,
                    full_redraw: false,
                    discarded: !refetched,
                    refetched,
                });
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Tile fetch failed");
                self.cache.fail(&key);
                return Err(e);
            }
        };

        let Some(consumers) = self.cache.resolve(&key, Arc::clone(&payload)) else {
            return Ok(RenderOutcome {
                key,
                redrawn: 0,
                full_redraw: false,
                discarded: true,
                refetched: false,
            });
        };

        let update = self.extrema.update(&payload);
        if update.changed {
            self.redraw_resolved();
        } else {
            self.draw_consumers(&consumers, &payload, &update.extrema)?;
        }

        debug!(
            key = %key,
            consumers = consumers.len(),
            full_redraw = update.changed,
            "Tile resolved"
        );
        Ok(RenderOutcome {
            key,
            redrawn: self.ctx.draws(),
            full_redraw: update.changed,
            discarded: false,
            refetched: false,
        })
    }

    /// Redraw every resolved tile against the current extrema. Tiles that
    /// fail to draw are logged and skipped. Returns the number drawn.
    pub fn redraw(&mut self) -> u64 {
        self.ctx.begin_frame();
        self.redraw_resolved();
        self.ctx.draws()
    }

    /// Next fetch completion, or `None` when no fetch is outstanding.
    pub async fn next_event(&mut self) -> Option<LayerEvent> {
        if self.outstanding == 0 {
            return None;
        }
        self.events_rx.recv().await
    }

    /// Apply events until no fetch is outstanding.
    ///
    /// Fetches queued while the connection is down only complete after it
    /// comes back, so callers wanting a bound should wrap this in a timeout.
    pub async fn run_until_idle(&mut self) -> IdleReport {
        let mut report = IdleReport::default();
        while let Some(event) = self.next_event().await {
            match self.handle_event(event) {
                Ok(outcome) if outcome.discarded => report.discarded += 1,
                Ok(outcome) if outcome.refetched => report.refetched += 1,
                Ok(outcome) => {
                    report.resolved += 1;
                    report.draws += outcome.redrawn;
                    if outcome.full_redraw {
                        report.full_redraws += 1;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Event left tile in placeholder state");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Fetch the layer metadata once; later calls return the stored copy.
    pub async fn load_meta(&mut self) -> Result<LayerMeta, TileError> {
        if let Some(meta) = &self.meta {
            return Ok(meta.clone());
        }

        let request = Request::meta(self.config.index.clone(), self.config.store.clone());
        let resolved = self.transport.get(request).await?;
        let meta: LayerMeta = match &resolved.response.payload {
            Some(inline) => serde_json::from_value(inline.clone()).map_err(ProtocolError::from)?,
            None => {
                let body = self.loader.load(&resolved.url).await?;
                serde_json::from_slice(&body).map_err(ProtocolError::from)?
            }
        };

        info!(
            index = %self.config.index,
            doc_count = ?meta.doc_count,
            fields = meta.fields.len(),
            "Loaded layer metadata"
        );
        self.meta = Some(meta.clone());
        Ok(meta)
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn cache(&self) -> &TileCache<Arc<DecodedPayload>> {
        &self.cache
    }

    pub fn extrema(&self) -> Extrema {
        self.extrema.current()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn context_mut(&mut self) -> &mut BindingContext {
        &mut self.ctx
    }

    pub fn zoom(&self) -> Option<u32> {
        self.zoom
    }

    /// Fetches not yet applied.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Key a tile is currently bound to.
    pub fn tile_key(&self, handle: TileHandle) -> Option<&CanonicalKey> {
        self.tiles
            .get(&handle)
            .and_then(Option::as_ref)
            .map(|slot| &slot.key)
    }

    /// Handles currently bound to a coordinate.
    pub fn bound_tiles(&self) -> impl Iterator<Item = TileHandle> + '_ {
        self.tiles
            .iter()
            .filter(|(_, slot)| slot.is_some())
            .map(|(handle, _)| *handle)
    }

    fn request_for(&self, coord: TileCoord) -> Request {
        Request::tile(
            self.config.index.clone(),
            self.config.store.clone(),
            coord,
            Some(self.config.kind.params()),
        )
    }

    fn unbind(&mut self, handle: TileHandle) {
        let Some(slot) = self.tiles.get_mut(&handle).and_then(Option::take) else {
            return;
        };
        if self.handles.get(&slot.consumer) == Some(&handle) {
            self.handles.remove(&slot.consumer);
        }
        if self.cache.release(&slot.consumer, &slot.key) {
            debug!(key = %slot.key, "Last tile released entry");
        }
    }

    fn spawn_fetch(&mut self, key: CanonicalKey, request: Request) {
        // The send happens here, before the task first runs.
        let response = self.transport.get(request.clone());
        let loader = Arc::clone(&self.loader);
        let format = self.config.kind.payload_format();
        let events = self.events_tx.clone();
        self.outstanding += 1;

        tokio::spawn(async move {
            let result = fetch_payload(response, loader.as_ref(), format).await;
            // The receiver lives as long as the layer.
            let _ = events.send(LayerEvent::Settled {
                key,
                request,
                result,
            });
        });
    }

    fn redraw_resolved(&mut self) {
        let extrema = self.extrema.current();
        let resolved: Vec<_> = self
            .cache
            .resolved()
            .map(|(key, payload, consumers)| (key.clone(), Arc::clone(payload), consumers))
            .collect();

        for (key, payload, consumers) in resolved {
            if let Err(e) = self.draw_consumers(&consumers, &payload, &extrema) {
                warn!(key = %key, error = %e, "Skipping tile that failed to redraw");
            }
        }
    }

    fn draw_consumers(
        &mut self,
        consumers: &[ConsumerId],
        payload: &DecodedPayload,
        extrema: &Extrema,
    ) -> Result<(), TileError> {
        for consumer in consumers {
            if let Some(handle) = self.handles.get(consumer).copied() {
                self.backend
                    .render_tile(&mut self.ctx, handle, payload, extrema)?;
            }
        }
        Ok(())
    }
}

/// Await the transport, then take the inline payload or download it.
async fn fetch_payload(
    response: ResponseFuture,
    loader: &dyn PayloadLoader,
    format: PayloadFormat,
) -> Result<DecodedPayload, TileError> {
    let resolved = response.await?;
    match &resolved.response.payload {
        Some(inline) => Ok(DecodedPayload::from_json(format, inline)?),
        None => {
            let body = loader.load(&resolved.url).await?;
            Ok(DecodedPayload::from_bytes(format, &body)?)
        }
    }
}
