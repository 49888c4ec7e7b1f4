use futures::channel::{mpsc, oneshot};
use futures::prelude::*;
use std::convert::TryFrom;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use super::endpoints::{Endpoint, EndpointError, EndpointResponse, EndpointTable};
use super::frame::Frame;
use super::registry::{CallbackRegistry, Continuation, SequenceAllocator};
use super::router::{EventStream, Router};
use crate::config::Config;
use crate::model::{Level1, Level2, Order, Trade};
use crate::transport::{self, TransportError};
use crate::utils::{lock, DynError};

/// Target used for the frame log enabled with [Config::debug].
const WIRE_TARGET: &str = "apex::wire";

/// Lifecycle of a connection.
///
/// ```text
/// Disconnected -> Connecting -> Open -> Closed
///                      |          \--> Errored
///                      \--> Errored
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closed,
    Errored,
}

/// Client for the gateway's request/response and event protocol over a single
/// connection.
///
/// Requests are correlated with responses by id. Pushed events are available
/// as streams, see [Client::level1] and friends.
///
/// Dropping the client closes the connection.
pub struct Client {
    shared: Arc<Shared>,
}

struct Shared {
    config: Config,
    state: Mutex<ConnectionState>,
    sequence: SequenceAllocator,
    registry: CallbackRegistry,
    router: Router,
    endpoints: EndpointTable,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    close_signal: Mutex<Option<oneshot::Sender<()>>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .field("registry", &self.shared.registry)
            .field("router", &self.shared.router)
            .finish()
    }
}

impl Client {
    /// Create a client in the [ConnectionState::Disconnected] state.
    pub fn new(config: Config) -> Self {
        let endpoints = EndpointTable::new(config.endpoint_names());
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(ConnectionState::Disconnected),
                sequence: SequenceAllocator::new(),
                registry: CallbackRegistry::new(),
                router: Router::new(),
                endpoints,
                outbound: Mutex::new(None),
                close_signal: Mutex::new(None),
            }),
        }
    }

    /// Connect to the configured URL with the default WebSocket transport.
    ///
    /// Failure moves the connection to [ConnectionState::Errored] and is
    /// reported to the `on_error` hook as well as returned.
    pub async fn open_connection(&self) -> Result<(), TransportError> {
        {
            let mut state = lock(&self.shared.state);
            if matches!(*state, ConnectionState::Connecting | ConnectionState::Open) {
                tracing::warn!(state = ?*state, "connection already opened");
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }

        let url = self.shared.config.url().to_owned();
        tracing::debug!(%url, "connecting");
        match transport::connect(&url).await {
            Ok((sink, stream)) => {
                self.open_with(sink, stream);
                Ok(())
            }
            Err(error) => {
                self.shared.fail(error.clone());
                Err(error)
            }
        }
    }

    /// Start the connection on an already established duplex text channel.
    ///
    /// `sink` receives one encoded frame per item and `stream` yields one
    /// frame per item.
    pub fn open_with<Sink_, Stream_, StreamError_>(&self, sink: Sink_, stream: Stream_)
    where
        Sink_: Sink<String> + Send + Unpin + 'static,
        Sink_::Error: std::error::Error + Send + Sync + 'static,
        Stream_: Stream<Item = Result<String, StreamError_>> + Send + Unpin + 'static,
        StreamError_: std::error::Error + Send + Sync + 'static,
    {
        let (outbound_sender, outbound_receiver) = mpsc::unbounded();
        let (close_sender, close_receiver) = oneshot::channel();
        *lock(&self.shared.outbound) = Some(outbound_sender);
        *lock(&self.shared.close_signal) = Some(close_sender);

        // Open before the reader starts so that an immediate end of the
        // stream is seen as a transition out of `Open`.
        *lock(&self.shared.state) = ConnectionState::Open;
        tracing::debug!("connection open");
        (self.shared.config.on_open)();

        let shared = Arc::clone(&self.shared);
        async_std::task::spawn(async move {
            Shared::forward_frames(&shared, outbound_receiver, sink).await
        });
        let shared = Arc::clone(&self.shared);
        async_std::task::spawn(async move {
            Shared::consume_frames(&shared, stream.take_until(close_receiver)).await
        });
    }

    /// Close the underlying connection if there is one.
    ///
    /// Calls that are still waiting for a response stay registered and are
    /// never resolved.
    pub fn close_connection(&self) {
        if self.shared.shutdown() {
            tracing::info!("connection closed by client");
        } else {
            tracing::info!("no connection to close");
        }
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.shared.state)
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Call `endpoint` and pass the response to the configured default
    /// continuation. Returns the id of the request.
    pub fn call(
        &self,
        endpoint: &str,
        params: &impl serde::Serialize,
    ) -> Result<i64, CallError> {
        let hook = Arc::clone(&self.shared.config.default_continuation);
        self.call_with(endpoint, params, Continuation::new(move |frame| hook(frame)))
    }

    /// Call `endpoint` and run `continuation` with the first frame that
    /// carries the id of the request. Returns that id.
    ///
    /// Fails without allocating an id if the connection is not open. If the
    /// connection closes while sending, the call fails and leaves nothing
    /// registered.
    pub fn call_with(
        &self,
        endpoint: &str,
        params: &impl serde::Serialize,
        continuation: Continuation,
    ) -> Result<i64, CallError> {
        let outbound = self.outbound()?;
        let id = i64::try_from(self.shared.sequence.allocate())
            .map_err(|_| CallError::IdsExhausted)?;
        let text = Frame::request(endpoint, params, id)?.build();
        if self.shared.config.is_debug() {
            tracing::info!(target: WIRE_TARGET, "⬆ {}", text);
        }
        // Registered before sending so that a fast response finds it.
        self.shared.registry.register(id, continuation);
        if outbound.unbounded_send(text).is_err() {
            self.shared.registry.remove(id);
            tracing::error!(endpoint, id, "connection closed while sending");
            return Err(CallError::NotOpen);
        }
        Ok(id)
    }

    /// Call `endpoint` and wait for the response frame.
    ///
    /// The future fails with [CallError::Protocol] if the gateway answers with
    /// an error frame. There is no timeout.
    pub fn call_async(&self, endpoint: &str, params: &impl serde::Serialize) -> ResponseFuture {
        let (sender, receiver) = oneshot::channel();
        let continuation = Continuation::new(move |frame| {
            // The caller may have dropped the future.
            let _ = sender.send(frame);
        });
        match self.call_with(endpoint, params, continuation) {
            Ok(_) => ResponseFuture::pending(receiver),
            Err(error) => ResponseFuture::failed(error),
        }
    }

    /// Look up the generated method for `endpoint`.
    pub fn endpoint(&self, endpoint: &str) -> Option<Endpoint<'_>> {
        self.shared
            .endpoints
            .get(endpoint)
            .map(|method| Endpoint::new(self, method))
    }

    /// Call the generated method for `endpoint` with `params`, or with
    /// `{"OMSId": 1}` if `params` is `None`.
    pub async fn invoke(
        &self,
        endpoint: &str,
        params: Option<serde_json::Value>,
    ) -> Result<EndpointResponse, EndpointError> {
        let endpoint = self
            .endpoint(endpoint)
            .ok_or_else(|| EndpointError::UnknownEndpoint {
                name: endpoint.to_owned(),
            })?;
        Ok(endpoint.call(params).await?)
    }

    pub fn endpoints(&self) -> &EndpointTable {
        &self.shared.endpoints
    }

    /// Number of calls waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.shared.registry.pending_count()
    }

    pub fn is_pending(&self, id: i64) -> bool {
        self.shared.registry.is_pending(id)
    }

    /// Number of inbound frames whose id matched no pending call.
    pub fn unmatched_count(&self) -> u64 {
        self.shared.registry.unmatched_count()
    }

    /// `Level1UpdateEvent` payloads.
    pub fn level1(&self) -> EventStream<Level1> {
        self.shared.router.topics().level1.subscribe()
    }

    /// `Level2UpdateEvent` payloads.
    pub fn level2(&self) -> EventStream<Level2> {
        self.shared.router.topics().level2.subscribe()
    }

    /// `TradeDataUpdateEvent` payloads.
    pub fn trades(&self) -> EventStream<Trade> {
        self.shared.router.topics().trades.subscribe()
    }

    /// `TickerDataUpdateEvent` payloads.
    pub fn ticker(&self) -> EventStream<serde_json::Value> {
        self.shared.router.topics().ticker.subscribe()
    }

    /// `OrderStateEvent` payloads.
    pub fn order_events(&self) -> EventStream<Order> {
        self.shared.router.topics().order_events.subscribe()
    }

    /// Account related events, see [super::router::ACCOUNT_EVENT_NAMES].
    ///
    /// Order state events show up here as well as on [Client::order_events].
    pub fn account_events(&self) -> EventStream<serde_json::Value> {
        self.shared.router.topics().account_events.subscribe()
    }

    /// Every inbound frame before classification.
    pub fn frames(&self) -> EventStream<Frame> {
        self.shared.router.frames()
    }

    fn outbound(&self) -> Result<mpsc::UnboundedSender<String>, CallError> {
        let state = self.state();
        if state != ConnectionState::Open {
            tracing::error!(?state, "connection is not open");
            return Err(CallError::NotOpen);
        }
        lock(&self.shared.outbound)
            .clone()
            .ok_or(CallError::NotOpen)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if self.shared.shutdown() {
            tracing::debug!("connection closed on drop");
        }
    }
}

impl Shared {
    /// Stop both connection tasks. Returns false if there was no open
    /// outbound channel.
    fn shutdown(&self) -> bool {
        let outbound = lock(&self.outbound).take();
        if let Some(close_signal) = lock(&self.close_signal).take() {
            let _ = close_signal.send(());
        }
        match outbound {
            Some(outbound) => {
                outbound.close_channel();
                self.close();
                true
            }
            None => false,
        }
    }

    async fn forward_frames<Sink_>(
        shared: &Shared,
        outbound: mpsc::UnboundedReceiver<String>,
        sink: Sink_,
    ) where
        Sink_: Sink<String> + Unpin,
        Sink_::Error: std::error::Error + Send + Sync + 'static,
    {
        if let Err(error) = outbound.map(Ok).forward(sink).await {
            shared.fail(TransportError::Send(DynError::new(error)));
        }
    }

    async fn consume_frames<Stream_, StreamError_>(shared: &Shared, mut stream: Stream_)
    where
        Stream_: Stream<Item = Result<String, StreamError_>> + Unpin,
        StreamError_: std::error::Error + Send + Sync + 'static,
    {
        while let Some(item) = stream.next().await {
            match item {
                Ok(text) => shared.receive(&text),
                Err(error) => {
                    shared.fail(TransportError::Receive(DynError::new(error)));
                    return;
                }
            }
        }
        tracing::debug!("end of inbound frames");
        shared.close();
    }

    fn receive(&self, text: &str) {
        if self.config.is_debug() {
            tracing::info!(target: WIRE_TARGET, "⬇ {}", text);
        }
        match Frame::parse(text) {
            Ok(frame) => {
                self.router.route(&self.registry, frame);
            }
            Err(error) => tracing::warn!(%error, "dropping invalid frame"),
        }
    }

    /// Move an open connection to [ConnectionState::Closed] and run the
    /// `on_close` hook.
    fn close(&self) {
        let closed = {
            let mut state = lock(&self.state);
            let open = *state == ConnectionState::Open;
            if open {
                *state = ConnectionState::Closed;
            }
            open
        };
        if closed {
            lock(&self.outbound).take();
            (self.config.on_close)();
        }
    }

    /// Move a connecting or open connection to [ConnectionState::Errored] and
    /// run the `on_error` hook.
    fn fail(&self, error: TransportError) {
        let failed = {
            let mut state = lock(&self.state);
            let active = matches!(
                *state,
                ConnectionState::Connecting | ConnectionState::Open
            );
            if active {
                *state = ConnectionState::Errored;
            }
            active
        };
        if failed {
            tracing::error!(%error, "connection failed");
            lock(&self.outbound).take();
            (self.config.on_error)(&error);
        } else {
            tracing::debug!(%error, "error after connection ended");
        }
    }
}

/// Error of a call made with [Client].
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Connection is not open")]
    NotOpen,
    #[error("No correlation ids left")]
    IdsExhausted,
    #[error("Failed to encode request parameters")]
    Encode(
        #[source]
        #[from]
        serde_json::Error,
    ),
    /// The gateway answered with an error frame.
    #[error("Error response to {}: {}", .0.name, .0.payload)]
    Protocol(Frame),
    /// The pending call was replaced by another call with the same id or the
    /// client went away.
    #[error("Call dropped without a response")]
    Cancelled,
}

/// Response to [Client::call_async].
///
/// Resolves with the raw response frame.
#[pin_project::pin_project]
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct ResponseFuture {
    #[pin]
    receiver: Option<oneshot::Receiver<Frame>>,
    error: Option<CallError>,
}

impl ResponseFuture {
    fn pending(receiver: oneshot::Receiver<Frame>) -> Self {
        Self {
            receiver: Some(receiver),
            error: None,
        }
    }

    fn failed(error: CallError) -> Self {
        Self {
            receiver: None,
            error: Some(error),
        }
    }
}

impl Future for ResponseFuture {
    type Output = Result<Frame, CallError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if let Some(error) = this.error.take() {
            return Poll::Ready(Err(error));
        }
        let receiver = match this.receiver.as_pin_mut() {
            Some(receiver) => receiver,
            None => return Poll::Ready(Err(CallError::Cancelled)),
        };
        match futures::ready!(receiver.poll(cx)) {
            Ok(frame) if frame.is_error() => Poll::Ready(Err(CallError::Protocol(frame))),
            Ok(frame) => Poll::Ready(Ok(frame)),
            Err(oneshot::Canceled) => Poll::Ready(Err(CallError::Cancelled)),
        }
    }
}
