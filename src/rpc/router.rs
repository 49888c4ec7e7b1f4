//! Routing of inbound frames to pending calls and to named event streams.
//!
//! Every inbound frame is first offered to the [CallbackRegistry] by id and
//! then, independently, to every [Topic] whose names include the frame name.
//! Topics are hot: a subscriber only sees frames that arrive after it
//! subscribed. One frame may be published on several topics.
use futures::channel::mpsc;
use futures::prelude::*;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::task::{Context, Poll};

use super::frame::Frame;
use super::registry::CallbackRegistry;
use crate::model::{Level1, Level2, Order, Trade};
use crate::utils::lock;

/// Event names published on [Topics::account_events].
pub const ACCOUNT_EVENT_NAMES: &[&str] = &[
    "AccountPositionEvent",
    "CancelAllOrdersRejectEvent",
    "CancelOrderRejectEvent",
    "CancelReplaceOrderRejectEvent",
    "MarketStateUpdate",
    "NewOrderRejectEvent",
    "OrderStateEvent",
    "OrderTradeEvent",
    "PendingDepositUpdate",
    "TransactionEvent",
];

type Decode<T> = fn(&str) -> Result<T, serde_json::Error>;

/// Set of subscribers that each receive a copy of every published value.
pub struct Hub<T> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T> Default for Hub<T> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<T> std::fmt::Debug for Hub<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<T> Hub<T> {
    /// Receive every value published after this call.
    pub fn subscribe(&self) -> EventStream<T> {
        let (sender, receiver) = mpsc::unbounded();
        self.subscribers().push(sender);
        EventStream::new(receiver)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<T>>> {
        lock(&self.subscribers)
    }
}

impl<T: Clone> Hub<T> {
    /// Send `value` to all current subscribers and forget the ones that went
    /// away.
    pub fn publish(&self, value: T) {
        self.subscribers()
            .retain(|subscriber| subscriber.unbounded_send(value.clone()).is_ok());
    }
}

/// A named, decoded and multicast view of inbound frames.
pub struct Topic<T> {
    label: &'static str,
    names: &'static [&'static str],
    decode: Decode<T>,
    hub: Hub<T>,
}

impl<T> std::fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic")
            .field("label", &self.label)
            .field("names", &self.names)
            .field("hub", &self.hub)
            .finish()
    }
}

impl<T> Topic<T> {
    pub fn new(label: &'static str, names: &'static [&'static str], decode: Decode<T>) -> Self {
        Self {
            label,
            names,
            decode,
            hub: Hub::default(),
        }
    }

    /// Receive every value decoded from frames that arrive after this call.
    pub fn subscribe(&self) -> EventStream<T> {
        self.hub.subscribe()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.names.iter().any(|candidate| *candidate == name)
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }
}

/// Type erased interface the [Router] uses to offer frames to topics.
trait Route: Send + Sync {
    /// Publish the decoded payload of `frame` if the topic matches its name.
    /// Returns true if the name matched.
    fn offer(&self, frame: &Frame) -> bool;
}

impl<T: Clone + Send> Route for Topic<T> {
    fn offer(&self, frame: &Frame) -> bool {
        if !self.matches(&frame.name) {
            return false;
        }
        if self.subscriber_count() == 0 {
            return true;
        }
        match (self.decode)(&frame.payload) {
            Ok(value) => self.hub.publish(value),
            Err(error) => tracing::warn!(
                topic = self.label,
                name = %frame.name,
                %error,
                "failed to decode event payload"
            ),
        }
        true
    }
}

/// The derived event streams of a connection.
#[derive(Debug)]
pub struct Topics {
    pub level1: Topic<Level1>,
    pub level2: Topic<Level2>,
    pub trades: Topic<Trade>,
    pub ticker: Topic<serde_json::Value>,
    pub order_events: Topic<Order>,
    pub account_events: Topic<serde_json::Value>,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            level1: Topic::new("level1", &["Level1UpdateEvent"], |payload| {
                serde_json::from_str(payload)
            }),
            level2: Topic::new("level2", &["Level2UpdateEvent"], |payload| {
                serde_json::from_str(payload)
            }),
            trades: Topic::new("trades", &["TradeDataUpdateEvent"], |payload| {
                serde_json::from_str(payload)
            }),
            ticker: Topic::new("ticker", &["TickerDataUpdateEvent"], |payload| {
                serde_json::from_str(payload)
            }),
            order_events: Topic::new("order_events", &["OrderStateEvent"], |payload| {
                serde_json::from_str(payload)
            }),
            account_events: Topic::new("account_events", ACCOUNT_EVENT_NAMES, |payload| {
                serde_json::from_str(payload)
            }),
        }
    }
}

impl Topics {
    fn routes(&self) -> [&dyn Route; 6] {
        [
            &self.level1,
            &self.level2,
            &self.trades,
            &self.ticker,
            &self.order_events,
            &self.account_events,
        ]
    }
}

/// Sends inbound frames to pending calls and event streams.
#[derive(Debug)]
pub struct Router {
    topics: Topics,
    frames: Hub<Frame>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            topics: Topics::default(),
            frames: Hub::default(),
        }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Every inbound frame, undecoded.
    pub fn frames(&self) -> EventStream<Frame> {
        self.frames.subscribe()
    }

    /// Route one inbound frame.
    ///
    /// The frame is offered to `registry` regardless of its message type, then
    /// published on every topic that lists its name. Returns the number of
    /// topics that matched.
    pub fn route(&self, registry: &CallbackRegistry, frame: Frame) -> usize {
        tracing::trace!(%frame, "routing frame");
        if self.frames.subscriber_count() > 0 {
            self.frames.publish(frame.clone());
        }

        if !registry.dispatch(frame.id, frame.clone()) && frame.message_type.is_response() {
            tracing::warn!(
                id = frame.id,
                message_type = ?frame.message_type,
                "no pending call for response"
            );
        }

        self.topics
            .routes()
            .iter()
            .filter(|route| route.offer(&frame))
            .count()
    }
}

/// Stream of values published on a [Topic] after subscribing.
///
/// Dropping the stream unsubscribes.
#[pin_project::pin_project]
#[derive(Debug)]
pub struct EventStream<T> {
    #[pin]
    receiver: mpsc::UnboundedReceiver<T>,
}

impl<T> EventStream<T> {
    fn new(receiver: mpsc::UnboundedReceiver<T>) -> Self {
        Self { receiver }
    }
}

impl<T> Stream for EventStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().receiver.poll_next(cx)
    }
}
