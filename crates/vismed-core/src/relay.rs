// In-process event relay
//
// One EventRelay instance is constructed at startup and shared by Arc
// between the publish and subscribe handlers. The subscriber registry and
// pending buffer sit behind one std mutex; every mutation happens
// synchronously under the lock, never across an await point, so a
// subscriber can never observe a half-drained buffer.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use chrono::Utc;
use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::error::{RelayError, Result};
use crate::payload::{dedup_signature, normalize};

/// Outcome of a publish, surfaced to the HTTP layer for the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Fanned out to this many connected subscribers.
    Delivered(usize),
    /// No subscriber connected; parked in the pending buffer.
    Buffered,
    /// A buffered payload already carries the same signature.
    SkippedDuplicate,
}

struct Subscriber {
    id: i64,
    tx: mpsc::UnboundedSender<Value>,
}

#[derive(Default)]
struct RelayState {
    /// Registration order is fan-out order.
    subscribers: Vec<Subscriber>,
    /// Payloads published while no subscriber was connected.
    pending: Vec<Value>,
    last_id: i64,
}

/// Process-wide broadcast point between the upstream producer and SSE
/// subscribers. Best-effort only: no acknowledgment, no persistence across
/// restart.
pub struct EventRelay {
    state: Mutex<RelayState>,
}

impl EventRelay {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RelayState::default()),
        }
    }

    /// Accept one payload from the upstream producer.
    ///
    /// Connected subscribers each receive the normalized payload as their
    /// own frame, in registration order. With nobody connected the payload
    /// is parked in the pending buffer instead, unless a buffered payload
    /// already carries the same dedup signature.
    pub fn publish(&self, payload: Value) -> Result<PublishOutcome> {
        if payload.is_null() {
            return Err(RelayError::EmptyPayload);
        }

        let payload = normalize(payload);
        let signature = dedup_signature(&payload);

        let mut state = self.state.lock().unwrap();

        if state
            .pending
            .iter()
            .any(|buffered| dedup_signature(buffered) == signature)
        {
            tracing::debug!("duplicate payload skipped while buffering");
            return Ok(PublishOutcome::SkippedDuplicate);
        }

        if state.subscribers.is_empty() {
            state.pending.push(payload);
            tracing::debug!(
                pending = state.pending.len(),
                "no subscriber connected, payload buffered"
            );
            return Ok(PublishOutcome::Buffered);
        }

        // A failed send means the receiving half is already gone; drop that
        // subscriber and keep delivering to the rest.
        state.subscribers.retain(|subscriber| {
            let delivered = subscriber.tx.send(payload.clone()).is_ok();
            if !delivered {
                tracing::debug!(
                    subscriber_id = subscriber.id,
                    "dropping disconnected subscriber"
                );
            }
            delivered
        });

        Ok(PublishOutcome::Delivered(state.subscribers.len()))
    }

    /// Open a subscription for one new connection.
    ///
    /// Assigns a fresh subscriber id, replays the whole pending buffer to
    /// the new subscriber in order, clears the buffer, queues the synthetic
    /// `{"status":"connected","id":<id>}` frame, and registers the
    /// subscriber - one atomic step under the state lock with respect to
    /// concurrent publishes.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock().unwrap();
        let id = next_subscriber_id(&mut state);

        let replayed = state.pending.len();
        for payload in state.pending.drain(..) {
            let _ = tx.send(payload);
        }
        let _ = tx.send(json!({ "status": "connected", "id": id }));

        state.subscribers.push(Subscriber { id, tx });
        tracing::info!(subscriber_id = id, replayed, "subscriber connected");

        Subscription {
            id,
            rx,
            relay: Arc::clone(self),
        }
    }

    /// Number of currently-connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().unwrap().subscribers.len()
    }

    /// Number of payloads parked for the next subscriber.
    pub fn pending_len(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    fn unsubscribe(&self, id: i64) {
        let mut state = self.state.lock().unwrap();
        let before = state.subscribers.len();
        state.subscribers.retain(|subscriber| subscriber.id != id);
        if state.subscribers.len() < before {
            tracing::info!(subscriber_id = id, "subscriber disconnected");
        }
    }
}

impl Default for EventRelay {
    fn default() -> Self {
        Self::new()
    }
}

// Ids are the connection timestamp in milliseconds; the bump keeps them
// unique when two clients land in the same millisecond.
fn next_subscriber_id(state: &mut RelayState) -> i64 {
    let id = Utc::now().timestamp_millis().max(state.last_id + 1);
    state.last_id = id;
    id
}

/// Live handle for one subscriber connection.
///
/// Yields each delivered payload in publish order. Dropping the handle is
/// the only deregistration path: the transport closing drops the SSE
/// stream, which drops this handle, which removes the subscriber from the
/// registry exactly once.
pub struct Subscription {
    id: i64,
    rx: mpsc::UnboundedReceiver<Value>,
    relay: Arc<EventRelay>,
}

impl Subscription {
    /// Process-local id assigned to this subscriber.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Receive the next payload. Used directly by tests; the HTTP layer
    /// consumes the Stream impl instead.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.relay.unsubscribe(self.id);
    }
}
