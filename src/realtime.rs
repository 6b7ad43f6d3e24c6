//! Realtime notification broadcast
//!
//! Fire-and-forget fan-out to connected listeners over a
//! `tokio::sync::broadcast` channel. Nothing is queued for listeners that
//! are not connected; a listener that falls behind skips ahead.

use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::data::NotificationPayload;
use crate::metrics::{REALTIME_EMITS_TOTAL, REALTIME_LISTENERS};

/// Event name clients subscribe to
pub const NEW_NOTIFICATION_EVENT: &str = "new-notification";

const CHANNEL_CAPACITY: usize = 256;

/// Pushes notification payloads to connected clients
pub trait Publisher: Send + Sync {
    /// Emit to every listener, or only to listeners in `room`.
    ///
    /// Returns the number of connected listeners the event was handed to.
    fn emit(&self, payload: &NotificationPayload, room: Option<&str>) -> usize;
}

#[derive(Debug, Clone)]
struct RealtimeEvent {
    room: Option<String>,
    payload: NotificationPayload,
}

/// In-process broadcast hub
pub struct NotificationHub {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl NotificationHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Connect a listener, optionally joined to a room
    pub fn listen(&self, room: Option<String>) -> Listener {
        REALTIME_LISTENERS.inc();
        Listener {
            receiver: self.sender.subscribe(),
            room,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for NotificationHub {
    fn emit(&self, payload: &NotificationPayload, room: Option<&str>) -> usize {
        REALTIME_EMITS_TOTAL
            .with_label_values(&[if room.is_some() { "room" } else { "global" }])
            .inc();

        let event = RealtimeEvent {
            room: room.map(str::to_string),
            payload: payload.clone(),
        };
        // No receivers is not an error for a fire-and-forget channel
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!(notification_id = payload.id, room, listeners = delivered, "Realtime event emitted");
        delivered
    }
}

/// One connected realtime client
pub struct Listener {
    receiver: broadcast::Receiver<RealtimeEvent>,
    room: Option<String>,
}

impl Listener {
    fn accepts(&self, event: &RealtimeEvent) -> bool {
        match &event.room {
            None => true,
            Some(room) => self.room.as_deref() == Some(room.as_str()),
        }
    }

    /// Next payload addressed to this listener. `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<NotificationPayload> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event.payload),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Realtime listener lagged; skipping ahead");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = NotificationPayload> + Send + 'static {
        futures::stream::unfold(self, |mut listener| async move {
            listener.recv().await.map(|payload| (payload, listener))
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        REALTIME_LISTENERS.dec();
    }
}
