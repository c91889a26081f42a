use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::repository::{Channel, EventPublisher, EventStore, Transport};
use crate::domain::types::{DomainEvent, StoredEvent};
use crate::error::{PaymentsServiceError, TransportError};

enum ConnectionState<C> {
    Disconnected,
    Connected(C),
}

/// Outcome of one drain pass over unprocessed stored events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub sent: usize,
    pub failed: usize,
}

/// Publishes domain events to the message transport with at-least-once delivery.
///
/// While the transport is down, events are written to the [`EventStore`] and
/// redelivered by the next successful [`connect`](Self::connect).
///
/// Connect attempts are serialized by their own lock and open the channel and
/// drain the backlog without touching the connection state, so publishers keep
/// falling back to the store meanwhile. The state lock is only taken for the
/// final catch-up pass that installs the channel; an event stored during a
/// connect is either drained by it or sent directly after it.
pub struct EventDelivery<T: Transport, S: EventStore> {
    transport: T,
    store: S,
    queue: String,
    state: Mutex<ConnectionState<T::Channel>>,
    connecting: Mutex<()>,
    recent: StdMutex<VecDeque<DomainEvent>>,
    recent_capacity: usize,
}

impl<T: Transport, S: EventStore> EventDelivery<T, S> {
    /// `queue` is asserted on every connect and mirrored in memory while
    /// disconnected, keeping at most `recent_capacity` events (0 disables it).
    pub fn new(transport: T, store: S, queue: impl Into<String>, recent_capacity: usize) -> Self {
        Self {
            transport,
            store,
            queue: queue.into(),
            state: Mutex::new(ConnectionState::Disconnected),
            connecting: Mutex::new(()),
            recent: StdMutex::new(VecDeque::with_capacity(recent_capacity)),
            recent_capacity,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.lock().await, ConnectionState::Connected(_))
    }

    /// Connect to the transport and drain stored events.
    ///
    /// No-op when already connected. A failed attempt leaves the component
    /// disconnected and is only logged. So does a backlog none of which could
    /// be redelivered.
    pub async fn connect(&self) {
        let _attempt = self.connecting.lock().await;
        if self.is_connected().await {
            debug!("message transport already connected");
            return;
        }

        let mut channel = match self.open_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(
                    error = %chain(e),
                    "message transport unavailable, events will be stored for later delivery"
                );
                return;
            }
        };
        info!(queue = %self.queue, "connected to message transport");

        let mut attempted = HashSet::new();
        let mut report = self.drain(&mut channel, &mut attempted).await;
        if report.sent == 0 && report.failed > 0 {
            warn!(
                failed = report.failed,
                "no stored event could be redelivered, staying disconnected"
            );
            return;
        }

        // Catch events stored while the first pass ran.
        let mut state = self.state.lock().await;
        let tail = self.drain(&mut channel, &mut attempted).await;
        report.sent += tail.sent;
        report.failed += tail.failed;
        if report.sent > 0 || report.failed > 0 {
            info!(sent = report.sent, failed = report.failed, "drained stored events");
        }
        *state = ConnectionState::Connected(channel);
    }

    /// Run a drain pass if connected. Returns an empty report otherwise.
    pub async fn drain_pending(&self) -> DrainReport {
        let mut state = self.state.lock().await;
        match &mut *state {
            ConnectionState::Connected(channel) => self.drain(channel, &mut HashSet::new()).await,
            ConnectionState::Disconnected => DrainReport::default(),
        }
    }

    /// Send `event` to `queue`, or persist it for later delivery when the
    /// transport is down. Only a failure to persist the fallback record is
    /// returned to the caller.
    pub async fn send_message(
        &self,
        queue: &str,
        event: &DomainEvent,
    ) -> Result<(), PaymentsServiceError> {
        let payload = serde_json::to_vec(event).context("serialize domain event")?;

        let mut state = self.state.lock().await;
        if let ConnectionState::Connected(channel) = &mut *state {
            let sent = channel.send_to_queue(queue, &payload).await;
            match sent {
                Ok(()) => {
                    debug!(queue, event = event.name(), "event published");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        queue,
                        error = %chain(e),
                        "direct send failed, marking transport disconnected"
                    );
                    *state = ConnectionState::Disconnected;
                }
            }
        }

        let stored = StoredEvent::pending(queue, event).context("serialize stored event")?;
        self.store.insert(&stored).await?;
        if queue == self.queue {
            self.remember(event);
        }
        info!(
            queue,
            event_id = %stored.id,
            event = event.name(),
            "transport down, event stored for later delivery"
        );
        Ok(())
    }

    /// Payment events stored while disconnected, oldest first.
    pub fn recent_events(&self) -> Vec<DomainEvent> {
        self.recent
            .lock()
            .map(|recent| recent.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Periodically reconnect (and drain) while disconnected.
    pub fn spawn_reconnect_loop(self: Arc<Self>, interval: Duration) -> JoinHandle<()>
    where
        T: 'static,
        S: 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !self.is_connected().await {
                    debug!("attempting to reconnect message transport");
                    self.connect().await;
                }
            }
        })
    }

    async fn open_channel(&self) -> Result<T::Channel, TransportError> {
        let mut channel = self.transport.connect().await?;
        channel.assert_queue(&self.queue).await?;
        Ok(channel)
    }

    /// Redeliver unprocessed events not yet in `attempted`, oldest first.
    async fn drain(
        &self,
        channel: &mut T::Channel,
        attempted: &mut HashSet<Uuid>,
    ) -> DrainReport {
        let mut report = DrainReport::default();
        let pending = match self.store.find_unprocessed().await {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %chain(e), "failed to load stored events");
                return report;
            }
        };

        for event in pending {
            if !attempted.insert(event.id) {
                continue;
            }
            let payload = match serde_json::to_vec(&event.message) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(event_id = %event.id, error = %e, "stored event is not serializable");
                    report.failed += 1;
                    continue;
                }
            };
            if let Err(e) = channel.send_to_queue(&event.queue, &payload).await {
                error!(
                    event_id = %event.id,
                    queue = %event.queue,
                    error = %chain(e),
                    "failed to redeliver stored event"
                );
                report.failed += 1;
                continue;
            }
            if let Err(e) = self.store.mark_processed(event.id, Utc::now()).await {
                error!(
                    event_id = %event.id,
                    error = %chain(e),
                    "stored event sent but not marked processed"
                );
                report.failed += 1;
                continue;
            }
            debug!(event_id = %event.id, queue = %event.queue, "stored event redelivered");
            report.sent += 1;
        }
        report
    }

    fn remember(&self, event: &DomainEvent) {
        if self.recent_capacity == 0 {
            return;
        }
        if let Ok(mut recent) = self.recent.lock() {
            while recent.len() >= self.recent_capacity {
                recent.pop_front();
            }
            recent.push_back(event.clone());
        }
    }
}

fn chain(e: impl std::error::Error + Send + Sync + 'static) -> String {
    format!("{:#}", anyhow::Error::new(e))
}

impl<T: Transport, S: EventStore> EventPublisher for EventDelivery<T, S> {
    async fn publish(&self, queue: &str, event: &DomainEvent) -> Result<(), PaymentsServiceError> {
        self.send_message(queue, event).await
    }
}
