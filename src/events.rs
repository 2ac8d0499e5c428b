//! Simulation Event System
//!
//! Line highlights and run notifications are published on a broadcast bus.
//! An editor subscribes and highlights [`SimEvent::LineReached`] lines;
//! other listeners can follow session lifecycle and rate changes.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Events emitted by the simulator
#[derive(Debug, Clone, PartialEq)]
pub enum SimEventKind {
    /// A new session started running a program
    SessionStarted,
    /// The program paused at a suspend statement on `line`
    LineReached {
        /// 1-based line in the original program text
        line: usize,
        /// Requested pause in seconds
        pause_seconds: f64,
    },
    /// The program returned normally
    RunFinished,
    /// Loading or a step failed
    RunFailed {
        /// Error message
        message: String,
    },
    /// The session's timers were cancelled
    SessionStopped,
    /// Pose and motors were reset to their initial values
    Reset,
    /// The frame rate changed
    RateChanged {
        /// New rate in frames per second
        rate_hz: u32,
    },
}

/// A simulator event with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct SimEvent {
    /// Session that emitted the event (0 before any run)
    pub session: u64,
    /// What happened
    pub kind: SimEventKind,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

impl SimEvent {
    pub fn new(session: u64, kind: SimEventKind) -> Self {
        Self {
            session,
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Subscription handle for receiving simulator events
pub struct SimEventSubscription {
    receiver: broadcast::Receiver<SimEvent>,
}

impl SimEventSubscription {
    /// Receive the next event, waiting if necessary
    pub async fn recv(&mut self) -> Option<SimEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!("Simulator event subscriber lagged by {} events", count);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Option<SimEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!("Simulator event subscriber lagged by {} events", count);
                }
            }
        }
    }

    /// Drain every event that is already queued
    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Event bus for publishing and subscribing to simulator events
#[derive(Clone)]
pub struct SimEventBus {
    sender: broadcast::Sender<SimEvent>,
}

impl SimEventBus {
    /// Create a new event bus with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to simulator events
    pub fn subscribe(&self) -> SimEventSubscription {
        SimEventSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, session: u64, kind: SimEventKind) {
        // No subscribers is fine
        let _ = self.sender.send(SimEvent::new(session, kind));
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SimEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for SimEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
