//! Production implementation of WarpContext and HostEvents using Tokio.

use crate::error::EnvError;
use crate::input::{HostEvents, InputInjector};
use crate::types::HostEvent;
use crate::WarpContext;
use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Production context backed by Tokio and OS entropy.
///
/// Time comes from the monotonic system clock, randomness from the OS.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WarpContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn derive_rng(&self, _stream: u64) -> ChaCha8Rng {
        // Production layouts are not reproducible
        ChaCha8Rng::from_entropy()
    }

    fn seed(&self) -> u64 {
        0
    }
}

/// Host-side handle used by the window layer to push events.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl EventSender {
    /// Sends an event to the application.
    pub fn send(&self, event: HostEvent) -> Result<(), EnvError> {
        self.tx.send(event).map_err(|_| EnvError::InputClosed)
    }
}

impl InputInjector for EventSender {
    fn inject(&self, event: HostEvent) -> Result<(), EnvError> {
        self.send(event)
    }
}

/// Application-side input drained from a tokio channel.
pub struct ChannelInput {
    rx: Mutex<mpsc::UnboundedReceiver<HostEvent>>,
}

/// Creates a connected sender/input pair.
pub fn channel_input() -> (EventSender, ChannelInput) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSender { tx },
        ChannelInput { rx: Mutex::new(rx) },
    )
}

impl HostEvents for ChannelInput {
    fn poll(&self) -> Vec<HostEvent> {
        let mut rx = self.rx.lock().unwrap_or_else(|e| e.into_inner());
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }
}
