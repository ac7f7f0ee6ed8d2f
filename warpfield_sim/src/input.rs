//! Scripted host input on the virtual clock.

use crate::context::SimContext;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use warpfield_env::{EnvError, HostEvent, HostEvents, InputInjector, WarpContext};

/// An event waiting for its virtual time.
#[derive(Debug, Clone, Copy)]
struct ScheduledEvent {
    at: Duration,
    event: HostEvent,
}

/// Host input driven by a script instead of a user.
///
/// Clones share the same queue: the app polls one clone while the harness
/// schedules through another. Events are delivered in time order, ties in
/// scheduling order, once the virtual clock reaches them.
#[derive(Clone)]
pub struct ScriptedInput {
    context: Arc<SimContext>,
    queue: Arc<Mutex<VecDeque<ScheduledEvent>>>,
    delivered: Arc<Mutex<u64>>,
}

impl ScriptedInput {
    pub fn new(context: Arc<SimContext>) -> Self {
        Self {
            context,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            delivered: Arc::new(Mutex::new(0)),
        }
    }

    /// Queues `event` for virtual time `at`.
    pub fn schedule(&self, at: Duration, event: HostEvent) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        let index = queue.partition_point(|e| e.at <= at);
        queue.insert(index, ScheduledEvent { at, event });
    }

    /// Queues `event` `delay` after the current virtual time.
    pub fn schedule_in(&self, delay: Duration, event: HostEvent) {
        self.schedule(self.context.now() + delay, event);
    }

    /// Events not yet delivered.
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Events delivered so far.
    pub fn delivered(&self) -> u64 {
        *self.delivered.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl HostEvents for ScriptedInput {
    fn poll(&self) -> Vec<HostEvent> {
        let now = self.context.now();
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        let due = queue.partition_point(|e| e.at <= now);
        let events: Vec<HostEvent> = queue.drain(..due).map(|e| e.event).collect();

        *self.delivered.lock().unwrap_or_else(|e| e.into_inner()) += events.len() as u64;
        events
    }
}

impl InputInjector for ScriptedInput {
    /// Delivers on the next poll.
    fn inject(&self, event: HostEvent) -> Result<(), EnvError> {
        self.schedule(self.context.now(), event);
        Ok(())
    }
}
