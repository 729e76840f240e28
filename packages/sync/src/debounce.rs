//! # Debounce Gate
//!
//! Trailing-edge debounce: every `arm` restarts the timer, and only the
//! value passed to the last `arm` of a burst reaches the bound action.
//!
//! Nothing runs until the timer fires, so a superseded arm leaves no side
//! effects behind. Instances share no state; the pipeline keeps one tuned
//! for validation feedback and one for preview rendering.

use crate::util::lock;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::trace;

type Action<T> = Arc<dyn Fn(T) + Send + Sync>;

#[derive(Default)]
struct Slot {
    /// Bumped on every arm and cancel; a timer only fires if its ticket is current
    ticket: u64,
    task: Option<JoinHandle<()>>,
}

pub struct DebounceGate<T> {
    name: &'static str,
    delay: Duration,
    action: Action<T>,
    slot: Arc<Mutex<Slot>>,
    runtime: Handle,
}

impl<T: Send + 'static> DebounceGate<T> {
    /// Create a gate bound to `action`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime; timers are spawned on the
    /// runtime that created the gate.
    pub fn new(
        name: &'static str,
        delay: Duration,
        action: impl Fn(T) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            delay,
            action: Arc::new(action),
            slot: Arc::new(Mutex::new(Slot::default())),
            runtime: Handle::current(),
        }
    }

    /// Schedule the action with the gate's configured delay
    pub fn arm(&self, value: T) {
        self.arm_after(self.delay, value);
    }

    /// Schedule the action after `delay`, replacing any pending schedule
    pub fn arm_after(&self, delay: Duration, value: T) {
        let mut slot = lock(&self.slot);
        slot.ticket += 1;
        if let Some(previous) = slot.task.take() {
            previous.abort();
        }

        let ticket = slot.ticket;
        let shared = Arc::clone(&self.slot);
        let action = Arc::clone(&self.action);
        let name = self.name;

        slot.task = Some(self.runtime.spawn(async move {
            time::sleep(delay).await;
            {
                let mut slot = lock(&shared);
                if slot.ticket != ticket {
                    return;
                }
                slot.task = None;
            }
            trace!(gate = name, "Debounce gate fired");
            action(value);
        }));
    }

    /// Drop the pending schedule, if any, without running the action
    pub fn cancel(&self) {
        let mut slot = lock(&self.slot);
        slot.ticket += 1;
        if let Some(task) = slot.task.take() {
            task.abort();
            trace!(gate = self.name, "Debounce gate cancelled");
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.slot).task.is_some()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Drop for DebounceGate<T> {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.slot).task.take() {
            task.abort();
        }
    }
}
