//! Bounded event queue between the engine and its consumer
//!
//! One FIFO per stream with two delivery classes. Control events (transcripts,
//! state changes, errors) are never dropped: a full queue makes the producer
//! wait until the consumer catches up or the stream closes. Audio chunks are
//! best-effort: under backpressure they are discarded rather than stalling the
//! synthesis pipeline, and an interrupt purges any that are still queued while
//! leaving control events in place.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::types::OrchestratorEvent;

pub const DEFAULT_CAPACITY: usize = 1024;

pub(crate) struct EventBus {
    inner: Arc<BusInner>,
}

/// Consumer half: receives events in FIFO order until the stream closes
#[derive(Clone)]
pub struct EventReceiver {
    inner: Arc<BusInner>,
}

struct BusInner {
    queue: Mutex<VecDeque<OrchestratorEvent>>,
    capacity: usize,
    /// wakes the consumer when an event arrives or the bus closes
    data: Notify,
    /// wakes blocked control producers when space frees up
    space: Notify,
    closed: AtomicBool,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                queue: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
                capacity,
                data: Notify::new(),
                space: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn receiver(&self) -> EventReceiver {
        EventReceiver { inner: self.inner.clone() }
    }

    /// Enqueue a control event, waiting for space if the queue is full.
    /// Returns false once the bus is closed.
    pub async fn push_control(&self, event: OrchestratorEvent) -> bool {
        loop {
            let notified = self.inner.space.notified();
            {
                let mut queue = self.inner.queue.lock().unwrap();
                if self.inner.closed.load(Ordering::Acquire) {
                    return false;
                }
                if queue.len() < self.inner.capacity {
                    queue.push_back(event);
                    self.inner.data.notify_one();
                    return true;
                }
            }
            notified.await;
        }
    }

    /// Enqueue an audio chunk without waiting. Returns false when the chunk
    /// was dropped (queue full or bus closed).
    pub fn push_audio(&self, event: OrchestratorEvent) -> bool {
        let mut queue = self.inner.queue.lock().unwrap();
        if self.inner.closed.load(Ordering::Acquire) || queue.len() >= self.inner.capacity {
            return false;
        }
        queue.push_back(event);
        self.inner.data.notify_one();
        true
    }

    /// Remove queued audio chunks, keeping control events in their original
    /// order. Runs in one pass under the queue lock, so it is bounded by the
    /// queue capacity rather than consumer speed.
    pub fn drain_audio(&self) -> usize {
        let mut queue = self.inner.queue.lock().unwrap();
        let before = queue.len();
        queue.retain(|ev| !ev.kind.is_audio());
        let removed = before - queue.len();
        if removed > 0 {
            self.inner.space.notify_waiters();
        }
        removed
    }

    /// Close the bus. Queued events remain readable; subsequent pushes fail
    /// and a draining consumer gets `None` once the queue empties.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.data.notify_waiters();
        self.inner.space.notify_waiters();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }
}

impl EventReceiver {
    /// Receive the next event, or `None` after the stream has closed and the
    /// queue has drained.
    pub async fn recv(&self) -> Option<OrchestratorEvent> {
        loop {
            let notified = self.inner.data.notified();
            {
                let mut queue = self.inner.queue.lock().unwrap();
                if let Some(event) = queue.pop_front() {
                    self.inner.space.notify_one();
                    return Some(event);
                }
                if self.inner.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Non-blocking receive
    pub fn try_recv(&self) -> Option<OrchestratorEvent> {
        let mut queue = self.inner.queue.lock().unwrap();
        let event = queue.pop_front();
        if event.is_some() {
            self.inner.space.notify_one();
        }
        event
    }
}
