//! Event queue and dispatcher
//!
//! Producers — GPIO edge callbacks, the transport's receive callback, timer
//! expiry, script completion — push byte-sized event tags into a bounded
//! FIFO and never block. A full queue drops the newest event and counts the
//! loss; the state machine treats its events as level-triggered
//! retriggerable signals, so bounded loss is tolerable but observable.
//!
//! The dispatcher drains the queue on the single worker context and feeds
//! the state machine strictly in FIFO order.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use heapless::{Deque, Vec};

use crate::config::EVENT_QUEUE_SIZE;
use crate::types::ModemEvent;

/// Bounded FIFO of pending events with an observable drop counter.
#[derive(Debug)]
pub struct EventQueue<const N: usize = EVENT_QUEUE_SIZE> {
    queue: Deque<ModemEvent, N>,
    dropped: u32,
}

impl<const N: usize> EventQueue<N> {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
            dropped: 0,
        }
    }

    /// Push one event. Returns `false` (and counts the loss) when full.
    pub fn push(&mut self, event: ModemEvent) -> bool {
        if self.queue.push_back(event).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            false
        } else {
            true
        }
    }

    /// Pop the oldest event.
    pub fn pop(&mut self) -> Option<ModemEvent> {
        self.queue.pop_front()
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// How many pushes have been dropped since creation.
    #[must_use]
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// ISR-safe producer facade over the event queue.
///
/// [`EventBus::delegate`] takes a short critical section to push, then
/// signals the dispatcher; scheduling is idempotent, so repeated delegation
/// while the dispatcher is pending costs nothing. It never blocks and never
/// runs the state machine synchronously.
pub struct EventBus {
    queue: Mutex<CriticalSectionRawMutex, RefCell<EventQueue<EVENT_QUEUE_SIZE>>>,
    pending: Signal<CriticalSectionRawMutex, ()>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            queue: Mutex::new(RefCell::new(EventQueue::new())),
            pending: Signal::new(),
        }
    }

    /// Queue one event from any context, including interrupt handlers.
    ///
    /// Returns `false` when the queue was full and the event was dropped.
    pub fn delegate(&self, event: ModemEvent) -> bool {
        let accepted = self.queue.lock(|q| q.borrow_mut().push(event));
        self.pending.signal(());
        accepted
    }

    /// Wait until at least one delegation happened since the last drain.
    pub async fn wait(&self) {
        self.pending.wait().await;
    }

    /// Drain all currently queued events into `out`, preserving order.
    pub fn drain<const M: usize>(&self, out: &mut Vec<ModemEvent, M>) {
        self.queue.lock(|q| {
            let mut queue = q.borrow_mut();
            while out.len() < out.capacity() {
                match queue.pop() {
                    Some(event) => {
                        let _ = out.push(event);
                    }
                    None => break,
                }
            }
        });
    }

    /// How many delegations have been dropped since creation.
    #[must_use]
    pub fn dropped(&self) -> u32 {
        self.queue.lock(|q| q.borrow().dropped())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
