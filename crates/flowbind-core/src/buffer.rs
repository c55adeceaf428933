//! Delivery buffer between a native callback and its single consumer.
//!
//! The producer side is synchronous (native callbacks cannot await), the
//! consumer side is poll-based so it can back both `recv().await` and a
//! `Stream` implementation. Overflow never surfaces as an error: a dropped
//! event is reported as [`PushOutcome::Dropped`] and counted in
//! [`BufferStats`].

use crate::error::{Error, Result, TryRecvError};
use futures::task::AtomicWaker;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::task::{Context, Poll};

/// Default capacity of a buffered channel.
pub const DEFAULT_CAPACITY: usize = 64;

/// What to do with an event that does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the incoming event.
    DropLatest,
    /// Evict the oldest buffered event to make room.
    DropOldest,
    /// Block the producer thread until there is room or the buffer closes.
    ///
    /// Only usable when callbacks fire on a different thread than the one
    /// polling the consumer.
    Suspend,
}

/// Buffering strategy for queued-channel and stream delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BufferPolicy {
    /// No limit.
    Unbounded,
    /// At most `capacity` unread events.
    Bounded {
        /// Maximum number of unread events.
        capacity: usize,
        /// Behaviour when full.
        overflow: OverflowPolicy,
    },
    /// Only the newest unread event is kept.
    Conflated,
    /// No buffer: an event is handed over only to a consumer that is
    /// already waiting.
    Rendezvous {
        /// Behaviour when no consumer is waiting.
        overflow: OverflowPolicy,
    },
}

impl BufferPolicy {
    /// Bounded buffer that drops new events when full.
    pub fn buffered(capacity: usize) -> Self {
        BufferPolicy::Bounded {
            capacity,
            overflow: OverflowPolicy::DropLatest,
        }
    }

    /// Validates the policy. A bounded buffer needs a non-zero capacity.
    pub fn validate(&self) -> Result<()> {
        match self {
            BufferPolicy::Bounded { capacity: 0, .. } => Err(Error::InvalidBufferPolicy(
                "bounded capacity must be > 0, use rendezvous for an unbuffered channel"
                    .to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            BufferPolicy::Unbounded => "unbounded",
            BufferPolicy::Bounded { .. } => "bounded",
            BufferPolicy::Conflated => "conflated",
            BufferPolicy::Rendezvous { .. } => "rendezvous",
        }
    }

    /// Configured capacity, `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        match self {
            BufferPolicy::Unbounded => None,
            BufferPolicy::Bounded { capacity, .. } => Some(*capacity),
            BufferPolicy::Conflated => Some(1),
            BufferPolicy::Rendezvous { .. } => Some(0),
        }
    }

    fn overflow(&self) -> OverflowPolicy {
        match self {
            BufferPolicy::Bounded { overflow, .. } | BufferPolicy::Rendezvous { overflow } => {
                *overflow
            }
            BufferPolicy::Conflated => OverflowPolicy::DropOldest,
            BufferPolicy::Unbounded => OverflowPolicy::DropLatest,
        }
    }
}

impl Default for BufferPolicy {
    /// `Bounded { capacity: 64, overflow: DropLatest }`.
    fn default() -> Self {
        BufferPolicy::buffered(DEFAULT_CAPACITY)
    }
}

impl fmt::Display for BufferPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferPolicy::Unbounded => write!(f, "Unbounded"),
            BufferPolicy::Bounded { capacity, overflow } => {
                write!(f, "Bounded(capacity={}, overflow={:?})", capacity, overflow)
            }
            BufferPolicy::Conflated => write!(f, "Conflated"),
            BufferPolicy::Rendezvous { overflow } => {
                write!(f, "Rendezvous(overflow={:?})", overflow)
            }
        }
    }
}

/// Result of offering an event to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued for the consumer.
    Delivered,
    /// Queued after evicting the oldest unread event.
    Replaced,
    /// Dropped under backpressure.
    Dropped,
    /// The buffer is closed; the event was discarded.
    Closed,
}

impl PushOutcome {
    /// Whether the event will reach the consumer.
    pub fn is_queued(&self) -> bool {
        matches!(self, PushOutcome::Delivered | PushOutcome::Replaced)
    }
}

/// Buffer statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferStats {
    /// Policy name
    pub policy: &'static str,
    /// Maximum capacity, `None` when unbounded
    pub capacity: Option<usize>,
    /// Events waiting to be read
    pub current_size: usize,
    /// Events handed to the consumer
    pub delivered: u64,
    /// Events lost to overflow
    pub dropped: u64,
    /// Unread events discarded on close
    pub discarded: u64,
    /// Whether the buffer is closed
    pub closed: bool,
}

struct BufferState<E> {
    queue: VecDeque<E>,
    closed: bool,
    consumer_parked: bool,
    delivered: u64,
    dropped: u64,
    discarded: u64,
}

/// Single-producer, single-consumer event buffer.
pub struct EventBuffer<E> {
    policy: BufferPolicy,
    state: Mutex<BufferState<E>>,
    space: Condvar,
    waker: AtomicWaker,
}

impl<E> EventBuffer<E> {
    /// Create an empty, open buffer.
    pub fn new(policy: BufferPolicy) -> Self {
        let initial = match policy {
            BufferPolicy::Bounded { capacity, .. } => capacity.min(DEFAULT_CAPACITY),
            _ => 1,
        };
        Self {
            policy,
            state: Mutex::new(BufferState {
                queue: VecDeque::with_capacity(initial),
                closed: false,
                consumer_parked: false,
                delivered: 0,
                dropped: 0,
                discarded: 0,
            }),
            space: Condvar::new(),
            waker: AtomicWaker::new(),
        }
    }

    /// The policy this buffer was created with.
    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }

    fn limit(&self, state: &BufferState<E>) -> usize {
        match self.policy {
            BufferPolicy::Unbounded => usize::MAX,
            BufferPolicy::Bounded { capacity, .. } => capacity,
            BufferPolicy::Conflated => 1,
            BufferPolicy::Rendezvous { .. } => usize::from(state.consumer_parked),
        }
    }

    /// Offer an event.
    pub fn push(&self, event: E) -> PushOutcome {
        let mut state = self.state.lock();
        let outcome = loop {
            if state.closed {
                return PushOutcome::Closed;
            }
            if state.queue.len() < self.limit(&state) {
                state.queue.push_back(event);
                break PushOutcome::Delivered;
            }
            match self.policy.overflow() {
                OverflowPolicy::DropLatest => {
                    state.dropped += 1;
                    return PushOutcome::Dropped;
                }
                OverflowPolicy::DropOldest => {
                    state.dropped += 1;
                    if state.queue.pop_front().is_none() {
                        return PushOutcome::Dropped;
                    }
                    state.queue.push_back(event);
                    break PushOutcome::Replaced;
                }
                OverflowPolicy::Suspend => self.space.wait(&mut state),
            }
        };
        drop(state);
        self.waker.wake();
        outcome
    }

    /// Queue an event ahead of any producer, ignoring capacity and
    /// overflow. Used for the initial value of a binding, which must never
    /// block or be dropped. A rendezvous buffer holds it as a pending
    /// hand-off for the first read.
    pub fn seed(&self, event: E) -> PushOutcome {
        {
            let mut state = self.state.lock();
            if state.closed {
                return PushOutcome::Closed;
            }
            state.queue.push_back(event);
        }
        self.waker.wake();
        PushOutcome::Delivered
    }

    /// Poll for the next event. `Ready(None)` once closed.
    pub fn poll_recv(&self, cx: &mut Context<'_>) -> Poll<Option<E>> {
        let mut state = self.state.lock();
        if let Some(event) = state.queue.pop_front() {
            state.delivered += 1;
            state.consumer_parked = false;
            drop(state);
            self.space.notify_all();
            return Poll::Ready(Some(event));
        }
        if state.closed {
            return Poll::Ready(None);
        }
        self.waker.register(cx.waker());
        let newly_parked = !state.consumer_parked;
        state.consumer_parked = true;
        drop(state);
        if newly_parked {
            self.space.notify_all();
        }
        Poll::Pending
    }

    /// The consumer stopped waiting without receiving an event.
    pub fn cancel_wait(&self) {
        self.state.lock().consumer_parked = false;
    }

    /// Take the next event without waiting. Never counts as a waiting
    /// consumer.
    pub fn try_recv(&self) -> std::result::Result<E, TryRecvError> {
        let mut state = self.state.lock();
        state.consumer_parked = false;
        match state.queue.pop_front() {
            Some(event) => {
                state.delivered += 1;
                drop(state);
                self.space.notify_all();
                Ok(event)
            }
            None if state.closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    /// Close the buffer, discarding unread events and releasing any blocked
    /// producer. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            let unread = state.queue.len() as u64;
            state.queue.clear();
            state.discarded += unread;
        }
        self.space.notify_all();
        self.waker.wake();
        true
    }

    /// Whether the buffer is closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of unread events.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether there are no unread events.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> BufferStats {
        let state = self.state.lock();
        BufferStats {
            policy: self.policy.name(),
            capacity: self.policy.capacity(),
            current_size: state.queue.len(),
            delivered: state.delivered,
            dropped: state.dropped,
            discarded: state.discarded,
            closed: state.closed,
        }
    }
}

impl<E> fmt::Debug for EventBuffer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBuffer")
            .field("policy", &self.policy)
            .field("stats", &self.stats())
            .finish()
    }
}
