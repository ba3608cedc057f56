//! Bounded FIFO work queues connecting the pipeline stages.
//!
//! A full queue blocks its producers, which is what keeps the seeder from
//! running ahead of the API-bound workers.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

/// How often a blocked `put` rechecks whether the queue was closed.
const PUT_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("queue {0} is closed")]
pub struct QueueClosed(pub &'static str);

/// Outcome of a bounded wait on a queue.
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued<T> {
    Item(T),
    /// Nothing arrived within the wait.
    Empty,
    Closed,
}

pub struct WorkQueue<T> {
    name: &'static str,
    sender: Sender<T>,
    receiver: Receiver<T>,
    closed: AtomicBool,
    in_flight: AtomicUsize,
}

impl<T> WorkQueue<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            name,
            sender,
            receiver,
            closed: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue `item`, blocking while the queue is full.
    pub fn put(&self, item: T) -> Result<(), QueueClosed> {
        let mut item = item;
        loop {
            if self.is_closed() {
                return Err(QueueClosed(self.name));
            }
            match self.sender.send_timeout(item, PUT_POLL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => item = returned,
                Err(SendTimeoutError::Disconnected(_)) => return Err(QueueClosed(self.name)),
            }
        }
    }

    /// Wait at most `timeout` for an item. Every item handed out must be
    /// acknowledged with [`WorkQueue::task_done`].
    pub fn get(&self, timeout: Duration) -> Dequeued<T> {
        if self.is_closed() {
            return Dequeued::Closed;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(item) => {
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                Dequeued::Item(item)
            }
            Err(RecvTimeoutError::Timeout) if !self.is_closed() => Dequeued::Empty,
            Err(_) => Dequeued::Closed,
        }
    }

    pub fn task_done(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Refuse further puts and gets. Items still queued are abandoned.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Items waiting to be picked up.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Items picked up but not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}
